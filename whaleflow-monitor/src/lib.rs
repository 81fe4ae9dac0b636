/// Whaleflow Monitor - Consumer Library
///
/// Client side of the whaleflow realtime channel. Provides:
/// - A reconnecting WebSocket client that decodes realtime events
/// - A query cache with prefix-based invalidation and observer tracking
/// - Whale-order alerts tiered by size
/// - The invalidation router tying the three together
pub mod alert;
pub mod cache;
pub mod router;
pub mod websocket;

// Re-export commonly used types for convenience
pub use alert::{Alert, AlertSeverity};
pub use cache::{ORDERS_RESOURCE, QueryCache, QueryKey};
pub use router::InvalidationRouter;
pub use websocket::{ChannelHandle, ConnectionStatus, WebSocketClient, WebSocketConfig};
