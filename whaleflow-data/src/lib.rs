//! Core library for the whaleflow ecosystem.
//!
//! Ingests raw blockchain transaction records, maps their addresses to known
//! exchange identities, derives a directional flow signal and market
//! sentiment per transaction, and rolls batches of classified transactions
//! into net-flow statistics. Also defines the realtime event wire format
//! pushed from `whaleflow-server` to `whaleflow-monitor` subscribers.

/// All errors generated in `whaleflow-data`.
pub mod error;

/// Exchange identities and the address registry that maps raw blockchain
/// addresses onto them.
pub mod exchange;

/// Raw transaction feed schema and per-transaction classification.
pub mod transaction;

/// Batch aggregation of classified transactions into exchange-flow
/// statistics.
pub mod flow;

/// Realtime event wire types pushed over the WebSocket channel.
pub mod event;

/// REST boundary to the raw transaction feed and the price ticker.
pub mod feed;

// Re-export commonly used types for convenience
pub use error::DataError;
pub use event::{OrderPayload, OrderSide, RealtimeEvent};
pub use exchange::{AddressRegistry, Exchange};
pub use flow::{ExchangeFlowStats, NET_FLOW_SENTIMENT_THRESHOLD_BTC, aggregate};
pub use transaction::{
    ClassifiedTransaction, FlowSignal, RawTransaction, SATS_PER_BTC, Sentiment, UNKNOWN_ADDRESS,
};
