/// WebSocket client for the whaleflow realtime channel
///
/// Maintains a single persistent connection with automatic reconnection on a
/// fixed delay, decodes inbound JSON frames into realtime events, and
/// dispatches them to the owning context until that context disposes the
/// channel.
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;
use whaleflow_data::{DataError, RealtimeEvent};

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// WebSocket server URL
    pub url: String,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// Fixed reconnection delay after a close or connection failure
    pub reconnect_delay: Duration,
    /// Bound on an individual connection attempt
    pub connect_timeout: Duration,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9001".to_string(),
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_millis(3000),
            connect_timeout: Duration::from_secs(10),
            channel_buffer_size: 1000,
        }
    }
}

impl WebSocketConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Derive the channel endpoint from an http(s) origin: the scheme is
    /// upgraded to its persistent-transport variant (http -> ws,
    /// https -> wss), host and port are preserved.
    pub fn from_origin(origin: &str) -> Result<Self, DataError> {
        let origin = Url::parse(origin)
            .map_err(|parse_err| DataError::Socket(format!("invalid origin: {parse_err}")))?;

        let scheme = match origin.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        let host = origin
            .host_str()
            .ok_or_else(|| DataError::Socket(format!("origin has no host: {origin}")))?;

        let url = match origin.port() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        };

        Ok(Self::new(url))
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Connection state published on the status channel.
///
/// The cycle is Connecting -> Open -> Retrying -> Connecting ... with no
/// terminal state until the owning context disposes the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Retrying,
    Disposed,
}

/// Handle used by the owning context to explicitly release the channel.
///
/// Disposing cancels any pending retry timer, closes a live connection and
/// ends the connection task; no reconnect attempts occur afterwards.
/// Dropping the handle releases the channel the same way.
#[derive(Debug)]
pub struct ChannelHandle {
    dispose_tx: mpsc::Sender<()>,
}

impl ChannelHandle {
    pub async fn dispose(self) {
        let _ = self.dispose_tx.send(()).await;
    }
}

/// WebSocket client for realtime whale flow events
pub struct WebSocketClient {
    config: WebSocketConfig,
}

impl WebSocketClient {
    /// Create a new WebSocket client with default configuration
    pub fn new() -> Self {
        Self::with_config(WebSocketConfig::default())
    }

    /// Create a new WebSocket client with custom configuration
    pub fn with_config(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Start the WebSocket client connection
    ///
    /// Returns the dispose handle, a receiver for decoded realtime events
    /// and a receiver for connection status updates
    pub fn start(
        self,
    ) -> (
        ChannelHandle,
        mpsc::Receiver<RealtimeEvent>,
        mpsc::Receiver<ConnectionStatus>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (status_tx, status_rx) = mpsc::channel(16);
        let (dispose_tx, dispose_rx) = mpsc::channel(1);

        let config = self.config;
        tokio::spawn(async move {
            run_channel_loop(config, event_tx, status_tx, dispose_rx).await;
        });

        (ChannelHandle { dispose_tx }, event_rx, status_rx)
    }
}

impl Default for WebSocketClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Main connection loop with auto-reconnect
///
/// One task owns the connection handle; it is replaced on each reconnect and
/// never mutated concurrently, so no two connections are ever open at once.
/// The single in-loop retry timer is structurally replaced each cycle and
/// cancelled by disposal, resolving the retry/teardown race.
async fn run_channel_loop(
    config: WebSocketConfig,
    event_tx: mpsc::Sender<RealtimeEvent>,
    status_tx: mpsc::Sender<ConnectionStatus>,
    mut dispose_rx: mpsc::Receiver<()>,
) {
    info!("Starting realtime channel consumer for {}", config.url);

    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting).await;

        let attempt = tokio::select! {
            result = tokio::time::timeout(config.connect_timeout, connect_async(&config.url)) => result,
            _ = dispose_rx.recv() => {
                let _ = status_tx.send(ConnectionStatus::Disposed).await;
                return;
            }
        };

        match attempt {
            Ok(Ok((ws_stream, _))) => {
                info!("Connected to realtime channel at {}", config.url);
                let _ = status_tx.send(ConnectionStatus::Open).await;

                let (mut write, mut read) = ws_stream.split();
                let mut ping = tokio::time::interval(config.ping_interval);
                // the first tick completes immediately
                ping.tick().await;

                let mut disposed = false;
                loop {
                    tokio::select! {
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<RealtimeEvent>(&text) {
                                    Ok(event) => {
                                        if event_tx.send(event).await.is_err() {
                                            warn!("Event receiver dropped, disposing channel");
                                            disposed = true;
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        // Malformed frames are dropped without
                                        // tearing down the connection
                                        error!("Failed to parse frame: {}", e);
                                        debug!("Raw frame: {}", text);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                info!("Server closed connection");
                                break;
                            }
                            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                                // Heartbeat - tungstenite answers pings automatically
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                break;
                            }
                            None => {
                                info!("Connection stream ended");
                                break;
                            }
                        },
                        _ = ping.tick() => {
                            if write.send(Message::Ping(vec![].into())).await.is_err() {
                                debug!("Failed to send ping, connection likely dead");
                                break;
                            }
                        }
                        _ = dispose_rx.recv() => {
                            let _ = write.send(Message::Close(None)).await;
                            disposed = true;
                            break;
                        }
                    }
                }

                if disposed {
                    let _ = status_tx.send(ConnectionStatus::Disposed).await;
                    return;
                }

                warn!("Connection closed, will reconnect...");
            }
            Ok(Err(e)) => {
                error!("Failed to connect to {}: {}", config.url, e);
            }
            Err(_elapsed) => {
                error!(
                    "Connection attempt to {} timed out after {:?}",
                    config.url, config.connect_timeout
                );
            }
        }

        let _ = status_tx.send(ConnectionStatus::Retrying).await;
        debug!(
            "Waiting {:?} before reconnecting...",
            config.reconnect_delay
        );
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = dispose_rx.recv() => {
                let _ = status_tx.send(ConnectionStatus::Disposed).await;
                return;
            }
        }
    }
}
