/// Headless whale-flow monitor
///
/// Connects to the whaleflow-server realtime channel, keeps two observed
/// order-list queries registered in the cache, routes every inbound event
/// through the invalidation router and logs the resulting alerts and
/// refetch requests. Ctrl-C disposes the channel.
use tokio::sync::mpsc;
use tracing::{info, warn};
use whaleflow_monitor::{
    Alert, AlertSeverity, InvalidationRouter, ORDERS_RESOURCE, QueryCache, QueryKey,
    WebSocketClient, WebSocketConfig,
};

/// Get WebSocket URL from WS_URL env var (default: ws://127.0.0.1:9001)
fn get_ws_url() -> String {
    std::env::var("WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:9001".to_string())
}

/// Get http(s) origin from ORIGIN env var; takes precedence over WS_URL
fn get_origin() -> Option<String> {
    std::env::var("ORIGIN").ok()
}

fn config() -> WebSocketConfig {
    match get_origin() {
        Some(origin) => WebSocketConfig::from_origin(&origin)
            .expect("ORIGIN env var must be a valid http(s) origin"),
        None => WebSocketConfig::new(get_ws_url()),
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    let config = config();
    info!("Starting flow monitor against {}", config.url);

    let mut cache: QueryCache<serde_json::Value> = QueryCache::new();
    let all_orders = QueryKey::resource(ORDERS_RESOURCE);
    let binance_longs = QueryKey::resource(ORDERS_RESOURCE)
        .with_param("exchange=binance")
        .with_param("side=long");
    cache.observe(all_orders);
    cache.observe(binance_longs);

    let (alert_tx, mut alert_rx) = mpsc::unbounded_channel::<Alert>();
    let (refetch_tx, mut refetch_rx) = mpsc::unbounded_channel::<QueryKey>();
    let mut router = InvalidationRouter::new(cache, alert_tx, refetch_tx);

    tokio::spawn(async move {
        while let Some(alert) = alert_rx.recv().await {
            match alert.severity {
                AlertSeverity::Critical => warn!("ALERT (critical): {}", alert.message),
                AlertSeverity::Info => info!("ALERT: {}", alert.message),
            }
        }
    });

    tokio::spawn(async move {
        while let Some(key) = refetch_rx.recv().await {
            // The REST order-list endpoint performing the refetch is an
            // external collaborator; log its boundary here.
            info!(
                "Refetch requested for {} query with params {:?}",
                key.resource_name(),
                key.params()
            );
        }
    });

    let client = WebSocketClient::with_config(config);
    let (handle, mut event_rx, mut status_rx) = client.start();

    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            info!("Connection status: {:?}", status);
        }
    });

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => router.route(&event),
                None => {
                    warn!("Event channel closed, exiting");
                    return;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, disposing channel");
                handle.dispose().await;
                return;
            }
        }
    }
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
