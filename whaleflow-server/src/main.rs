use chrono::{DateTime, Utc};
use fnv::FnvHashSet;
use futures::{SinkExt, StreamExt, stream};
use reqwest::Client;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::broadcast,
    time::interval,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use whaleflow_data::{
    AddressRegistry, ClassifiedTransaction, DataError, FlowSignal, OrderPayload, OrderSide,
    RawTransaction, RealtimeEvent, aggregate,
    feed::{DEFAULT_FEED_URL, DEFAULT_TICKER_URL, fetch_price, fetch_transactions},
};

/// Bound on the seen-hash dedup cache. Consecutive polls of the feed return
/// overlapping pages, so recently broadcast hashes are remembered and
/// skipped.
const SEEN_HASH_CAPACITY: usize = 4096;

/// One successful poll of the feed: the price captured for the cycle plus
/// the raw transaction page.
struct FeedCycle {
    price: f64,
    transactions: Vec<RawTransaction>,
}

/// A derived whale order waiting for its simulated fill.
struct OpenOrder {
    opened_at: DateTime<Utc>,
    order: OrderPayload,
}

/// WebSocket listen address from WS_ADDR env var (default: 0.0.0.0:9001)
fn ws_addr() -> SocketAddr {
    std::env::var("WS_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| "0.0.0.0:9001".parse().expect("default WS_ADDR is valid"))
}

/// Broadcast buffer size from WS_BUFFER_SIZE env var (default: 10,000)
fn ws_buffer_size() -> usize {
    std::env::var("WS_BUFFER_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000)
}

/// Raw transaction feed URL from FEED_URL env var
fn feed_url() -> String {
    std::env::var("FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string())
}

/// Price ticker URL from TICKER_URL env var
fn ticker_url() -> String {
    std::env::var("TICKER_URL").unwrap_or_else(|_| DEFAULT_TICKER_URL.to_string())
}

/// Feed poll interval from POLL_INTERVAL_SECS env var (default: 60s)
fn poll_interval() -> Duration {
    let secs = std::env::var("POLL_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);
    Duration::from_secs(secs)
}

/// Whale threshold in BTC from WHALE_THRESHOLD_BTC env var (default: 50.0)
fn whale_threshold_btc() -> f64 {
    std::env::var("WHALE_THRESHOLD_BTC")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(50.0)
}

/// Simulated fill delay from FILL_DELAY_SECS env var (default: 30s)
fn fill_delay() -> chrono::Duration {
    let secs = std::env::var("FILL_DELAY_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    chrono::Duration::seconds(secs)
}

#[tokio::main]
async fn main() {
    init_logging();

    info!("Starting whaleflow WebSocket server");

    let buffer_size = ws_buffer_size();
    info!("WebSocket broadcast buffer size: {}", buffer_size);
    let (tx, _rx) = broadcast::channel::<RealtimeEvent>(buffer_size);
    let tx = Arc::new(tx);

    let server_addr = ws_addr();
    let tx_clone = tx.clone();
    tokio::spawn(async move {
        start_websocket_server(server_addr, tx_clone).await;
    });

    info!("WebSocket server listening on ws://{}", server_addr);
    info!("Clients can connect to receive real-time whale flow events");

    let registry = Arc::new(AddressRegistry::with_known_exchanges());
    info!("Address registry loaded with {} addresses", registry.len());

    let threshold_btc = whale_threshold_btc();
    let fill_delay = fill_delay();
    info!(
        "Whale threshold: {} BTC, simulated fill delay: {}s",
        threshold_btc,
        fill_delay.num_seconds()
    );

    let cycles = feed_cycle_stream(feed_url(), ticker_url(), poll_interval());
    futures::pin_mut!(cycles);

    let mut seen_hashes = FnvHashSet::default();
    let mut seen_order = VecDeque::with_capacity(SEEN_HASH_CAPACITY);
    let mut open_orders: VecDeque<OpenOrder> = VecDeque::new();

    while let Some(cycle) = cycles.next().await {
        let cycle = match cycle {
            Ok(cycle) => cycle,
            Err(error) => {
                // Discard this fetch cycle only; the next one starts clean
                warn!("Feed cycle failed: {}", error);
                continue;
            }
        };

        let whales = cycle
            .transactions
            .iter()
            .filter(|raw| raw.is_whale(threshold_btc))
            .filter(|raw| remember_hash(&mut seen_hashes, &mut seen_order, &raw.hash))
            .map(|raw| ClassifiedTransaction::classify(raw, &registry, cycle.price))
            .collect::<Vec<_>>();

        debug!(
            "Cycle fetched {} transactions, {} new whales at price {}",
            cycle.transactions.len(),
            whales.len(),
            cycle.price
        );

        let stats = aggregate(&whales);
        info!(
            "Flow stats: deposits {:.2} BTC, withdrawals {:.2} BTC, net flow {:.2} BTC, sentiment {}",
            stats.total_deposits, stats.total_withdrawals, stats.net_flow, stats.sentiment
        );

        for tx_classified in &whales {
            let Some(order) = derive_order(tx_classified, cycle.price) else {
                continue;
            };

            info!(
                "New whale order: {:.2} BTC {} at {:.2} on {}",
                order.size, order.side, order.price, order.exchange
            );

            let event = RealtimeEvent::NewOrder {
                order: Some(order.clone()),
            };
            if let Err(error) = tx.send(event) {
                debug!("No subscribers for new_order event: {:?}", error);
            }

            open_orders.push_back(OpenOrder {
                opened_at: Utc::now(),
                order,
            });
        }

        // Simulated fills: pop orders older than the configured delay
        let now = Utc::now();
        while let Some(front) = open_orders.front() {
            if now - front.opened_at < fill_delay {
                break;
            }
            let filled = open_orders.pop_front().expect("front checked above");
            info!(
                "Order filled: {:.2} BTC {} at {:.2} on {}",
                filled.order.size, filled.order.side, filled.order.price, filled.order.exchange
            );
            let event = RealtimeEvent::OrderFilled {
                order: Some(filled.order),
            };
            if let Err(error) = tx.send(event) {
                debug!("No subscribers for order_filled event: {:?}", error);
            }
        }
    }
}

/// Remember a transaction hash, evicting the oldest once at capacity.
/// Returns false when the hash was already seen in a recent cycle.
fn remember_hash(
    seen: &mut FnvHashSet<String>,
    order: &mut VecDeque<String>,
    hash: &str,
) -> bool {
    if seen.contains(hash) {
        return false;
    }
    if order.len() >= SEEN_HASH_CAPACITY {
        if let Some(oldest) = order.pop_front() {
            seen.remove(&oldest);
        }
    }
    seen.insert(hash.to_string());
    order.push_back(hash.to_string());
    true
}

/// Derive the order event a classified whale transaction represents.
///
/// Withdrawals (bullish) become long orders against the source exchange,
/// deposits (bearish) become shorts against the destination exchange.
/// Transfers carry no directional information and derive nothing.
fn derive_order(tx: &ClassifiedTransaction, price_at_fetch: f64) -> Option<OrderPayload> {
    let (side, exchange) = match tx.signal {
        FlowSignal::Withdrawal => (OrderSide::Long, tx.from_exchange?),
        FlowSignal::Deposit => (OrderSide::Short, tx.to_exchange?),
        FlowSignal::Transfer => return None,
    };

    Some(OrderPayload {
        size: tx.amount_btc,
        side,
        price: price_at_fetch,
        exchange: exchange.as_str().to_string(),
    })
}

/// Poll the transaction feed and price ticker on a fixed interval.
///
/// Each cycle fetches the price first so every transaction in the page is
/// valued at the same price-at-fetch-time. Errors are yielded and logged by
/// the consumer loop; they never end the stream.
fn feed_cycle_stream(
    feed_url: String,
    ticker_url: String,
    poll_interval: Duration,
) -> impl futures::Stream<Item = Result<FeedCycle, DataError>> {
    let client = Client::new();

    stream::unfold(
        (client, feed_url, ticker_url, interval(poll_interval)),
        move |(client, feed_url, ticker_url, mut timer)| async move {
            timer.tick().await;

            let result = async {
                let price = fetch_price(&client, &ticker_url).await?;
                let transactions = fetch_transactions(&client, &feed_url).await?;
                Ok(FeedCycle {
                    price,
                    transactions,
                })
            }
            .await;

            Some((result, (client, feed_url, ticker_url, timer)))
        },
    )
}

/// Start WebSocket server that broadcasts realtime events to connected clients
async fn start_websocket_server(addr: SocketAddr, tx: Arc<broadcast::Sender<RealtimeEvent>>) {
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind WebSocket server");

    info!("WebSocket server bound to {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!("New WebSocket connection from {}", peer_addr);
        let tx = tx.clone();
        tokio::spawn(handle_client(stream, peer_addr, tx));
    }
}

/// Handle individual WebSocket client connection
async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    tx: Arc<broadcast::Sender<RealtimeEvent>>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", peer_addr, e);
            return;
        }
    };

    info!("WebSocket handshake completed for {}", peer_addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut rx = tx.subscribe();

    // Fresh initial_data frame: the resynchronization point for this
    // connection. There is no replay of events missed while disconnected.
    if let Ok(msg) = serde_json::to_string(&RealtimeEvent::InitialData) {
        let _ = ws_sender.send(Message::Text(msg.into())).await;
    }

    // Spawn task to forward broadcast events to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Client {} lagged, skipped {} events", peer_addr, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Broadcast channel closed for {}", peer_addr);
                    break;
                }
            }
        }
    });

    // Handle incoming messages from client (e.g. ping/pong)
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_)) => {
                    debug!("Received ping from {}", peer_addr);
                }
                Ok(Message::Text(text)) => {
                    debug!("Received text from {}: {}", peer_addr, text);
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", peer_addr, e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            info!("Send task completed for {}", peer_addr);
        }
        _ = &mut recv_task => {
            info!("Receive task completed for {}", peer_addr);
        }
    }

    info!("WebSocket connection closed for {}", peer_addr);
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

#[cfg(test)]
mod tests {
    use super::*;
    use whaleflow_data::Exchange;

    fn classified(
        signal: FlowSignal,
        from_exchange: Option<Exchange>,
        to_exchange: Option<Exchange>,
    ) -> ClassifiedTransaction {
        let sentiment = whaleflow_data::Sentiment::from(signal);
        ClassifiedTransaction {
            hash: "ff".repeat(32),
            time: Utc::now(),
            amount_btc: 150.0,
            amount_usd: 150.0 * 93_000.0,
            from_address: "from".to_string(),
            to_address: "to".to_string(),
            from_exchange,
            to_exchange,
            signal,
            sentiment,
        }
    }

    #[test]
    fn test_derive_order_sides() {
        let withdrawal = classified(FlowSignal::Withdrawal, Some(Exchange::Binance), None);
        let order = derive_order(&withdrawal, 93_000.0).expect("withdrawal derives an order");
        assert_eq!(order.side, OrderSide::Long);
        assert_eq!(order.exchange, "binance");
        assert_eq!(order.size, 150.0);
        assert_eq!(order.price, 93_000.0);

        let deposit = classified(FlowSignal::Deposit, None, Some(Exchange::Kraken));
        let order = derive_order(&deposit, 93_000.0).expect("deposit derives an order");
        assert_eq!(order.side, OrderSide::Short);
        assert_eq!(order.exchange, "kraken");

        let transfer = classified(FlowSignal::Transfer, None, None);
        assert!(derive_order(&transfer, 93_000.0).is_none());
    }

    #[test]
    fn test_remember_hash_dedups_and_evicts() {
        let mut seen = FnvHashSet::default();
        let mut order = VecDeque::new();

        assert!(remember_hash(&mut seen, &mut order, "a"));
        assert!(!remember_hash(&mut seen, &mut order, "a"));
        assert!(remember_hash(&mut seen, &mut order, "b"));

        for i in 0..SEEN_HASH_CAPACITY {
            remember_hash(&mut seen, &mut order, &format!("fill-{i}"));
        }

        // the earliest hashes were evicted and are fresh again
        assert!(remember_hash(&mut seen, &mut order, "a"));
    }
}
