//! Integration tests for the realtime channel's reconnect behaviour,
//! driven against local TCP listeners.

use futures::{SinkExt, StreamExt};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use whaleflow_data::RealtimeEvent;
use whaleflow_monitor::{ConnectionStatus, WebSocketClient, WebSocketConfig};

/// Bind then immediately drop a listener to obtain an address that refuses
/// connections.
async fn refused_addr() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    listener.local_addr().expect("local_addr failed")
}

#[tokio::test]
async fn three_failures_schedule_three_delayed_retries() {
    let addr = refused_addr().await;
    let delay = Duration::from_millis(100);

    let config = WebSocketConfig::new(format!("ws://{addr}"))
        .with_reconnect_delay(delay)
        .with_connect_timeout(Duration::from_secs(1));
    let (handle, _event_rx, mut status_rx) = WebSocketClient::with_config(config).start();

    let start = Instant::now();
    let mut connecting_seen = 0;
    while connecting_seen < 4 {
        let status = timeout(Duration::from_secs(5), status_rx.recv())
            .await
            .expect("status update overdue")
            .expect("status channel closed");
        match status {
            ConnectionStatus::Connecting => connecting_seen += 1,
            ConnectionStatus::Retrying | ConnectionStatus::Open => {}
            ConnectionStatus::Disposed => panic!("channel disposed unexpectedly"),
        }
    }

    // initial attempt plus three retries, each scheduled after the fixed delay
    assert!(
        start.elapsed() >= delay * 3,
        "retries fired faster than the configured delay: {:?}",
        start.elapsed()
    );

    handle.dispose().await;
}

#[tokio::test]
async fn dispose_cancels_pending_retry() {
    let addr = refused_addr().await;

    let config = WebSocketConfig::new(format!("ws://{addr}"))
        .with_reconnect_delay(Duration::from_secs(30))
        .with_connect_timeout(Duration::from_secs(1));
    let (handle, _event_rx, mut status_rx) = WebSocketClient::with_config(config).start();

    // wait for the first failed attempt to enter the retry state
    loop {
        let status = timeout(Duration::from_secs(5), status_rx.recv())
            .await
            .expect("status update overdue")
            .expect("status channel closed");
        if status == ConnectionStatus::Retrying {
            break;
        }
    }

    handle.dispose().await;

    // disposal interrupts the 30s retry timer immediately
    let status = timeout(Duration::from_secs(2), status_rx.recv())
        .await
        .expect("disposal overdue");
    assert_eq!(status, Some(ConnectionStatus::Disposed));

    // the task ended; no further reconnect attempt is ever published
    let end = timeout(Duration::from_secs(2), status_rx.recv())
        .await
        .expect("channel close overdue");
    assert_eq!(end, None);
}

#[tokio::test]
async fn reconnects_never_overlap_and_resync_on_initial_data() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().expect("local_addr failed");

    let current = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));

    // Server accepts, sends the resynchronization frame, then drops the
    // connection to force the client back through the reconnect cycle.
    {
        let current = current.clone();
        let max_concurrent = max_concurrent.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let current = current.clone();
                let max_concurrent = max_concurrent.clone();
                tokio::spawn(async move {
                    let live = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(live, Ordering::SeqCst);

                    if let Ok(mut ws) = accept_async(stream).await {
                        let frame = serde_json::to_string(&RealtimeEvent::InitialData)
                            .expect("serialize failed");
                        let _ = ws.send(Message::Text(frame.into())).await;
                        let _ = ws.close(None).await;
                        while let Some(msg) = ws.next().await {
                            if msg.is_err() {
                                break;
                            }
                        }
                    }

                    current.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
    }

    let config = WebSocketConfig::new(format!("ws://{addr}"))
        .with_reconnect_delay(Duration::from_millis(200))
        .with_connect_timeout(Duration::from_secs(1));
    let (handle, mut event_rx, _status_rx) = WebSocketClient::with_config(config).start();

    // each reconnect yields a fresh initial_data resynchronization point
    for _ in 0..3 {
        let event = timeout(Duration::from_secs(5), event_rx.recv())
            .await
            .expect("event overdue")
            .expect("event channel closed");
        assert_eq!(event, RealtimeEvent::InitialData);
    }

    assert_eq!(
        max_concurrent.load(Ordering::SeqCst),
        1,
        "two connections were open simultaneously"
    );

    handle.dispose().await;
}

#[tokio::test]
async fn malformed_frame_is_dropped_without_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind failed");
    let addr = listener.local_addr().expect("local_addr failed");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept failed");
        let mut ws = accept_async(stream).await.expect("handshake failed");

        let _ = ws.send(Message::Text("{not valid json".into())).await;
        let frame =
            serde_json::to_string(&RealtimeEvent::NewOrder { order: None }).expect("serialize");
        let _ = ws.send(Message::Text(frame.into())).await;

        // hold the connection open until the client disposes
        while let Some(msg) = ws.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    let config = WebSocketConfig::new(format!("ws://{addr}"))
        .with_reconnect_delay(Duration::from_millis(200))
        .with_connect_timeout(Duration::from_secs(1));
    let (handle, mut event_rx, mut status_rx) = WebSocketClient::with_config(config).start();

    // the valid frame after the malformed one still arrives on the same
    // connection
    let event = timeout(Duration::from_secs(5), event_rx.recv())
        .await
        .expect("event overdue")
        .expect("event channel closed");
    assert_eq!(event, RealtimeEvent::NewOrder { order: None });

    handle.dispose().await;

    // exactly one connection attempt was made
    let mut connecting_seen = 0;
    while let Ok(Some(status)) = timeout(Duration::from_secs(2), status_rx.recv()).await {
        if status == ConnectionStatus::Connecting {
            connecting_seen += 1;
        }
        if status == ConnectionStatus::Disposed {
            break;
        }
    }
    assert_eq!(connecting_seen, 1);
}
