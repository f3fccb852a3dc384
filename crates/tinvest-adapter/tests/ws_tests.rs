/*
[INPUT]:  WebSocket test scenarios against an in-process mock endpoint
[OUTPUT]: Test results for the streaming client
[POS]:    Integration tests - WebSocket
[UPDATE]: When WebSocket client changes
*/

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{FIGI, MockStreamServer, TEST_TOKEN, fast_config, orderbook_frame, test_token};
use futures_util::StreamExt;
use tinvest_adapter::{
    CandleInterval,
    ConnectionState,
    Depth,
    InvestError,
    OrderbookStreaming,
    StreamingClient,
    StreamingConfig,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const QUIET: Duration = Duration::from_millis(300);
const WAIT: Duration = Duration::from_secs(5);

fn client_for(server: &MockStreamServer) -> StreamingClient {
    assert_ok!(StreamingClient::with_config(test_token(), fast_config(&server.url)))
}

fn forwarding(tx: &mpsc::UnboundedSender<OrderbookStreaming>) -> tinvest_adapter::Callback<OrderbookStreaming> {
    let tx = tx.clone();
    Box::new(move |book: &OrderbookStreaming| {
        let _ = tx.send(book.clone());
    })
}

async fn wait_for_state(client: &StreamingClient, expected: ConnectionState) {
    let mut state = client.connection_state();
    let reached = timeout(WAIT, state.wait_for(|current| *current == expected)).await;
    assert!(matches!(reached, Ok(Ok(_))), "state never became {expected:?}");
}

#[tokio::test]
async fn test_duplicate_subscribe_sends_once() {
    let mut server = MockStreamServer::start().await;
    let client = client_for(&server);

    let _first = client.subscribe_orderbook(FIGI, None, None);
    let _second = client.subscribe_orderbook(FIGI, Some(Depth::new(3).unwrap()), None);

    let mut conn = server.next_connection().await;
    let msg = conn.next_json().await;
    assert_eq!(msg["event"], "orderbook:subscribe");
    assert_eq!(msg["figi"], FIGI);
    assert_eq!(msg["depth"], 3);
    assert!(msg["requestId"].is_string());
    assert!(conn.try_next_json(QUIET).await.is_none());

    assert_eq!(server.auth_headers(), vec![format!("Bearer {TEST_TOKEN}")]);
    assert_ok!(client.shutdown().await);
}

#[tokio::test]
async fn test_orderbook_scenario_with_two_callbacks() {
    let mut server = MockStreamServer::start().await;
    let client = client_for(&server);
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();

    let a = client.subscribe_orderbook(FIGI, Some(Depth::new(3).unwrap()), Some(forwarding(&tx_a)));
    let b = client.subscribe_orderbook(FIGI, Some(Depth::new(3).unwrap()), Some(forwarding(&tx_b)));

    let mut conn = server.next_connection().await;
    assert_eq!(conn.next_json().await["event"], "orderbook:subscribe");

    conn.send_text(orderbook_frame(FIGI, 3, 150.5)).await;
    let got_a = timeout(WAIT, rx_a.recv()).await.unwrap().unwrap();
    let got_b = timeout(WAIT, rx_b.recv()).await.unwrap().unwrap();
    assert_eq!(got_a, got_b);
    assert_eq!(got_a.bids[0].1, rust_decimal::Decimal::from(10));

    a.unsubscribe();
    assert!(conn.try_next_json(QUIET).await.is_none());

    conn.send_text(orderbook_frame(FIGI, 3, 151.0)).await;
    assert!(timeout(WAIT, rx_b.recv()).await.unwrap().is_some());
    assert!(rx_a.try_recv().is_err());

    b.unsubscribe();
    b.unsubscribe();
    let msg = conn.next_json().await;
    assert_eq!(msg["event"], "orderbook:unsubscribe");
    assert_eq!(msg["figi"], FIGI);
    assert_eq!(msg["depth"], 3);
    assert!(conn.try_next_json(QUIET).await.is_none());

    conn.send_text(orderbook_frame(FIGI, 3, 152.0)).await;
    tokio::time::sleep(QUIET).await;
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());

    assert_ok!(client.shutdown().await);
}

#[tokio::test]
async fn test_reconnect_resubscribes_live_set() {
    let mut server = MockStreamServer::start().await;
    let client = client_for(&server);

    let _book = client.subscribe_orderbook(FIGI, None, None);
    let _candle = client.subscribe_candle(FIGI, Some(CandleInterval::FiveMinutes), None);
    let _info = client.subscribe_instrument_info("BBG004730N88", None);
    let dead = client.subscribe_instrument_info("BBG000BPH459", None);
    dead.unsubscribe();

    let expected: BTreeSet<(String, String)> = [
        ("orderbook:subscribe", FIGI),
        ("candle:subscribe", FIGI),
        ("instrument_info:subscribe", "BBG004730N88"),
    ]
    .into_iter()
    .map(|(event, figi)| (event.to_string(), figi.to_string()))
    .collect();

    async fn read_subscribes(conn: &mut common::ServerConnection, count: usize) -> BTreeSet<(String, String)> {
        let mut seen = BTreeSet::new();
        for _ in 0..count {
            let msg = conn.next_json().await;
            seen.insert((
                msg["event"].as_str().unwrap().to_string(),
                msg["figi"].as_str().unwrap().to_string(),
            ));
        }
        assert!(conn.try_next_json(QUIET).await.is_none());
        seen
    }

    let mut first = server.next_connection().await;
    assert_eq!(read_subscribes(&mut first, 3).await, expected);

    drop(first);

    let mut second = server.next_connection().await;
    assert_eq!(read_subscribes(&mut second, 3).await, expected);
    assert_eq!(server.accept_count(), 2);

    assert_ok!(client.shutdown().await);
}

#[tokio::test]
async fn test_intents_during_backoff_reach_next_session() {
    let addr = MockStreamServer::unused_addr().await;
    let config = StreamingConfig {
        reconnect_initial_delay: Duration::from_millis(400),
        reconnect_max_delay: Duration::from_millis(400),
        ..fast_config(&format!("ws://{addr}/ws"))
    };
    let client = assert_ok!(StreamingClient::with_config(test_token(), config));

    let _a = client.subscribe_orderbook(FIGI, Some(Depth::new(5).unwrap()), None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_ne!(client.state(), ConnectionState::Open);

    let _b = client.subscribe_instrument_info("BBG004730N88", None);
    let c = client.subscribe_candle(FIGI, Some(CandleInterval::Hour), None);
    c.unsubscribe();

    let mut server = MockStreamServer::start_on(addr).await;
    let mut conn = server.next_connection().await;

    let mut seen = BTreeSet::new();
    for _ in 0..2 {
        let msg = conn.next_json().await;
        let event = msg["event"].as_str().unwrap().to_string();
        if event == "orderbook:subscribe" {
            assert_eq!(msg["depth"], 5);
        }
        seen.insert((event, msg["figi"].as_str().unwrap().to_string()));
    }
    let expected: BTreeSet<(String, String)> = [
        ("orderbook:subscribe".to_string(), FIGI.to_string()),
        ("instrument_info:subscribe".to_string(), "BBG004730N88".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(seen, expected);
    assert!(conn.try_next_json(QUIET).await.is_none());
    assert_eq!(server.accept_count(), 1);

    assert_ok!(client.shutdown().await);
}

#[tokio::test]
async fn test_unanswered_ping_triggers_reconnect() {
    let mut server = MockStreamServer::start().await;
    let config = StreamingConfig {
        ping_interval: Duration::from_millis(100),
        pong_timeout: Duration::from_millis(150),
        ..fast_config(&server.url)
    };
    let client = assert_ok!(StreamingClient::with_config(test_token(), config));
    let _info = client.subscribe_instrument_info(FIGI, None);

    // never read from the first socket, so its pings stay unanswered
    let _silent = server.next_connection().await;
    let mut second = server.next_connection().await;

    assert_eq!(second.next_json().await["event"], "instrument_info:subscribe");
    assert!(server.accept_count() >= 2);

    assert_ok!(client.shutdown().await);
}

#[tokio::test]
async fn test_unknown_event_is_discarded() {
    let mut server = MockStreamServer::start().await;
    let client = client_for(&server);
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = calls.clone();
    let _handle = client.subscribe_orderbook(
        FIGI,
        None,
        Some(Box::new(move |book: &OrderbookStreaming| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(book.clone());
        })),
    );

    let mut conn = server.next_connection().await;
    conn.next_json().await;
    wait_for_state(&client, ConnectionState::Open).await;

    conn.send_text(r#"{"event":"orderbook_v2","payload":{"figi":"BBG000B9XRY4","depth":3}}"#).await;
    conn.send_text("not even json").await;
    conn.send_text(r#"{"event":"error","payload":{"error":"unknown figi","request_id":"x"}}"#).await;
    conn.send_text(orderbook_frame(FIGI, 3, 150.5)).await;

    let book = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(book.figi, FIGI);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(client.subscriptions().len(), 1);
    assert!(conn.try_next_json(QUIET).await.is_none());

    assert_ok!(client.shutdown().await);
}

#[tokio::test]
async fn test_updates_stream_detaches_on_drop() {
    let mut server = MockStreamServer::start().await;
    let client = client_for(&server);
    let mut updates = client.orderbook_updates(FIGI, None);

    let mut conn = server.next_connection().await;
    conn.next_json().await;
    conn.send_text(orderbook_frame(FIGI, 3, 150.5)).await;

    let book = timeout(WAIT, updates.next()).await.unwrap().unwrap();
    assert_eq!(book.depth.get(), 3);

    drop(updates);
    assert_eq!(conn.next_json().await["event"], "orderbook:unsubscribe");
    assert!(client.subscriptions().is_empty());

    assert_ok!(client.shutdown().await);
}

#[tokio::test]
async fn test_rejected_token_stops_reconnecting() {
    let server = MockStreamServer::rejecting(401).await;
    let client = client_for(&server);
    let _handle = client.subscribe_instrument_info(FIGI, None);

    let result = assert_ok!(timeout(WAIT, client.wait()).await);
    let err = assert_err!(result);
    assert!(matches!(err, InvestError::Unauthorized { status: 401 }));
    assert!(err.is_auth_error());
    assert_eq!(client.state(), ConnectionState::Unauthorized { status: 401 });

    tokio::time::sleep(QUIET).await;
    assert_eq!(server.accept_count(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_socket() {
    let mut server = MockStreamServer::start().await;
    let client = client_for(&server);
    client.start();

    let mut conn = server.next_connection().await;
    wait_for_state(&client, ConnectionState::Open).await;

    assert_ok!(client.shutdown().await);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(conn.closed_by_client(WAIT).await);

    // a second shutdown has nothing left to stop
    assert_ok!(client.shutdown().await);
}
