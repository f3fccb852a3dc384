/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for tinvest-adapter tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use wiremock::MockServer;

use tinvest_adapter::{SecretToken, StreamingConfig};

pub const TEST_TOKEN: &str = "t.test-token";
pub const FIGI: &str = "BBG000B9XRY4";
const WAIT: Duration = Duration::from_secs(5);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Base url of the mock server the REST client should use
pub fn api_base(server: &MockServer) -> String {
    format!("{}/openapi/", server.uri())
}

pub fn test_token() -> SecretToken {
    SecretToken::new(TEST_TOKEN).expect("valid test token")
}

/// Streaming config with fast timings aimed at `url`
pub fn fast_config(url: &str) -> StreamingConfig {
    StreamingConfig {
        reconnect_initial_delay: Duration::from_millis(50),
        reconnect_max_delay: Duration::from_millis(200),
        connect_timeout: Duration::from_secs(2),
        ..StreamingConfig::with_url(url)
    }
}

pub fn orderbook_frame(figi: &str, depth: u8, bid: f64) -> String {
    serde_json::json!({
        "event": "orderbook",
        "time": "2026-01-05T10:00:00.000Z",
        "payload": {
            "figi": figi,
            "depth": depth,
            "bids": [[bid, 10]],
            "asks": [[bid + 0.1, 7]],
        }
    })
    .to_string()
}

/// In-process WebSocket endpoint standing in for the streaming service
pub struct MockStreamServer {
    pub url: String,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    accepts: Arc<AtomicUsize>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        Self::start_on("127.0.0.1:0".parse().expect("loopback addr")).await
    }

    /// Listen on a fixed address, e.g. one a client is already retrying
    pub async fn start_on(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.expect("bind mock server");
        Self::spawn(listener, None)
    }

    /// Every handshake is answered with `status`
    pub async fn rejecting(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        Self::spawn(listener, Some(status))
    }

    /// Reserve a loopback address nobody listens on yet
    pub async fn unused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind scratch port");
        listener.local_addr().expect("local addr")
    }

    fn spawn(listener: TcpListener, reject: Option<u16>) -> Self {
        let addr = listener.local_addr().expect("local addr");
        let (conn_tx, connections) = mpsc::unbounded_channel();
        let accepts = Arc::new(AtomicUsize::new(0));
        let auth_headers = Arc::new(Mutex::new(Vec::new()));

        let accepted = accepts.clone();
        let headers = auth_headers.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                let headers = headers.clone();
                let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    if let Some(value) = request.headers().get(AUTHORIZATION) {
                        headers
                            .lock()
                            .unwrap()
                            .push(value.to_str().unwrap_or_default().to_string());
                    }
                    match reject {
                        Some(status) => {
                            let mut error = ErrorResponse::new(Some("unauthorized".to_string()));
                            *error.status_mut() = StatusCode::from_u16(status).unwrap();
                            Err(error)
                        }
                        None => Ok(response),
                    }
                };
                if let Ok(ws) = accept_hdr_async(stream, callback).await {
                    let _ = conn_tx.send(ServerConnection { ws });
                }
            }
        });

        Self {
            url: format!("ws://{addr}/ws"),
            connections,
            accepts,
            auth_headers,
        }
    }

    pub async fn next_connection(&mut self) -> ServerConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for client connection")
            .expect("mock server stopped")
    }

    pub fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.auth_headers.lock().unwrap().clone()
    }
}

/// Server side of one accepted client socket
pub struct ServerConnection {
    ws: WebSocketStream<TcpStream>,
}

impl ServerConnection {
    /// Next data frame as JSON; control frames are skipped
    pub async fn next_json(&mut self) -> serde_json::Value {
        self.try_next_json(WAIT)
            .await
            .expect("timed out waiting for client frame")
    }

    pub async fn try_next_json(&mut self, wait: Duration) -> Option<serde_json::Value> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let message = tokio::time::timeout_at(deadline, self.ws.next()).await.ok()??;
            match message.ok()? {
                Message::Text(text) => {
                    return Some(serde_json::from_str(text.as_str()).expect("client sent JSON"));
                }
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// Read until the client closes the socket; true if it did within `wait`
    pub async fn closed_by_client(&mut self, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn send_text(&mut self, text: impl Into<String>) {
        self.ws
            .send(Message::Text(text.into().into()))
            .await
            .expect("send to client");
    }
}
