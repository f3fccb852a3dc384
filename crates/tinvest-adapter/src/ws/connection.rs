/*
[INPUT]:  Streaming config, access token, subscribe/unsubscribe intents, socket frames
[OUTPUT]: One managed WebSocket connection with reconnect, resubscribe and keepalive
[POS]:    WebSocket layer - connection lifecycle (the only code touching the wire)
[UPDATE]: When changing reconnection backoff, resubscribe policy, or shutdown semantics
*/

use std::collections::HashSet;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::StreamingConfig;
use super::dispatch::dispatch_text;
use super::heartbeat::{Heartbeat, HeartbeatTick};
use super::key::ChannelKey;
use super::message::OutboundCommand;
use super::queue::OutboundQueue;
use super::registry::{SharedRegistry, lock};
use crate::auth::SecretToken;
use crate::http::{InvestError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of the streaming connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Open,
    Closing,
    /// Handshake rejected the credential; the manager has stopped
    Unauthorized { status: u16 },
}

/// Intent sent from the public API to the connection task
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConnectionCommand {
    Subscribe(ChannelKey),
    Unsubscribe(ChannelKey),
}

#[derive(Debug)]
enum SessionExit {
    Dropped(String),
    Shutdown,
}

/// Owns the socket, the outbound queue and the heartbeat. Runs as one task.
pub(crate) struct ConnectionManager {
    config: StreamingConfig,
    token: SecretToken,
    registry: SharedRegistry,
    queue: OutboundQueue,
    cmd_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: StreamingConfig,
        token: SecretToken,
        registry: SharedRegistry,
        cmd_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        state_tx: watch::Sender<ConnectionState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            token,
            registry,
            queue: OutboundQueue::new(),
            cmd_rx,
            state_tx,
            shutdown,
        }
    }

    /// Connect, serve, reconnect until shutdown. Only a rejected credential ends
    /// the loop with an error.
    pub(crate) async fn run(mut self) -> Result<()> {
        let mut failures: u32 = 0;

        let result = 'run: loop {
            if self.shutdown.is_cancelled() {
                break 'run Ok(());
            }

            self.set_state(ConnectionState::Connecting {
                attempt: failures.saturating_add(1),
            });

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break 'run Ok(()),
                connected = connect(&self.config, &self.token) => connected,
            };

            match connected {
                Ok(stream) => {
                    failures = 0;
                    self.set_state(ConnectionState::Open);
                    info!(url = %self.config.url, "streaming connection open");

                    match self.session(stream).await {
                        SessionExit::Shutdown => break 'run Ok(()),
                        SessionExit::Dropped(reason) => {
                            warn!(%reason, "streaming connection lost; reconnecting");
                        }
                    }
                    lock(&self.registry).reset_wire_state();
                }
                Err(InvestError::Unauthorized { status }) => {
                    error!(status, "streaming handshake rejected credential; giving up");
                    self.set_state(ConnectionState::Unauthorized { status });
                    return Err(InvestError::Unauthorized { status });
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    warn!(failures, error = %err, "streaming connect failed");
                }
            }

            let delay = self.config.backoff(failures.saturating_sub(1));
            debug!(?delay, failures, "waiting before reconnect");
            if !self.wait_before_retry(delay).await {
                break 'run Ok(());
            }
        };

        self.set_state(ConnectionState::Disconnected);
        info!("streaming connection manager stopped");
        result
    }

    /// Serve one open socket until it drops or shutdown is requested
    async fn session(&mut self, stream: WsStream) -> SessionExit {
        let (mut sink, mut source) = stream.split();
        let mut on_wire: HashSet<ChannelKey> = HashSet::new();

        self.resubscribe_from_snapshot(&mut on_wire);
        if let Err(err) = self.queue.flush(&mut sink).await {
            return SessionExit::Dropped(format!("send failed: {err}"));
        }

        let mut heartbeat = Heartbeat::new(self.config.ping_interval, self.config.pong_timeout);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return SessionExit::Shutdown;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        self.set_state(ConnectionState::Closing);
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return SessionExit::Shutdown;
                    };
                    self.stage_command(cmd, &mut on_wire);
                    if let Err(err) = self.queue.flush(&mut sink).await {
                        return SessionExit::Dropped(format!("send failed: {err}"));
                    }
                }
                incoming = source.next() => {
                    match incoming {
                        Some(Ok(message)) => {
                            heartbeat.record_activity();
                            match message {
                                WsMessage::Text(text) => {
                                    dispatch_text(&self.registry, text.as_str());
                                }
                                WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
                                    Ok(text) => {
                                        dispatch_text(&self.registry, text);
                                    }
                                    Err(_) => debug!(bytes = bytes.len(), "ws binary frame is not utf-8"),
                                },
                                WsMessage::Close(frame) => {
                                    return SessionExit::Dropped(format!("server closed connection: {frame:?}"));
                                }
                                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                            }
                        }
                        Some(Err(err)) => return SessionExit::Dropped(err.to_string()),
                        None => return SessionExit::Dropped("stream ended".to_string()),
                    }
                }
                tick = heartbeat.tick() => {
                    match tick {
                        HeartbeatTick::SendPing => {
                            if let Err(err) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                                return SessionExit::Dropped(format!("ping failed: {err}"));
                            }
                            heartbeat.ping_sent();
                        }
                        HeartbeatTick::Expired => {
                            return SessionExit::Dropped(format!(
                                "no pong within {:?}",
                                self.config.pong_timeout
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Replace whatever is queued with one subscribe per live registry key
    fn resubscribe_from_snapshot(&mut self, on_wire: &mut HashSet<ChannelKey>) {
        let keys = {
            let mut registry = lock(&self.registry);
            let keys = registry.snapshot();
            for key in &keys {
                registry.mark_subscribe_sent(key);
            }
            keys
        };

        let superseded = self
            .queue
            .rebuild(keys.iter().cloned().map(OutboundCommand::subscribe));
        info!(
            subscriptions = keys.len(),
            superseded,
            "resubscribing live channels"
        );
        on_wire.extend(keys);
    }

    /// Turn an intent into a wire command while open, deduplicating against
    /// what this socket has already been told.
    fn stage_command(&mut self, cmd: ConnectionCommand, on_wire: &mut HashSet<ChannelKey>) {
        match cmd {
            ConnectionCommand::Subscribe(key) => {
                let fresh = lock(&self.registry).mark_subscribe_sent(&key);
                if fresh && on_wire.insert(key.clone()) {
                    self.queue.enqueue(OutboundCommand::subscribe(key));
                }
            }
            ConnectionCommand::Unsubscribe(key) => {
                let live = lock(&self.registry).contains(&key);
                if !live && on_wire.remove(&key) {
                    self.queue.enqueue(OutboundCommand::unsubscribe(key));
                }
            }
        }
    }

    /// Sleep out the backoff, queueing intents meanwhile. False on shutdown.
    async fn wait_before_retry(&mut self, delay: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = &mut sleep => return true,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnectionCommand::Subscribe(key)) => {
                        self.queue.enqueue(OutboundCommand::subscribe(key));
                    }
                    Some(ConnectionCommand::Unsubscribe(key)) => {
                        self.queue.enqueue(OutboundCommand::unsubscribe(key));
                    }
                    None => return false,
                },
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

async fn connect(config: &StreamingConfig, token: &SecretToken) -> Result<WsStream> {
    let mut request = config.url.as_str().into_client_request()?;
    let auth = HeaderValue::from_str(&token.bearer())
        .map_err(|err| InvestError::Config(format!("invalid token header: {err}")))?;
    request.headers_mut().insert(AUTHORIZATION, auth);

    let (stream, _response) = tokio::time::timeout(config.connect_timeout, connect_async(request))
        .await
        .map_err(|_| InvestError::Timeout {
            duration: config.connect_timeout.as_secs(),
        })??;
    Ok(stream)
}
