/*
[INPUT]:  Access token, streaming config, per-channel subscription requests
[OUTPUT]: Callback delivery / async update streams for orderbook, candle, instrument_info
[POS]:    WebSocket layer - public streaming surface
[UPDATE]: When adding channels or changing subscription lifecycle
*/

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::StreamingConfig;
use super::connection::{ConnectionCommand, ConnectionManager, ConnectionState};
use super::key::ChannelKey;
use super::message::{CandleStreaming, InstrumentInfoStreaming, OrderbookStreaming, StreamingPayload};
use super::registry::{Attached, Detached, Listener, ListenerId, SharedRegistry, SubscriptionRegistry, lock};
use crate::auth::SecretToken;
use crate::http::{InvestError, Result};
use crate::types::{CandleInterval, Depth};

/// Subscriber callback for one channel kind
pub type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Payload type carried by exactly one channel kind
pub trait ChannelPayload: Clone + Send + 'static {
    fn from_payload(payload: &StreamingPayload) -> Option<&Self>;
}

impl ChannelPayload for OrderbookStreaming {
    fn from_payload(payload: &StreamingPayload) -> Option<&Self> {
        match payload {
            StreamingPayload::Orderbook(book) => Some(book),
            _ => None,
        }
    }
}

impl ChannelPayload for CandleStreaming {
    fn from_payload(payload: &StreamingPayload) -> Option<&Self> {
        match payload {
            StreamingPayload::Candle(candle) => Some(candle),
            _ => None,
        }
    }
}

impl ChannelPayload for InstrumentInfoStreaming {
    fn from_payload(payload: &StreamingPayload) -> Option<&Self> {
        match payload {
            StreamingPayload::InstrumentInfo(info) => Some(info),
            _ => None,
        }
    }
}

struct WorkerSlot {
    pending: Option<ConnectionManager>,
    handle: Option<JoinHandle<Result<()>>>,
}

struct StreamingInner {
    registry: SharedRegistry,
    cmd_tx: mpsc::UnboundedSender<ConnectionCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    worker: Mutex<WorkerSlot>,
}

impl StreamingInner {
    fn worker(&self) -> std::sync::MutexGuard<'_, WorkerSlot> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_worker_if_needed(&self) {
        let mut slot = self.worker();
        if slot.handle.is_some() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("StreamingClient used without Tokio runtime; connection not started");
            return;
        }
        let Some(manager) = slot.pending.take() else {
            return;
        };
        debug!("starting streaming connection task");
        slot.handle = Some(tokio::spawn(manager.run()));
    }

    /// Register `listener` on `key`; the first listener triggers a wire subscribe
    fn attach(self: &Arc<Self>, key: ChannelKey, listener: Listener) -> SubscriptionHandle {
        self.start_worker_if_needed();

        let id = {
            let mut registry = lock(&self.registry);
            let (id, attached) = registry.attach(key.clone(), listener);
            if attached == Attached::NewChannel {
                let _ = self.cmd_tx.send(ConnectionCommand::Subscribe(key.clone()));
            }
            id
        };

        SubscriptionHandle {
            inner: Arc::downgrade(self),
            key,
            id,
            detached: AtomicBool::new(false),
        }
    }

    fn detach(&self, key: &ChannelKey, id: ListenerId) {
        let mut registry = lock(&self.registry);
        if registry.detach(key, id) == Detached::LastListener {
            let _ = self.cmd_tx.send(ConnectionCommand::Unsubscribe(key.clone()));
        }
    }
}

/// Holds the task handle while `wait` awaits it; a dropped wait puts it back
struct WorkerJoin<'a> {
    inner: &'a StreamingInner,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Drop for WorkerJoin<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let mut slot = self.inner.worker();
            if slot.handle.is_none() {
                slot.handle = Some(handle);
            }
        }
    }
}

impl Drop for StreamingInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Multiplexed market data stream over one managed WebSocket connection.
///
/// The connection task starts with the first subscription and reconnects on
/// its own; subscriptions survive reconnects. Cloning shares the connection.
#[derive(Clone)]
pub struct StreamingClient {
    inner: Arc<StreamingInner>,
}

impl fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingClient")
            .field("state", &*self.inner.state_rx.borrow())
            .field("registry", &*lock(&self.inner.registry))
            .finish()
    }
}

impl StreamingClient {
    /// Create a client for the production streaming endpoint
    pub fn new(token: SecretToken) -> Result<Self> {
        Self::with_config(token, StreamingConfig::default())
    }

    pub fn with_config(token: SecretToken, config: StreamingConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(Mutex::new(SubscriptionRegistry::new()));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let shutdown = CancellationToken::new();

        let manager = ConnectionManager::new(
            config,
            token,
            Arc::clone(&registry),
            cmd_rx,
            state_tx,
            shutdown.clone(),
        );

        Ok(Self {
            inner: Arc::new(StreamingInner {
                registry,
                cmd_tx,
                state_rx,
                shutdown,
                worker: Mutex::new(WorkerSlot {
                    pending: Some(manager),
                    handle: None,
                }),
            }),
        })
    }

    /// Open the connection without waiting for a subscription
    pub fn start(&self) {
        self.inner.start_worker_if_needed();
    }

    /// Order book updates for `figi`. Depth defaults to 3.
    pub fn subscribe_orderbook(
        &self,
        figi: impl Into<String>,
        depth: Option<Depth>,
        callback: Option<Callback<OrderbookStreaming>>,
    ) -> SubscriptionHandle {
        let key = ChannelKey::orderbook(figi, depth.unwrap_or_default());
        self.subscribe(key, callback)
    }

    /// Candles for `figi`. Interval defaults to one minute.
    pub fn subscribe_candle(
        &self,
        figi: impl Into<String>,
        interval: Option<CandleInterval>,
        callback: Option<Callback<CandleStreaming>>,
    ) -> SubscriptionHandle {
        let key = ChannelKey::candle(figi, interval.unwrap_or_default());
        self.subscribe(key, callback)
    }

    pub fn subscribe_instrument_info(
        &self,
        figi: impl Into<String>,
        callback: Option<Callback<InstrumentInfoStreaming>>,
    ) -> SubscriptionHandle {
        self.subscribe(ChannelKey::instrument_info(figi), callback)
    }

    pub fn orderbook_updates(&self, figi: impl Into<String>, depth: Option<Depth>) -> Updates<OrderbookStreaming> {
        self.updates(ChannelKey::orderbook(figi, depth.unwrap_or_default()))
    }

    pub fn candle_updates(
        &self,
        figi: impl Into<String>,
        interval: Option<CandleInterval>,
    ) -> Updates<CandleStreaming> {
        self.updates(ChannelKey::candle(figi, interval.unwrap_or_default()))
    }

    pub fn instrument_info_updates(&self, figi: impl Into<String>) -> Updates<InstrumentInfoStreaming> {
        self.updates(ChannelKey::instrument_info(figi))
    }

    /// Subscribe `callback` to `key`. `None` keeps the channel open with no delivery.
    pub fn subscribe<T: ChannelPayload>(&self, key: ChannelKey, callback: Option<Callback<T>>) -> SubscriptionHandle {
        let listener: Listener = match callback {
            Some(callback) => Arc::new(move |payload: &StreamingPayload| {
                if let Some(item) = T::from_payload(payload) {
                    callback(item);
                }
            }),
            None => Arc::new(|_payload: &StreamingPayload| {}),
        };
        self.inner.attach(key, listener)
    }

    /// Receive `key` payloads as an async stream instead of a callback
    pub fn updates<T: ChannelPayload>(&self, key: ChannelKey) -> Updates<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Listener = Arc::new(move |payload: &StreamingPayload| {
            if let Some(item) = T::from_payload(payload) {
                let _ = tx.send(item.clone());
            }
        });
        Updates {
            rx,
            handle: self.inner.attach(key, listener),
        }
    }

    /// Watch connection lifecycle transitions
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state_rx.borrow().clone()
    }

    /// Keys with at least one live listener
    pub fn subscriptions(&self) -> Vec<ChannelKey> {
        lock(&self.inner.registry).snapshot()
    }

    /// Close the socket, stop reconnecting and wait for the connection task.
    /// Returns the task's error if it had already stopped on a rejected token.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.shutdown.cancel();
        self.wait().await
    }

    /// Wait for the connection task to finish without requesting shutdown.
    /// Resolves immediately if the task never started or was already awaited.
    /// Dropping the returned future leaves the task awaitable again.
    pub async fn wait(&self) -> Result<()> {
        let handle = self.inner.worker().handle.take();
        let mut join = WorkerJoin {
            inner: &self.inner,
            handle,
        };
        let Some(handle) = join.handle.as_mut() else {
            return Ok(());
        };
        let joined = handle.await;
        join.handle = None;
        match joined {
            Ok(result) => result,
            Err(err) => Err(InvestError::Worker(err.to_string())),
        }
    }
}

/// Ticket for one attached listener. It does not keep the client alive.
pub struct SubscriptionHandle {
    inner: Weak<StreamingInner>,
    key: ChannelKey,
    id: ListenerId,
    detached: AtomicBool,
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl SubscriptionHandle {
    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Detach this listener. The last listener on a key also unsubscribes it
    /// on the wire. Calling again, or after the client is gone, is a no-op.
    pub fn unsubscribe(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.detach(&self.key, self.id);
        }
    }
}

/// Async receiver of one channel's payloads. Detaches on drop.
pub struct Updates<T> {
    rx: mpsc::UnboundedReceiver<T>,
    handle: SubscriptionHandle,
}

impl<T> fmt::Debug for Updates<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updates").field("handle", &self.handle).finish()
    }
}

impl<T> Updates<T> {
    /// Next payload; `None` after `close()` once buffered items are drained
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn key(&self) -> &ChannelKey {
        self.handle.key()
    }

    /// Detach from the channel; already buffered payloads stay readable
    pub fn close(&mut self) {
        self.handle.unsubscribe();
        self.rx.close();
    }
}

impl<T> Stream for Updates<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for Updates<T> {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}
