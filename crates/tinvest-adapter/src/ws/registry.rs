/*
[INPUT]:  Attach/detach requests from the public API, payloads from the dispatcher
[OUTPUT]: Per-channel listener sets, subscribe/unsubscribe intents, callback delivery
[POS]:    WebSocket layer - subscription bookkeeping
[UPDATE]: When changing listener lifecycle or delivery guarantees
*/

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::key::ChannelKey;
use super::message::StreamingPayload;

/// Callback invoked for every payload on a channel
pub type Listener = Arc<dyn Fn(&StreamingPayload) + Send + Sync>;

pub(crate) type SharedRegistry = Arc<Mutex<SubscriptionRegistry>>;

/// Lock the registry, recovering from a poisoned mutex
pub(crate) fn lock(registry: &Mutex<SubscriptionRegistry>) -> MutexGuard<'_, SubscriptionRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Wire-level state of a subscription on the current connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireState {
    Pending,
    SubscribeSent,
    Active,
}

/// Outcome of [`SubscriptionRegistry::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    /// First listener for the key; a subscribe must go out
    NewChannel,
    Existing,
}

/// Outcome of [`SubscriptionRegistry::detach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// Last listener removed; the entry is gone and an unsubscribe must go out
    LastListener,
    Remaining(usize),
    NotFound,
}

#[derive(Clone)]
struct ListenerSlot {
    id: ListenerId,
    active: Arc<AtomicBool>,
    callback: Listener,
}

struct SubscriptionEntry {
    listeners: Vec<ListenerSlot>,
    wire: WireState,
}

/// Live subscriptions keyed by channel
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<ChannelKey, SubscriptionEntry>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(key, entry)| (key, (entry.wire, entry.listeners.len()))),
            )
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, key: ChannelKey, callback: Listener) -> (ListenerId, Attached) {
        let id = ListenerId::next();
        let slot = ListenerSlot {
            id,
            active: Arc::new(AtomicBool::new(true)),
            callback,
        };

        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.listeners.push(slot);
                (id, Attached::Existing)
            }
            None => {
                self.entries.insert(
                    key,
                    SubscriptionEntry {
                        listeners: vec![slot],
                        wire: WireState::Pending,
                    },
                );
                (id, Attached::NewChannel)
            }
        }
    }

    pub fn detach(&mut self, key: &ChannelKey, id: ListenerId) -> Detached {
        let Some(entry) = self.entries.get_mut(key) else {
            return Detached::NotFound;
        };
        let Some(index) = entry.listeners.iter().position(|slot| slot.id == id) else {
            return Detached::NotFound;
        };

        let slot = entry.listeners.remove(index);
        slot.active.store(false, Ordering::SeqCst);

        if entry.listeners.is_empty() {
            self.entries.remove(key);
            Detached::LastListener
        } else {
            Detached::Remaining(entry.listeners.len())
        }
    }

    /// Every key that currently has at least one listener
    pub fn snapshot(&self) -> Vec<ChannelKey> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn listener_count(&self, key: &ChannelKey) -> usize {
        self.entries.get(key).map_or(0, |entry| entry.listeners.len())
    }

    pub fn wire_state(&self, key: &ChannelKey) -> Option<WireState> {
        self.entries.get(key).map(|entry| entry.wire)
    }

    /// Move a pending entry to `SubscribeSent`. Returns false when the key is
    /// gone or already subscribed on this connection.
    pub fn mark_subscribe_sent(&mut self, key: &ChannelKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if entry.wire == WireState::Pending => {
                entry.wire = WireState::SubscribeSent;
                true
            }
            _ => false,
        }
    }

    /// Connection dropped: nothing is subscribed server-side anymore
    pub fn reset_wire_state(&mut self) {
        for entry in self.entries.values_mut() {
            entry.wire = WireState::Pending;
        }
    }

    fn listeners_for(&mut self, key: &ChannelKey) -> Vec<ListenerSlot> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.wire = WireState::Active;
                entry.listeners.clone()
            }
            None => Vec::new(),
        }
    }
}

/// Deliver `payload` to every listener on `key` in registration order.
///
/// Listeners run outside the registry lock so they may attach or detach from
/// inside the callback. A listener detached mid-delivery is skipped, and a
/// panicking listener does not stop delivery to the rest. Returns the number
/// of listeners invoked.
pub fn dispatch(registry: &Mutex<SubscriptionRegistry>, key: &ChannelKey, payload: &StreamingPayload) -> usize {
    let listeners = lock(registry).listeners_for(key);

    let mut delivered = 0;
    for slot in listeners {
        if !slot.active.load(Ordering::SeqCst) {
            continue;
        }
        delivered += 1;
        if catch_unwind(AssertUnwindSafe(|| (slot.callback)(payload))).is_err() {
            warn!(channel = %key, "subscriber callback panicked; continuing delivery");
        }
    }
    delivered
}
