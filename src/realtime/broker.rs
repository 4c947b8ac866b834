//! # Change Broker
//!
//! In-process fan-out of [`ChangeEvent`]s to live subscribers.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: events are
//! offered with `try_send`, and a subscriber whose queue is full is
//! disconnected rather than allowed to stall the publisher or grow without
//! bound. Sequence numbers are stamped under the registry lock, so every
//! subscriber sees events in sequence order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::event::ChangeEvent;

/// Default per-subscriber queue length
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Events a subscriber may fall behind before it is disconnected
    pub queue_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Outcome of one publish
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// Sequence number assigned to the event
    pub sequence: u64,
    /// Subscribers the event was queued for
    pub delivered: usize,
    /// Subscribers disconnected because their queue was full
    pub evicted: usize,
    /// Subscribers already gone
    pub pruned: usize,
}

#[derive(Debug)]
struct Connection {
    sender: mpsc::Sender<ChangeEvent>,
    evicted: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Registry {
    connections: HashMap<u64, Connection>,
    next_id: u64,
    last_sequence: u64,
}

#[derive(Debug)]
struct Inner {
    registry: RwLock<Registry>,
    config: BrokerConfig,
}

impl Inner {
    fn unregister(&self, id: u64) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.connections.remove(&id).is_some() {
            debug!(subscriber = id, "subscriber unregistered");
        }
    }
}

/// Cloneable handle to a shared broker
#[derive(Debug, Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Register a new subscriber. It receives every event published from
    /// now until it is dropped or evicted.
    pub fn subscribe(&self) -> Subscriber {
        let (sender, receiver) = mpsc::channel(self.inner.config.queue_capacity.max(1));
        let evicted = Arc::new(AtomicBool::new(false));

        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.connections.insert(
            id,
            Connection {
                sender,
                evicted: evicted.clone(),
            },
        );
        debug!(subscriber = id, total = registry.connections.len(), "subscriber registered");

        Subscriber {
            id,
            receiver,
            evicted,
            broker: Arc::downgrade(&self.inner),
        }
    }

    /// Stamp `event` with the next sequence number and offer it to every
    /// subscriber. Never blocks and never fails.
    pub fn publish(&self, mut event: ChangeEvent) -> DispatchResult {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.last_sequence += 1;
        event.sequence = registry.last_sequence;

        let mut result = DispatchResult {
            sequence: event.sequence,
            ..Default::default()
        };

        registry.connections.retain(|id, conn| {
            match conn.sender.try_send(event.clone()) {
                Ok(()) => {
                    result.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = *id, "subscriber queue full, disconnecting");
                    conn.evicted.store(true, Ordering::SeqCst);
                    result.evicted += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    result.pruned += 1;
                    false
                }
            }
        });

        debug!(
            sequence = result.sequence,
            kind = %event.event_kind,
            namespace = %event.namespace,
            delivered = result.delivered,
            "event published"
        );
        result
    }

    /// Current number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .registry
            .read()
            .map(|r| r.connections.len())
            .unwrap_or(0)
    }

    /// Drop every subscriber queue so their streams end. Used on shutdown.
    pub fn close_all(&self) {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let closed = registry.connections.len();
        registry.connections.clear();
        debug!(closed, "all subscribers closed");
    }
}

/// Receiving end of a subscription. Unregisters itself when dropped.
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    receiver: mpsc::Receiver<ChangeEvent>,
    evicted: Arc<AtomicBool>,
    broker: Weak<Inner>,
}

impl Subscriber {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the subscription has ended and its queue
    /// is drained
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Next already-queued event, without waiting
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Whether the broker disconnected this subscriber for falling behind
    pub fn was_evicted(&self) -> bool {
        self.evicted.load(Ordering::SeqCst)
    }

    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send {
        stream::unfold(self, |mut subscriber| async move {
            subscriber.recv().await.map(|event| (event, subscriber))
        })
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if let Some(inner) = self.broker.upgrade() {
            inner.unregister(self.id);
        }
    }
}
