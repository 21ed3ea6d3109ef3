use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::topology::dead_letter_queue_for;
use crate::{
    Acknowledger, Broker, BrokerError, Connector, Delivery, DeliveryStream, MessageHeaders,
    OutboundMessage, QueueBinding, Result,
};

#[derive(Debug, Clone)]
struct StoredMessage {
    payload: Vec<u8>,
    headers: MessageHeaders,
    redelivered: bool,
}

struct MemoryQueue {
    messages: Mutex<VecDeque<StoredMessage>>,
    notify: Notify,
    acknowledged: AtomicU64,
}

impl MemoryQueue {
    fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            acknowledged: AtomicU64::new(0),
        }
    }

    fn messages(&self) -> MutexGuard<'_, VecDeque<StoredMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_back(&self, message: StoredMessage) {
        self.messages().push_back(message);
        self.notify.notify_one();
    }

    fn push_front(&self, message: StoredMessage) {
        self.messages().push_front(message);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<StoredMessage> {
        let mut messages = self.messages();
        let message = messages.pop_front();
        if message.is_some() && !messages.is_empty() {
            // Another consumer on the same queue may be waiting.
            self.notify.notify_one();
        }
        message
    }
}

#[derive(Default)]
struct Topology {
    /// Exchange name to bound queue names.
    exchanges: HashMap<String, Vec<String>>,
    queues: HashMap<String, Arc<MemoryQueue>>,
}

#[derive(Default)]
struct Inner {
    topology: RwLock<Topology>,
    unavailable: AtomicBool,
    fail_on_publish: AtomicBool,
    /// Bumped on disconnect; consumers from an older generation end.
    generation: AtomicU64,
    published: AtomicU64,
}

/// In-memory broker with fan-out semantics, for tests and single-process runs.
///
/// A publish to an exchange with no bound queue fails with
/// [`BrokerError::Unroutable`], as a mandatory AMQP publish is returned.
/// Queues buffer messages until a consumer takes them.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    /// Creates a new empty in-memory broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the broker going away (or coming back).
    ///
    /// While unavailable, connecting and publishing fail and open consumer
    /// streams end.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
        if unavailable {
            self.disconnect_consumers();
        }
    }

    /// Configures publishes to fail while the broker stays reachable.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.inner.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Ends every open consumer stream, as a dropped connection would.
    pub fn disconnect_consumers(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        for queue in self.read_topology().queues.values() {
            queue.notify.notify_waiters();
        }
    }

    /// Total number of messages accepted by `publish`.
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::SeqCst)
    }

    /// Number of messages waiting in a queue.
    pub async fn queue_depth(&self, queue: &str) -> usize {
        match self.queue(queue) {
            Some(q) => q.messages().len(),
            None => 0,
        }
    }

    /// Number of deliveries settled on a queue (acked, retried or dead-lettered).
    pub async fn acknowledged_count(&self, queue: &str) -> u64 {
        match self.queue(queue) {
            Some(q) => q.acknowledged.load(Ordering::SeqCst),
            None => 0,
        }
    }

    /// Snapshot of the messages parked in `queue`'s dead-letter queue.
    pub async fn dead_letters(&self, queue: &str) -> Vec<OutboundMessage> {
        match self.queue(&dead_letter_queue_for(queue)) {
            Some(q) => q
                .messages()
                .iter()
                .map(|m| OutboundMessage::new(m.payload.clone(), m.headers.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Queues bound to an exchange.
    pub fn bound_queues(&self, exchange: &str) -> Vec<String> {
        self.read_topology()
            .exchanges
            .get(exchange)
            .cloned()
            .unwrap_or_default()
    }

    fn queue(&self, name: &str) -> Option<Arc<MemoryQueue>> {
        self.read_topology().queues.get(name).cloned()
    }

    fn read_topology(&self) -> RwLockReadGuard<'_, Topology> {
        self.inner
            .topology
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_topology(&self) -> RwLockWriteGuard<'_, Topology> {
        self.inner
            .topology
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(&self, exchange: &str) -> Result<()> {
        self.ensure_available()?;
        self.write_topology()
            .exchanges
            .entry(exchange.to_string())
            .or_default();
        Ok(())
    }

    async fn declare_queue(&self, binding: &QueueBinding) -> Result<()> {
        self.ensure_available()?;
        let mut topology = self.write_topology();

        let Some(bound) = topology.exchanges.get_mut(&binding.exchange) else {
            return Err(BrokerError::Declare {
                name: binding.queue.clone(),
                reason: format!("exchange '{}' does not exist", binding.exchange),
            });
        };
        if !bound.contains(&binding.queue) {
            bound.push(binding.queue.clone());
        }

        topology
            .queues
            .entry(binding.queue.clone())
            .or_insert_with(|| Arc::new(MemoryQueue::new()));
        topology
            .queues
            .entry(binding.dead_letter_queue())
            .or_insert_with(|| Arc::new(MemoryQueue::new()));
        Ok(())
    }

    async fn publish(&self, exchange: &str, message: OutboundMessage) -> Result<()> {
        self.ensure_available()?;
        if self.inner.fail_on_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                exchange: exchange.to_string(),
                reason: "publish rejected".to_string(),
            });
        }

        let targets: Vec<Arc<MemoryQueue>> = {
            let topology = self.read_topology();
            let Some(bound) = topology.exchanges.get(exchange) else {
                return Err(BrokerError::Publish {
                    exchange: exchange.to_string(),
                    reason: "exchange does not exist".to_string(),
                });
            };
            bound
                .iter()
                .filter_map(|name| topology.queues.get(name).cloned())
                .collect()
        };
        if targets.is_empty() {
            return Err(BrokerError::Unroutable {
                exchange: exchange.to_string(),
                reason: "no queue bound".to_string(),
            });
        }

        for queue in targets {
            queue.push_back(StoredMessage {
                payload: message.payload.clone(),
                headers: message.headers.clone(),
                redelivered: false,
            });
        }
        self.inner.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream> {
        self.ensure_available()?;
        let (source, dead_letter) = {
            let topology = self.read_topology();
            let source = topology.queues.get(queue).cloned();
            let dead_letter = topology.queues.get(&dead_letter_queue_for(queue)).cloned();
            match (source, dead_letter) {
                (Some(s), Some(d)) => (s, d),
                _ => {
                    return Err(BrokerError::Consume {
                        queue: queue.to_string(),
                        reason: "queue does not exist".to_string(),
                    });
                }
            }
        };

        tracing::debug!(queue, consumer_tag, "in-memory consumer started");

        let state = ConsumerState {
            inner: self.inner.clone(),
            generation: self.inner.generation.load(Ordering::SeqCst),
            queue_name: queue.to_string(),
            source,
            dead_letter,
        };

        let stream = futures_util::stream::unfold(state, |state| async move {
            loop {
                let source = state.source.clone();
                let notified = source.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if state.inner.generation.load(Ordering::SeqCst) != state.generation {
                    return None;
                }

                if let Some(message) = source.pop() {
                    let delivery = state.delivery(message);
                    return Some((Ok(delivery), state));
                }

                notified.await;
            }
        });

        Ok(Box::pin(stream))
    }

    fn is_connected(&self) -> bool {
        !self.inner.unavailable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn connect(&self) -> Result<Arc<dyn Broker>> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection(
                "in-memory broker unavailable".to_string(),
            ));
        }
        Ok(Arc::new(self.clone()))
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

struct ConsumerState {
    inner: Arc<Inner>,
    generation: u64,
    queue_name: String,
    source: Arc<MemoryQueue>,
    dead_letter: Arc<MemoryQueue>,
}

impl ConsumerState {
    fn delivery(&self, message: StoredMessage) -> Delivery {
        let acker = MemoryAcker {
            source: self.source.clone(),
            dead_letter: self.dead_letter.clone(),
            original: message.clone(),
            settled: AtomicBool::new(false),
        };
        Delivery::new(
            self.queue_name.clone(),
            message.payload,
            message.headers,
            message.redelivered,
            Box::new(acker),
        )
    }
}

/// Settles one delivery. A delivery dropped unsettled goes back to the
/// head of its queue marked redelivered, as AMQP does for unacked messages
/// when the channel closes.
struct MemoryAcker {
    source: Arc<MemoryQueue>,
    dead_letter: Arc<MemoryQueue>,
    original: StoredMessage,
    settled: AtomicBool,
}

impl MemoryAcker {
    fn settle(&self) {
        self.settled.store(true, Ordering::SeqCst);
    }

    fn redelivery(&self) -> StoredMessage {
        StoredMessage {
            redelivered: true,
            ..self.original.clone()
        }
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        self.settle();
        self.source.acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn requeue(&self) -> Result<()> {
        self.settle();
        self.source.push_front(self.redelivery());
        Ok(())
    }

    async fn retry(&self, payload: &[u8], headers: &MessageHeaders) -> Result<()> {
        self.source.push_back(StoredMessage {
            payload: payload.to_vec(),
            headers: headers.clone(),
            redelivered: false,
        });
        self.ack().await
    }

    async fn dead_letter(&self, payload: &[u8], headers: &MessageHeaders) -> Result<()> {
        self.dead_letter.push_back(StoredMessage {
            payload: payload.to_vec(),
            headers: headers.clone(),
            redelivered: false,
        });
        self.ack().await
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if !self.settled.load(Ordering::SeqCst) {
            self.source.push_front(self.redelivery());
        }
    }
}
