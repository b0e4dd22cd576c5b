//! InMemoryBroker - an in-process broker for tests and single-host runs.
//!
//! Queues live in one map behind a std `Mutex`; each queue owns a `Notify`
//! that wakes waiting consumers on publish and requeue. The lock is never held
//! across an await, and a consumer's `Drop` (which cannot await) uses the same
//! lock to return its unacknowledged deliveries. Dropping the last consumer of
//! an exclusive queue deletes the queue.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use ulid::Ulid;

use crate::ports::{Broker, BrokerError, Connector, Consumer, Delivery, Message, QueueOptions};

struct Pending {
    message: Message,
    redelivered: bool,
}

struct QueueState {
    options: QueueOptions,
    ready: VecDeque<Pending>,
    consumers: usize,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, QueueState>,
    next_tag: u64,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    failing_connects: AtomicU32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloning yields another handle on the same broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `attempts` calls to `connect` fail.
    pub fn fail_next_connects(&self, attempts: u32) {
        self.shared.failing_connects.store(attempts, Ordering::SeqCst);
    }

    /// Messages waiting in `queue` (not counting unacknowledged ones).
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        self.shared.lock().queues.get(queue).map(|q| q.ready.len())
    }

    /// Shut the broker down; waiting consumers see `BrokerError::Closed`.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        state.closed = true;
        for queue in state.queues.values() {
            queue.notify.notify_waiters();
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<String, BrokerError> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        let name = if name.is_empty() {
            format!("amq.gen-{}", Ulid::new())
        } else {
            name.to_string()
        };
        state.queues.entry(name.clone()).or_insert_with(|| QueueState {
            options,
            ready: VecDeque::new(),
            consumers: 0,
            notify: Arc::new(Notify::new()),
        });
        Ok(name)
    }

    async fn publish(&self, queue: &str, message: Message) -> Result<(), BrokerError> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        let target = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        target.ready.push_back(Pending {
            message,
            redelivered: false,
        });
        target.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<Box<dyn Consumer>, BrokerError> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        let target = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        if target.options.exclusive && target.consumers > 0 {
            return Err(BrokerError::ExclusiveLocked(queue.to_string()));
        }
        target.consumers += 1;
        Ok(Box::new(InMemoryConsumer {
            shared: self.shared.clone(),
            queue: queue.to_string(),
            notify: target.notify.clone(),
            prefetch,
            unacked: BTreeMap::new(),
        }))
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn connect(&self, host: &str) -> Result<Arc<dyn Broker>, BrokerError> {
        let refused = self
            .shared
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(BrokerError::ConnectionFailed {
                host: host.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(Arc::new(self.clone()))
    }
}

struct InMemoryConsumer {
    shared: Arc<Shared>,
    queue: String,
    notify: Arc<Notify>,
    prefetch: u16,
    unacked: BTreeMap<u64, Message>,
}

impl InMemoryConsumer {
    fn at_prefetch_limit(&self) -> bool {
        self.prefetch > 0 && self.unacked.len() >= self.prefetch as usize
    }

    fn requeue(&self, state: &mut State, message: Message) {
        if let Some(queue) = state.queues.get_mut(&self.queue) {
            queue.ready.push_front(Pending {
                message,
                redelivered: true,
            });
            queue.notify.notify_waiters();
        }
    }
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn next(&mut self) -> Result<Delivery, BrokerError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.shared.lock();
                if state.closed {
                    return Err(BrokerError::Closed);
                }
                if !self.at_prefetch_limit() {
                    let popped = state
                        .queues
                        .get_mut(&self.queue)
                        .and_then(|q| q.ready.pop_front());
                    if let Some(pending) = popped {
                        state.next_tag += 1;
                        let delivery_tag = state.next_tag;
                        self.unacked.insert(delivery_tag, pending.message.clone());
                        return Ok(Delivery {
                            delivery_tag,
                            queue: self.queue.clone(),
                            message: pending.message,
                            redelivered: pending.redelivered,
                        });
                    }
                }
            }
            notified.await;
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.unacked
            .remove(&delivery_tag)
            .map(|_| ())
            .ok_or(BrokerError::UnknownDeliveryTag(delivery_tag))
    }

    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        let message = self
            .unacked
            .remove(&delivery_tag)
            .ok_or(BrokerError::UnknownDeliveryTag(delivery_tag))?;
        if requeue {
            let mut state = self.shared.lock();
            self.requeue(&mut state, message);
        }
        Ok(())
    }
}

impl Drop for InMemoryConsumer {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let Some(queue) = state.queues.get_mut(&self.queue) else {
            return;
        };
        queue.consumers = queue.consumers.saturating_sub(1);
        // an exclusive queue goes away with its consumer, messages included
        if queue.options.exclusive && queue.consumers == 0 {
            state.queues.remove(&self.queue);
            return;
        }
        let unacked = std::mem::take(&mut self.unacked);
        // newest first so the oldest ends up at the head
        for (_, message) in unacked.into_iter().rev() {
            self.requeue(&mut state, message);
        }
    }
}
