//! Broker port: named queues with at-least-once delivery.
//!
//! The shape mirrors an AMQP channel using the default exchange: publishing
//! routes by queue name, consumers acknowledge each delivery, and a delivery
//! that is never acknowledged goes back to its queue when the consumer goes
//! away. Correctness of request/reply on top of it is recovered through
//! correlation ids (see `crate::rpc`).

use std::sync::Arc;

use async_trait::async_trait;

/// Errors raised by a broker implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("connection to broker at {host} failed: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("queue {0:?} does not exist")]
    QueueNotFound(String),

    #[error("queue {0:?} is exclusive and already has a consumer")]
    ExclusiveLocked(String),

    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),

    #[error("broker closed")]
    Closed,
}

/// Options applied when a queue is declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Survives broker restarts.
    pub durable: bool,
    /// Private to the declaring connection, single consumer.
    pub exclusive: bool,
}

impl QueueOptions {
    pub fn durable() -> Self {
        Self {
            durable: true,
            exclusive: false,
        }
    }

    pub fn exclusive() -> Self {
        Self {
            durable: false,
            exclusive: true,
        }
    }
}

/// Message metadata used by the request/reply protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub reply_to: Option<String>,
    pub correlation_id: Option<String>,
}

/// Body plus properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            properties: MessageProperties::default(),
        }
    }

    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.properties.reply_to = Some(queue.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.properties.correlation_id = Some(id.into());
        self
    }

    pub fn body_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

/// One message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub queue: String,
    pub message: Message,
    /// True when this message was delivered before and not acknowledged.
    pub redelivered: bool,
}

/// Connection-level operations.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare (or re-declare) a queue. An empty name asks the broker to
    /// generate one; the effective name is returned. Declaring is idempotent.
    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<String, BrokerError>;

    /// Publish to a declared queue.
    async fn publish(&self, queue: &str, message: Message) -> Result<(), BrokerError>;

    /// Start consuming. `prefetch` bounds unacknowledged deliveries
    /// (0 = unbounded).
    async fn consume(&self, queue: &str, prefetch: u16) -> Result<Box<dyn Consumer>, BrokerError>;
}

/// A consumer on one queue.
///
/// Dropping a consumer returns its unacknowledged deliveries to the queue.
#[async_trait]
pub trait Consumer: Send {
    fn queue(&self) -> &str;

    /// Wait for the next delivery.
    async fn next(&mut self) -> Result<Delivery, BrokerError>;

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// Refuse a delivery, optionally putting it back on the queue.
    async fn reject(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError>;
}

/// Opens broker connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str) -> Result<Arc<dyn Broker>, BrokerError>;
}
