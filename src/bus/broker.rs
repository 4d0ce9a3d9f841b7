//! Broker seam: the connection, channel and delivery abstractions that the
//! emitter and consumer are written against.
//!
//! Implementations:
//! - `InMemoryBroker` - topic exchange in process memory (tests, single process)
//! - `AmqpConnection` - RabbitMQ over lapin (requires the `amqp` feature)

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::error::BusError;
use super::routing::{RoutingKey, RoutingPattern};

/// Exchange used for log events unless configured otherwise.
pub const LOGS_EXCHANGE: &str = "logs_topic";

/// Exchange routing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Topic,
    Direct,
    Fanout,
}

/// Everything needed to (re)declare an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

impl ExchangeSpec {
    /// A durable topic exchange.
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
        }
    }
}

impl Default for ExchangeSpec {
    fn default() -> Self {
        Self::topic(LOGS_EXCHANGE)
    }
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> Result<(), BusError>;

    /// Negatively acknowledge; `requeue = false` drops or dead-letters.
    async fn reject(&self, requeue: bool) -> Result<(), BusError>;
}

/// A message received from a queue, not yet settled.
pub struct Delivery {
    pub routing_key: RoutingKey,
    pub payload: Vec<u8>,
    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(routing_key: RoutingKey, payload: Vec<u8>, acker: Box<dyn Acker>) -> Self {
        Self {
            routing_key,
            payload,
            acker,
        }
    }

    pub async fn ack(&self) -> Result<(), BusError> {
        self.acker.ack().await
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), BusError> {
        self.acker.reject(requeue).await
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Unbounded, non-restartable stream of deliveries for one queue.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BusError>>;

/// A long-lived broker connection. Shared read-only between emitters and
/// consumers; only `ConnectionManager` drives its lifecycle.
#[async_trait]
pub trait Broker: Send + Sync {
    type Channel: Channel + 'static;

    /// Open a short-lived channel. Callers must `close` it on every path.
    async fn open_channel(&self) -> Result<Self::Channel, BusError>;

    fn is_open(&self) -> bool;

    async fn close(&self) -> Result<(), BusError>;
}

/// A channel (session) multiplexed over a `Broker` connection.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Declare an exchange. Repeating an identical declaration is a no-op.
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BusError>;

    /// Declare a server-named, exclusive, auto-deleting queue.
    async fn declare_queue(&self) -> Result<String, BusError>;

    /// Bind a queue to an exchange. Repeating an identical binding is a no-op.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &RoutingPattern,
    ) -> Result<(), BusError>;

    /// Publish without waiting for a broker confirm.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &RoutingKey,
        payload: Vec<u8>,
    ) -> Result<(), BusError>;

    /// Start consuming a queue with manual acknowledgement. At most
    /// `prefetch` deliveries are outstanding (unsettled) at once.
    async fn consume(&self, queue: &str, prefetch: u16) -> Result<DeliveryStream, BusError>;

    async fn close(&self) -> Result<(), BusError>;
}
