//! In-memory topic exchange for testing and single-process scenarios.
//!
//! Implements `Broker` and `Channel` with AMQP topic semantics so the emitter
//! and consumer can be exercised without a running broker:
//! - exchanges are declared idempotently; a conflicting redeclaration fails
//! - queues are server-named, exclusive to the declaring channel and deleted
//!   when that channel closes
//! - a message is delivered at most once per queue, however many of the
//!   queue's bindings match
//! - acks, rejections and unroutable publishes are recorded for assertions

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use super::broker::{
    Acker, Broker, Channel, Delivery, DeliveryStream, ExchangeKind, ExchangeSpec,
};
use super::error::BusError;
use super::routing::{RoutingKey, RoutingPattern};

type DeliverySender = mpsc::UnboundedSender<Result<Delivery, BusError>>;
type DeliveryReceiver = mpsc::UnboundedReceiver<Result<Delivery, BusError>>;

struct Exchange {
    kind: ExchangeKind,
    durable: bool,
    bindings: BTreeSet<(String, RoutingPattern)>,
}

struct Queue {
    owner: u64,
    prefetch: Option<u16>,
    sender: DeliverySender,
    receiver: Option<DeliveryReceiver>,
}

/// A message recorded by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub exchange: String,
    pub routing_key: RoutingKey,
    pub payload: Vec<u8>,
    /// Number of queues the message was routed to.
    pub routed_to: usize,
}

#[derive(Default)]
struct State {
    closed: bool,
    next_id: u64,
    exchanges: HashMap<String, Exchange>,
    queues: HashMap<String, Queue>,
    open_channels: HashSet<u64>,
    published: Vec<Published>,
    acked: Vec<RoutingKey>,
    rejected: Vec<(RoutingKey, bool)>,
}

/// Thread-safe in-memory broker. Clones share the same exchanges and queues.
///
/// ## Example
///
/// ```ignore
/// let broker = InMemoryBroker::new();
/// let consumer = Consumer::new(&broker);
/// let mut subscription = consumer.subscribe(&["LOG.*".into()]).await?;
///
/// EventEmitter::new(&broker)
///     .push(&LogEvent::new("test", "hello"), &"LOG.INFO".into())
///     .await?;
///
/// let received = subscription.next_delivery().await;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBroker")
            .field("open", &self.is_open())
            .field("open_channels", &self.open_channels())
            .field("queues", &self.queues())
            .finish()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefetch limit the consumer of `queue` asked for.
    pub fn prefetch(&self, queue: &str) -> Option<u16> {
        self.lock().queues.get(queue).and_then(|q| q.prefetch)
    }

    /// Number of channels opened and not yet closed.
    pub fn open_channels(&self) -> usize {
        self.lock().open_channels.len()
    }

    /// Names of the queues currently declared.
    pub fn queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Bindings of an exchange as `(queue, pattern)` pairs.
    pub fn bindings(&self, exchange: &str) -> Vec<(String, RoutingPattern)> {
        self.lock()
            .exchanges
            .get(exchange)
            .map(|ex| ex.bindings.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_exchange(&self, exchange: &str) -> bool {
        self.lock().exchanges.contains_key(exchange)
    }

    /// Every message accepted by `publish`, in order.
    pub fn published(&self) -> Vec<Published> {
        self.lock().published.clone()
    }

    /// Routing keys of acknowledged deliveries, in order.
    pub fn acked(&self) -> Vec<RoutingKey> {
        self.lock().acked.clone()
    }

    /// Routing keys of rejected deliveries with their requeue flag.
    pub fn rejected(&self) -> Vec<(RoutingKey, bool)> {
        self.lock().rejected.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, channel: u64) {
        let mut state = self.lock();
        state.open_channels.remove(&channel);

        let owned: Vec<String> = state
            .queues
            .iter()
            .filter(|(_, q)| q.owner == channel)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &owned {
            state.queues.remove(name);
        }
        for exchange in state.exchanges.values_mut() {
            exchange.bindings.retain(|(queue, _)| !owned.contains(queue));
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    type Channel = InMemoryChannel;

    async fn open_channel(&self) -> Result<InMemoryChannel, BusError> {
        let mut state = self.lock();
        if state.closed {
            return Err(BusError::ChannelClosed);
        }
        state.next_id += 1;
        let id = state.next_id;
        state.open_channels.insert(id);
        Ok(InMemoryChannel {
            id,
            broker: self.clone(),
        })
    }

    fn is_open(&self) -> bool {
        !self.lock().closed
    }

    async fn close(&self) -> Result<(), BusError> {
        let mut state = self.lock();
        state.closed = true;
        state.open_channels.clear();
        // Dropping the senders ends every consumer stream.
        state.queues.clear();
        for exchange in state.exchanges.values_mut() {
            exchange.bindings.clear();
        }
        Ok(())
    }
}

/// A channel on an `InMemoryBroker`.
pub struct InMemoryChannel {
    id: u64,
    broker: InMemoryBroker,
}

impl InMemoryChannel {
    fn open_state(&self) -> Result<MutexGuard<'_, State>, BusError> {
        let state = self.broker.lock();
        if state.closed || !state.open_channels.contains(&self.id) {
            return Err(BusError::ChannelClosed);
        }
        Ok(state)
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BusError> {
        let mut state = self.open_state()?;
        let existing = state
            .exchanges
            .get(&spec.name)
            .map(|ex| (ex.kind, ex.durable));
        match existing {
            Some(settings) if settings != (spec.kind, spec.durable) => {
                Err(BusError::PreconditionFailed(format!(
                    "exchange {} redeclared with different settings",
                    spec.name
                )))
            }
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(
                    spec.name.clone(),
                    Exchange {
                        kind: spec.kind,
                        durable: spec.durable,
                        bindings: BTreeSet::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn declare_queue(&self) -> Result<String, BusError> {
        let mut state = self.open_state()?;
        state.next_id += 1;
        let name = format!("amq.gen-{}", state.next_id);
        let (sender, receiver) = mpsc::unbounded_channel();
        state.queues.insert(
            name.clone(),
            Queue {
                owner: self.id,
                prefetch: None,
                sender,
                receiver: Some(receiver),
            },
        );
        Ok(name)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &RoutingPattern,
    ) -> Result<(), BusError> {
        let mut state = self.open_state()?;
        if !state.queues.contains_key(queue) {
            return Err(BusError::NotFound(format!("queue {}", queue)));
        }
        let ex = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| BusError::NotFound(format!("exchange {}", exchange)))?;
        ex.bindings.insert((queue.to_string(), pattern.clone()));
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &RoutingKey,
        payload: Vec<u8>,
    ) -> Result<(), BusError> {
        let mut state = self.open_state()?;
        let ex = state
            .exchanges
            .get(exchange)
            .ok_or_else(|| BusError::NotFound(format!("exchange {}", exchange)))?;

        let targets: BTreeSet<String> = ex
            .bindings
            .iter()
            .filter(|(_, pattern)| match ex.kind {
                ExchangeKind::Topic => pattern.matches(routing_key),
                ExchangeKind::Direct => pattern.as_str() == routing_key.as_str(),
                ExchangeKind::Fanout => true,
            })
            .map(|(queue, _)| queue.clone())
            .collect();

        let mut routed_to = 0;
        for queue in &targets {
            if let Some(q) = state.queues.get(queue) {
                let acker = Box::new(InMemoryAcker {
                    broker: self.broker.clone(),
                    routing_key: routing_key.clone(),
                });
                let delivery = Delivery::new(routing_key.clone(), payload.clone(), acker);
                if q.sender.send(Ok(delivery)).is_ok() {
                    routed_to += 1;
                }
            }
        }

        state.published.push(Published {
            exchange: exchange.to_string(),
            routing_key: routing_key.clone(),
            payload,
            routed_to,
        });
        Ok(())
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<DeliveryStream, BusError> {
        let mut state = self.open_state()?;
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BusError::NotFound(format!("queue {}", queue)))?;
        let receiver = q.receiver.take().ok_or_else(|| {
            BusError::PreconditionFailed(format!("queue {} already has a consumer", queue))
        })?;
        q.prefetch = Some(prefetch);

        Ok(stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.broker.release(self.id);
        Ok(())
    }
}

struct InMemoryAcker {
    broker: InMemoryBroker,
    routing_key: RoutingKey,
}

#[async_trait]
impl Acker for InMemoryAcker {
    async fn ack(&self) -> Result<(), BusError> {
        self.broker.lock().acked.push(self.routing_key.clone());
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BusError> {
        self.broker
            .lock()
            .rejected
            .push((self.routing_key.clone(), requeue));
        Ok(())
    }
}
