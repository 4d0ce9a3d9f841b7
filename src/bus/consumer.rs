//! Event consumer: binds an exclusive queue to a topic exchange and routes
//! each received event to a topic handler.
//!
//! ## Delivery handling
//!
//! Every delivery is handled on its own task, so a slow or failing handler
//! never stalls reception. Outcomes are settled explicitly:
//!
//! | outcome                         | settlement             |
//! |---------------------------------|------------------------|
//! | handler succeeded               | `ack`                  |
//! | handler failed                  | `reject(requeue=false)`|
//! | payload could not be decoded    | `reject(requeue=false)`|
//! | no route for the routing key    | `reject(requeue=false)`|
//!
//! Rejected messages are dropped, or dead-lettered if the broker has a
//! dead-letter exchange configured for the queue.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::broker::{Broker, Channel, Delivery, DeliveryStream, ExchangeSpec};
use super::error::{BusError, HandlerError, SubscribeError};
use super::routing::{RoutingKey, RoutingPattern};

/// Handles events of one topic category.
#[async_trait]
pub trait EventHandler<T>: Send + Sync {
    async fn handle(&self, routing_key: &RoutingKey, event: T) -> Result<(), HandlerError>;
}

/// Maps routing keys to handlers. First matching route wins.
pub struct TopicRouter<T> {
    routes: Vec<(RoutingPattern, Arc<dyn EventHandler<T>>)>,
}

impl<T> Default for TopicRouter<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> Clone for TopicRouter<T> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
        }
    }
}

impl<T> TopicRouter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a pattern. Builder style.
    pub fn route(
        mut self,
        pattern: impl Into<RoutingPattern>,
        handler: Arc<dyn EventHandler<T>>,
    ) -> Self {
        self.routes.push((pattern.into(), handler));
        self
    }

    /// Registered patterns, in registration order.
    pub fn patterns(&self) -> Vec<RoutingPattern> {
        self.routes.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn resolve(&self, routing_key: &RoutingKey) -> Option<Arc<dyn EventHandler<T>>> {
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(routing_key))
            .map(|(_, handler)| Arc::clone(handler))
    }
}

/// A decoded event together with its unsettled delivery.
pub struct Received<T> {
    pub routing_key: RoutingKey,
    pub event: T,
    delivery: Delivery,
}

impl<T> Received<T> {
    pub async fn ack(&self) -> Result<(), BusError> {
        self.delivery.ack().await
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), BusError> {
        self.delivery.reject(requeue).await
    }
}

/// Counters reported when a listen loop ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListenStats {
    /// Deliveries taken off the queue.
    pub received: usize,
    /// Events whose handler succeeded.
    pub handled: usize,
    /// Events whose handler failed or whose payload did not decode.
    pub failed: usize,
    /// Events with no matching route.
    pub unroutable: usize,
}

enum Settled {
    Handled,
    Failed,
    Unroutable,
}

/// An active subscription: one exclusive queue and the channel that owns it.
///
/// The delivery sequence is unbounded and cannot be restarted; once it ends a
/// new `subscribe` call is required. `close` releases the channel, which also
/// deletes the queue.
pub struct Subscription<C: Channel> {
    channel: C,
    queue: String,
    deliveries: DeliveryStream,
}

impl<C: Channel> fmt::Debug for Subscription<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<C: Channel + 'static> Subscription<C> {
    /// Server-assigned queue name.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Next raw delivery, or `None` once the channel is gone. Cancel-safe.
    pub async fn next_delivery(&mut self) -> Option<Result<Delivery, BusError>> {
        self.deliveries.next().await
    }

    /// Next delivery decoded as JSON `T`.
    ///
    /// A payload that fails to decode is rejected and reported as an error
    /// item; the subscription stays usable.
    pub async fn next_event<T: DeserializeOwned>(
        &mut self,
    ) -> Option<Result<Received<T>, HandlerError>> {
        let delivery = match self.next_delivery().await? {
            Ok(delivery) => delivery,
            Err(e) => return Some(Err(HandlerError::Other(Box::new(e)))),
        };
        match serde_json::from_slice::<T>(&delivery.payload) {
            Ok(event) => Some(Ok(Received {
                routing_key: delivery.routing_key.clone(),
                event,
                delivery,
            })),
            Err(e) => {
                if let Err(reject) = delivery.reject(false).await {
                    warn!(error = %reject, routing_key = %delivery.routing_key, "reject failed");
                }
                Some(Err(HandlerError::from(e)))
            }
        }
    }

    /// Lazy sequence of decoded events. The channel is closed when the
    /// underlying delivery stream ends.
    pub fn into_events<T>(self) -> BoxStream<'static, Result<Received<T>, HandlerError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        stream::unfold(Some(self), |state| async move {
            let mut subscription = state?;
            match subscription.next_event::<T>().await {
                Some(item) => Some((item, Some(subscription))),
                None => {
                    if let Err(e) = subscription.close().await {
                        warn!(error = %e, "closing subscription channel");
                    }
                    None
                }
            }
        })
        .boxed()
    }

    pub async fn close(self) -> Result<(), BusError> {
        self.channel.close().await
    }
}

/// Deliveries a consumer holds unsettled at once unless told otherwise.
pub const DEFAULT_PREFETCH: u16 = 32;

/// Subscribes to a topic exchange over a borrowed broker connection.
pub struct Consumer<'a, B: Broker> {
    broker: &'a B,
    exchange: ExchangeSpec,
    prefetch: u16,
}

impl<'a, B: Broker> Consumer<'a, B> {
    /// Consumer for the default logs topic exchange.
    pub fn new(broker: &'a B) -> Self {
        Self::with_exchange(broker, ExchangeSpec::default())
    }

    pub fn with_exchange(broker: &'a B, exchange: ExchangeSpec) -> Self {
        Self {
            broker,
            exchange,
            prefetch: DEFAULT_PREFETCH,
        }
    }

    /// Cap on unsettled deliveries. This is both the broker prefetch and the
    /// number of handlers `listen` runs concurrently. Zero is treated as one.
    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = prefetch.max(1);
        self
    }

    /// Declare the exchange and an exclusive queue, bind the queue once per
    /// pattern and start consuming.
    ///
    /// On any setup failure the channel is closed before returning.
    pub async fn subscribe(
        &self,
        patterns: &[RoutingPattern],
    ) -> Result<Subscription<B::Channel>, SubscribeError> {
        if patterns.is_empty() {
            return Err(SubscribeError::NoBindings);
        }

        let channel = self
            .broker
            .open_channel()
            .await
            .map_err(SubscribeError::Channel)?;

        match self.setup(&channel, patterns).await {
            Ok((queue, deliveries)) => {
                info!(queue = %queue, exchange = %self.exchange.name, bindings = ?patterns, "subscribed");
                Ok(Subscription {
                    channel,
                    queue,
                    deliveries,
                })
            }
            Err(e) => {
                if let Err(close) = channel.close().await {
                    warn!(error = %close, "closing channel after failed subscribe");
                }
                Err(e)
            }
        }
    }

    async fn setup(
        &self,
        channel: &B::Channel,
        patterns: &[RoutingPattern],
    ) -> Result<(String, DeliveryStream), SubscribeError> {
        channel
            .declare_exchange(&self.exchange)
            .await
            .map_err(SubscribeError::Declare)?;
        let queue = channel
            .declare_queue()
            .await
            .map_err(SubscribeError::Declare)?;

        for pattern in patterns {
            channel
                .bind_queue(&queue, &self.exchange.name, pattern)
                .await
                .map_err(|source| SubscribeError::Bind {
                    pattern: pattern.clone(),
                    source,
                })?;
        }

        let deliveries = channel
            .consume(&queue, self.prefetch)
            .await
            .map_err(SubscribeError::Consume)?;
        Ok((queue, deliveries))
    }

    /// Subscribe with `bindings` and route events until the subscription ends.
    pub async fn listen<T>(
        &self,
        bindings: &[RoutingPattern],
        router: TopicRouter<T>,
    ) -> Result<ListenStats, SubscribeError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.listen_until(bindings, router, std::future::pending())
            .await
    }

    /// Like `listen`, but also stops when `shutdown` resolves.
    ///
    /// Subscribe failures are returned. Once subscribed, per-event failures
    /// are logged and counted, never propagated. In-flight handlers are
    /// drained before the channel is closed.
    pub async fn listen_until<T, S>(
        &self,
        bindings: &[RoutingPattern],
        router: TopicRouter<T>,
        shutdown: S,
    ) -> Result<ListenStats, SubscribeError>
    where
        T: DeserializeOwned + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        let mut subscription = self.subscribe(bindings).await?;
        let router = Arc::new(router);
        let mut stats = ListenStats::default();
        let mut tasks: JoinSet<Settled> = JoinSet::new();
        let max_in_flight = usize::from(self.prefetch);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("listener shutting down");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    record(&mut stats, joined);
                }
                next = subscription.next_delivery(), if tasks.len() < max_in_flight => match next {
                    Some(Ok(delivery)) => {
                        stats.received += 1;
                        tasks.spawn(settle::<T>(Arc::clone(&router), delivery));
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "subscription failed");
                        break;
                    }
                    None => {
                        info!("subscription ended");
                        break;
                    }
                },
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record(&mut stats, joined);
        }
        if let Err(e) = subscription.close().await {
            warn!(error = %e, "closing subscription channel");
        }
        Ok(stats)
    }
}

fn record(stats: &mut ListenStats, joined: Result<Settled, tokio::task::JoinError>) {
    match joined {
        Ok(Settled::Handled) => stats.handled += 1,
        Ok(Settled::Unroutable) => stats.unroutable += 1,
        Ok(Settled::Failed) => stats.failed += 1,
        Err(e) => {
            warn!(error = %e, "event handler task panicked");
            stats.failed += 1;
        }
    }
}

async fn settle<T>(router: Arc<TopicRouter<T>>, delivery: Delivery) -> Settled
where
    T: DeserializeOwned + Send + 'static,
{
    let routing_key = delivery.routing_key.clone();

    let Some(handler) = router.resolve(&routing_key) else {
        warn!(routing_key = %routing_key, "no handler for routing key");
        reject(&delivery).await;
        return Settled::Unroutable;
    };

    let event = match serde_json::from_slice::<T>(&delivery.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(routing_key = %routing_key, error = %e, "dropping undecodable event");
            reject(&delivery).await;
            return Settled::Failed;
        }
    };

    match handler.handle(&routing_key, event).await {
        Ok(()) => {
            if let Err(e) = delivery.ack().await {
                warn!(routing_key = %routing_key, error = %e, "ack failed");
            }
            Settled::Handled
        }
        Err(e) => {
            warn!(routing_key = %routing_key, error = %e, "event handler failed; dropping event");
            reject(&delivery).await;
            Settled::Failed
        }
    }
}

async fn reject(delivery: &Delivery) {
    if let Err(e) = delivery.reject(false).await {
        warn!(routing_key = %delivery.routing_key, error = %e, "reject failed");
    }
}
