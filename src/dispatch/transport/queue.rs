use std::sync::Arc;

use async_trait::async_trait;

use super::Transport;
use crate::bus::{Broker, EventEmitter, ExchangeSpec, RoutingKey};
use crate::dispatch::error::DispatchError;
use crate::dispatch::outcome::Reply;
use crate::payload::LogEvent;

/// Routing key log entries are published under by default.
pub const LOG_INFO_KEY: &str = "LOG.INFO";

/// Publishes log entries to the topic exchange through an `EventEmitter`.
///
/// Not wrapped in a timeout: cancelling mid-publish would skip the channel
/// close.
pub struct QueueLogTransport<B: Broker> {
    broker: Arc<B>,
    exchange: ExchangeSpec,
    routing_key: RoutingKey,
}

impl<B: Broker> QueueLogTransport<B> {
    pub fn new(broker: Arc<B>) -> Self {
        Self {
            broker,
            exchange: ExchangeSpec::default(),
            routing_key: RoutingKey::new(LOG_INFO_KEY),
        }
    }

    pub fn with_exchange(mut self, exchange: ExchangeSpec) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<RoutingKey>) -> Self {
        self.routing_key = routing_key.into();
        self
    }
}

#[async_trait]
impl<B: Broker> Transport<LogEvent> for QueueLogTransport<B> {
    async fn deliver(&self, payload: &LogEvent) -> Result<Reply, DispatchError> {
        EventEmitter::with_exchange(self.broker.as_ref(), self.exchange.clone())
            .push(payload, &self.routing_key)
            .await?;
        Ok(Reply::new("logged via RabbitMQ"))
    }
}
