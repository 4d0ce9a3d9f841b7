//! Event emitter: publishes one serialized event to a topic exchange.

use serde::Serialize;
use tracing::{debug, warn};

use super::broker::{Broker, Channel, ExchangeSpec};
use super::error::PublishError;
use super::routing::RoutingKey;

/// Publishes events over a borrowed broker connection.
///
/// Cheap to build per publish. Each `push` opens a transient channel, declares
/// the exchange, publishes and closes the channel again, whether or not the
/// publish succeeded. Publishing is at-most-once: no broker confirm is awaited
/// and failures are returned to the caller rather than retried.
pub struct EventEmitter<'a, B: Broker> {
    broker: &'a B,
    exchange: ExchangeSpec,
}

impl<'a, B: Broker> EventEmitter<'a, B> {
    /// Emitter for the default logs topic exchange.
    pub fn new(broker: &'a B) -> Self {
        Self::with_exchange(broker, ExchangeSpec::default())
    }

    pub fn with_exchange(broker: &'a B, exchange: ExchangeSpec) -> Self {
        Self { broker, exchange }
    }

    pub fn exchange(&self) -> &ExchangeSpec {
        &self.exchange
    }

    /// Serialize `event` as JSON and publish it under `routing_key`.
    pub async fn push<T>(&self, event: &T, routing_key: &RoutingKey) -> Result<(), PublishError>
    where
        T: Serialize + Sync,
    {
        let payload = serde_json::to_vec(event)
            .map_err(|e| PublishError::SerializationFailed(e.to_string()))?;

        let channel = self
            .broker
            .open_channel()
            .await
            .map_err(PublishError::Channel)?;

        let result = self.publish_on(&channel, routing_key, payload).await;

        if let Err(e) = channel.close().await {
            warn!(error = %e, "failed to close publish channel");
        }
        result
    }

    async fn publish_on(
        &self,
        channel: &B::Channel,
        routing_key: &RoutingKey,
        payload: Vec<u8>,
    ) -> Result<(), PublishError> {
        channel
            .declare_exchange(&self.exchange)
            .await
            .map_err(PublishError::Declare)?;
        channel
            .publish(&self.exchange.name, routing_key, payload)
            .await
            .map_err(PublishError::Rejected)?;
        debug!(exchange = %self.exchange.name, routing_key = %routing_key, "event published");
        Ok(())
    }
}
