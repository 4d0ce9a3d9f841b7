//! Event bus - topic publish/subscribe over a message broker.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ ConnectionManager (one per process)                          │
//! │  - dial with quadratic backoff, owns ConnectionState         │
//! └──────────────────────────────────────────────────────────────┘
//!                   │ Arc<B: Broker> (shared, read-only)
//!          ┌────────┴─────────┐
//!          ▼                  ▼
//! ┌─────────────────┐  ┌──────────────────────────────────────────┐
//! │ EventEmitter    │  │ Consumer                                 │
//! │ push(event, key)│  │ subscribe(patterns) / listen(router)     │
//! └─────────────────┘  └──────────────────────────────────────────┘
//!          │ short-lived Channel per operation │
//!          ▼                                   ▼
//! ┌──────────────────┐              ┌──────────────────────────┐
//! │ InMemoryBroker   │              │ AmqpConnection (lapin)   │
//! │ (included)       │              │ `amqp` feature           │
//! └──────────────────┘              └──────────────────────────┘
//! ```

mod broker;
mod connection;
mod consumer;
mod emitter;
mod error;
mod in_memory;
mod routing;

#[cfg(feature = "amqp")]
mod amqp;

pub use broker::{
    Acker, Broker, Channel, Delivery, DeliveryStream, ExchangeKind, ExchangeSpec, LOGS_EXCHANGE,
};
pub use connection::{dial_fn, Backoff, ConnectionManager, ConnectionState, Dialer, FnDialer};
pub use consumer::{
    Consumer, EventHandler, ListenStats, Received, Subscription, TopicRouter, DEFAULT_PREFETCH,
};
pub use emitter::EventEmitter;
pub use error::{BusError, ConnectError, HandlerError, PublishError, SubscribeError};
pub use in_memory::{InMemoryBroker, InMemoryChannel, Published};
pub use routing::{RoutingKey, RoutingPattern};

#[cfg(feature = "amqp")]
pub use amqp::{AmqpChannel, AmqpConnection, AmqpDialer};
