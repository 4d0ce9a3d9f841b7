//! broker_rust — an inter-service request broker.
//!
//! One inbound request carries an action tag; the [`dispatch::Dispatcher`]
//! forwards it to a downstream service over the transport registered for
//! that action and normalizes the answer into an [`dispatch::Outcome`].
//! Log events can also travel through a topic exchange ([`bus`]) to a
//! companion listener process ([`listener`]).
//!
//! ## Features
//!
//! - `amqp` — RabbitMQ backend for the event bus (lapin).
//! - `http` — inbound HTTP API (axum).
//! - `grpc` — typed RPC log transport (tonic/prost).

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod listener;
pub mod payload;
pub mod rpc;
pub mod telemetry;

#[cfg(feature = "http")]
pub mod http;

pub use bus::{
    Broker, ConnectionManager, ConnectionState, Consumer, EventEmitter, InMemoryBroker,
    RoutingKey, RoutingPattern, TopicRouter,
};
pub use dispatch::{ActionRequest, DispatchError, Dispatcher, Outcome};
pub use payload::{AuthRequest, LogEvent, MailRequest};
