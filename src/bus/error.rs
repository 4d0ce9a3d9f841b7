//! Error types for the event bus.

use std::error::Error;
use std::fmt;

use super::routing::RoutingPattern;

/// Failure of a single broker operation (dial, channel, declare, publish, ack).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The broker could not be reached or the connection dropped.
    ConnectionFailed(String),
    /// The channel or connection is already closed.
    ChannelClosed,
    /// A referenced exchange or queue does not exist.
    NotFound(String),
    /// A redeclaration conflicted with the existing entity.
    PreconditionFailed(String),
    /// Protocol-level failure reported by the broker client.
    Protocol(String),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            BusError::ChannelClosed => write!(f, "channel closed"),
            BusError::NotFound(what) => write!(f, "not found: {}", what),
            BusError::PreconditionFailed(msg) => write!(f, "precondition failed: {}", msg),
            BusError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl Error for BusError {}

/// The broker stayed unreachable for the whole retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectError {
    /// Number of dials performed, including the first.
    pub attempts: u32,
    /// The last dial failure.
    pub source: BusError,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "broker unreachable after {} attempts: {}",
            self.attempts, self.source
        )
    }
}

impl Error for ConnectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Error type for emitter publish operations.
#[derive(Debug)]
pub enum PublishError {
    /// Opening or using the transient channel failed.
    Channel(BusError),
    /// The exchange could not be declared.
    Declare(BusError),
    /// Serialization of the event failed.
    SerializationFailed(String),
    /// The broker refused the message.
    Rejected(BusError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Channel(e) => write!(f, "publish channel error: {}", e),
            PublishError::Declare(e) => write!(f, "exchange declaration failed: {}", e),
            PublishError::SerializationFailed(msg) => write!(f, "serialization failed: {}", msg),
            PublishError::Rejected(e) => write!(f, "event rejected: {}", e),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PublishError::Channel(e) | PublishError::Declare(e) | PublishError::Rejected(e) => {
                Some(e)
            }
            PublishError::SerializationFailed(_) => None,
        }
    }
}

/// Error type for setting up a subscription.
#[derive(Debug)]
pub enum SubscribeError {
    /// No binding patterns were requested.
    NoBindings,
    /// Opening the channel failed.
    Channel(BusError),
    /// Exchange or queue declaration failed.
    Declare(BusError),
    /// Binding the queue to a pattern failed.
    Bind {
        pattern: RoutingPattern,
        source: BusError,
    },
    /// Starting the consumer failed.
    Consume(BusError),
}

impl fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::NoBindings => write!(f, "no binding patterns requested"),
            SubscribeError::Channel(e) => write!(f, "subscribe channel error: {}", e),
            SubscribeError::Declare(e) => write!(f, "declaration failed: {}", e),
            SubscribeError::Bind { pattern, source } => {
                write!(f, "binding {} failed: {}", pattern, source)
            }
            SubscribeError::Consume(e) => write!(f, "consume failed: {}", e),
        }
    }
}

impl Error for SubscribeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SubscribeError::NoBindings => None,
            SubscribeError::Channel(e)
            | SubscribeError::Declare(e)
            | SubscribeError::Consume(e)
            | SubscribeError::Bind { source: e, .. } => Some(e),
        }
    }
}

/// Error returned by a topic handler for a single event.
#[derive(Debug)]
pub enum HandlerError {
    /// The payload could not be decoded into the handler's event type.
    DecodeFailed(String),
    /// The handler refused the event.
    Rejected(String),
    /// The handler's downstream collaborator failed.
    Other(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::DecodeFailed(msg) => write!(f, "decode failed: {}", msg),
            HandlerError::Rejected(msg) => write!(f, "rejected: {}", msg),
            HandlerError::Other(e) => write!(f, "handler error: {}", e),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandlerError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for BusError {
    fn from(err: lapin::Error) -> Self {
        match err {
            lapin::Error::InvalidChannelState(_) | lapin::Error::InvalidConnectionState(_) => {
                BusError::ChannelClosed
            }
            other => BusError::Protocol(other.to_string()),
        }
    }
}
