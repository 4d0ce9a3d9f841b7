//! Transport adapters: one strategy per way of reaching a collaborator.
//!
//! | Adapter                 | Payload       | Wire                               |
//! |-------------------------|---------------|------------------------------------|
//! | `AuthTransport`         | `AuthRequest` | HTTP POST `/authenticate`, 202     |
//! | `MailTransport`         | `MailRequest` | HTTP POST `/send`, 202             |
//! | `HttpLogTransport`      | `LogEvent`    | HTTP POST `/log`, 202              |
//! | `BinaryRpcLogTransport` | `LogEvent`    | binary RPC `LogInfo`               |
//! | `TypedRpcLogTransport`  | `LogEvent`    | gRPC `LogService/WriteLog`, 1s     |
//! | `QueueLogTransport`     | `LogEvent`    | topic publish `LOG.INFO`           |
//!
//! Every adapter is stateless per call: no pooling, no retry.

mod binary_rpc;
mod direct;
mod queue;

#[cfg(feature = "grpc")]
mod typed_rpc;

use async_trait::async_trait;

use super::error::DispatchError;
use super::outcome::Reply;

pub use binary_rpc::{BinaryRpcLogTransport, LOG_INFO};
pub use direct::{http_client, AuthTransport, DirectCall, HttpLogTransport, MailTransport};
pub use queue::{QueueLogTransport, LOG_INFO_KEY};

#[cfg(feature = "grpc")]
pub use typed_rpc::{TypedRpcLogTransport, TYPED_RPC_DEADLINE};

/// Delivers one payload to a collaborator and normalizes its answer.
#[async_trait]
pub trait Transport<P: Sync + ?Sized>: Send + Sync {
    async fn deliver(&self, payload: &P) -> Result<Reply, DispatchError>;
}
