use std::time::Duration;

use async_trait::async_trait;
use tonic::Code;
use tracing::warn;

use super::Transport;
use crate::dispatch::error::DispatchError;
use crate::dispatch::outcome::Reply;
use crate::payload::LogEvent;
use crate::rpc::grpc::{LogRequest, LogServiceClient};

/// Hard deadline for a typed RPC call, connect included.
pub const TYPED_RPC_DEADLINE: Duration = Duration::from_secs(1);

/// Writes log entries through the gRPC `LogService` (plaintext).
///
/// The deadline covers connect and call. It is also sent to the server as
/// `grpc-timeout`, and expiry drops the in-flight connection.
#[derive(Debug, Clone)]
pub struct TypedRpcLogTransport {
    endpoint: String,
    deadline: Duration,
}

impl TypedRpcLogTransport {
    /// `endpoint` is a URI such as `http://logger-service:50001`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_deadline(endpoint, TYPED_RPC_DEADLINE)
    }

    pub fn with_deadline(endpoint: impl Into<String>, deadline: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            deadline,
        }
    }

    async fn call(&self, payload: &LogEvent) -> Result<String, DispatchError> {
        let mut client = LogServiceClient::connect(self.endpoint.clone())
            .await
            .map_err(|e| {
                warn!(error = %e, "log grpc connect failed");
                DispatchError::Transport("error calling log service".to_string())
            })?;

        let mut request = tonic::Request::new(LogRequest::new(payload));
        request.set_timeout(self.deadline);

        let response = client
            .write_log(request)
            .await
            .map_err(|status| classify(status, self.deadline))?;
        Ok(response.into_inner().result)
    }
}

/// Map a gRPC status onto the dispatch error taxonomy.
///
/// The server enforces the same deadline and answers `Cancelled` when it
/// fires first, so both deadline codes are timeouts. Only codes a service
/// returns on purpose count as rejections.
fn classify(status: tonic::Status, deadline: Duration) -> DispatchError {
    match status.code() {
        Code::DeadlineExceeded | Code::Cancelled => DispatchError::Timeout(deadline),
        Code::InvalidArgument
        | Code::NotFound
        | Code::AlreadyExists
        | Code::PermissionDenied
        | Code::FailedPrecondition
        | Code::OutOfRange
        | Code::Unauthenticated
        | Code::Aborted
        | Code::ResourceExhausted => DispatchError::Rejected(status.message().to_string()),
        code => {
            warn!(code = ?code, detail = status.message(), "log grpc call failed");
            DispatchError::Transport("error calling log service".to_string())
        }
    }
}


#[async_trait]
impl Transport<LogEvent> for TypedRpcLogTransport {
    async fn deliver(&self, payload: &LogEvent) -> Result<Reply, DispatchError> {
        let result = tokio::time::timeout(self.deadline, self.call(payload))
            .await
            .map_err(|_| DispatchError::Timeout(self.deadline))??;

        if result.is_empty() {
            return Ok(Reply::new("Logged"));
        }
        Ok(Reply::new(result))
    }
}
