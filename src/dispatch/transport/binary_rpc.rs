use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::Transport;
use crate::dispatch::error::DispatchError;
use crate::dispatch::outcome::Reply;
use crate::payload::LogEvent;
use crate::rpc::{RpcClient, RpcError};

/// Remote procedure the log service exposes over binary RPC.
pub const LOG_INFO: &str = "LogInfo";

/// Writes log entries by calling `LogInfo` on the log service.
///
/// Dials per call and hangs up afterwards. The whole exchange (dial, call,
/// close) runs under one timeout; expiry drops the socket.
#[derive(Debug, Clone)]
pub struct BinaryRpcLogTransport {
    addr: String,
    timeout: Duration,
}

impl BinaryRpcLogTransport {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    async fn call(&self, payload: &LogEvent) -> Result<String, RpcError> {
        let mut client = RpcClient::dial(&self.addr).await?;
        let reply: String = client.call(LOG_INFO, payload).await?;
        client.close().await?;
        Ok(reply)
    }
}

#[async_trait]
impl Transport<LogEvent> for BinaryRpcLogTransport {
    async fn deliver(&self, payload: &LogEvent) -> Result<Reply, DispatchError> {
        let reply = tokio::time::timeout(self.timeout, self.call(payload))
            .await
            .map_err(|_| DispatchError::Timeout(self.timeout))?
            .map_err(|e| match e {
                RpcError::Remote(msg) => DispatchError::Rejected(msg),
                RpcError::Codec(msg) => DispatchError::Decode(msg),
                other => {
                    warn!(error = %other, "log rpc failed");
                    DispatchError::Transport("error calling log service".to_string())
                }
            })?;

        if reply.is_empty() {
            return Ok(Reply::new("Logged"));
        }
        Ok(Reply::new(reply))
    }
}
