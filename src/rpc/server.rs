//! Binary RPC server: a registry of named procedures served over TCP.
//!
//! ## Example
//!
//! ```ignore
//! let server = RpcServer::new().method("LogInfo", |entry: LogEvent| async move {
//!     store.insert(entry).await.map_err(|e| e.to_string())?;
//!     Ok::<_, String>(format!("Processed payload via RPC: {}", entry.name))
//! });
//! server.serve(TcpListener::bind("0.0.0.0:5001").await?).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use super::error::RpcError;
use super::frame::{decode, encode, framed, RpcRequest, RpcResponse};

type Procedure = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, Result<Vec<u8>, String>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct RpcServer {
    procedures: HashMap<String, Procedure>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure. Builder style.
    pub fn method<A, R, F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, String>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let procedure: Procedure = Arc::new(move |body: Vec<u8>| {
            let handler = Arc::clone(&handler);
            async move {
                let args: A = decode(&body).map_err(|e| e.to_string())?;
                let reply = handler(args).await?;
                encode(&reply).map_err(|e| e.to_string())
            }
            .boxed()
        });
        self.procedures.insert(name.to_string(), procedure);
        self
    }

    /// Registered procedure names.
    pub fn methods(&self) -> Vec<&str> {
        self.procedures.keys().map(|s| s.as_str()).collect()
    }

    /// Accept connections until the listener fails. Each connection is served
    /// on its own task.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let procedures = Arc::new(self.procedures);
        loop {
            let (stream, peer) = listener.accept().await?;
            let procedures = Arc::clone(&procedures);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(procedures, stream).await {
                    debug!(%peer, error = %e, "rpc connection ended");
                }
            });
        }
    }
}

async fn serve_connection(
    procedures: Arc<HashMap<String, Procedure>>,
    stream: TcpStream,
) -> Result<(), RpcError> {
    let mut stream = framed(stream);

    while let Some(frame) = stream.next().await {
        let request: RpcRequest = decode(&frame?)?;
        let response = match procedures.get(&request.method) {
            Some(procedure) => match procedure(request.body).await {
                Ok(body) => RpcResponse {
                    seq: request.seq,
                    error: None,
                    body,
                },
                Err(error) => RpcResponse {
                    seq: request.seq,
                    error: Some(error),
                    body: Vec::new(),
                },
            },
            None => RpcResponse {
                seq: request.seq,
                error: Some(format!("rpc: can't find method {}", request.method)),
                body: Vec::new(),
            },
        };
        stream.send(Bytes::from(encode(&response)?)).await?;
    }
    Ok(())
}
