//! Binary RPC client: one TCP connection, one call in flight at a time.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;

use super::error::RpcError;
use super::frame::{decode, encode, framed, RpcRequest, RpcResponse, RpcStream};

pub struct RpcClient {
    stream: RpcStream,
    next_seq: u64,
}

impl RpcClient {
    /// Connect to `host:port`.
    pub async fn dial(addr: &str) -> Result<Self, RpcError> {
        let tcp = TcpStream::connect(addr).await?;
        tcp.set_nodelay(true)?;
        Ok(Self {
            stream: framed(tcp),
            next_seq: 0,
        })
    }

    /// Invoke `method` with `args` and decode its result.
    pub async fn call<A, R>(&mut self, method: &str, args: &A) -> Result<R, RpcError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let seq = self.next_seq;
        self.next_seq += 1;

        let request = RpcRequest {
            seq,
            method: method.to_string(),
            body: encode(args)?,
        };
        self.stream.send(Bytes::from(encode(&request)?)).await?;

        let frame = self.stream.next().await.ok_or(RpcError::Closed)??;
        let response: RpcResponse = decode(&frame)?;
        if response.seq != seq {
            return Err(RpcError::OutOfSequence {
                expected: seq,
                got: response.seq,
            });
        }
        if let Some(error) = response.error {
            return Err(RpcError::Remote(error));
        }
        decode(&response.body)
    }

    /// Flush and shut down the connection.
    pub async fn close(mut self) -> Result<(), RpcError> {
        SinkExt::<Bytes>::close(&mut self.stream).await?;
        Ok(())
    }
}
