//! Wire format for binary RPC.
//!
//! Each message is a big-endian `u32` length prefix followed by a
//! bitcode-encoded envelope. Request and reply bodies are themselves
//! bitcode-encoded argument and result values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::error::RpcError;

/// Largest accepted frame.
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub seq: u64,
    pub method: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub seq: u64,
    /// Set when the procedure failed; `body` is then empty.
    pub error: Option<String>,
    pub body: Vec<u8>,
}

pub type RpcStream = Framed<TcpStream, LengthDelimitedCodec>;

pub fn framed(stream: TcpStream) -> RpcStream {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_framed(stream)
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, RpcError> {
    Ok(bitcode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RpcError> {
    Ok(bitcode::deserialize(bytes)?)
}
