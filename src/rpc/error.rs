//! Error type for the binary RPC transport.

use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum RpcError {
    /// Socket-level failure (dial, read, write).
    Io(io::Error),
    /// Frame or body could not be encoded or decoded.
    Codec(String),
    /// The remote procedure returned an error.
    Remote(String),
    /// The peer closed the connection before replying.
    Closed,
    /// The reply did not belong to the outstanding call.
    OutOfSequence { expected: u64, got: u64 },
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Io(e) => write!(f, "rpc io error: {}", e),
            RpcError::Codec(msg) => write!(f, "rpc codec error: {}", msg),
            RpcError::Remote(msg) => write!(f, "{}", msg),
            RpcError::Closed => write!(f, "rpc connection closed"),
            RpcError::OutOfSequence { expected, got } => {
                write!(f, "rpc reply out of sequence: expected {}, got {}", expected, got)
            }
        }
    }
}

impl Error for RpcError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RpcError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RpcError {
    fn from(err: io::Error) -> Self {
        RpcError::Io(err)
    }
}

impl From<bitcode::Error> for RpcError {
    fn from(err: bitcode::Error) -> Self {
        RpcError::Codec(err.to_string())
    }
}
