//! Remote procedure call plumbing used by the log transports.
//!
//! - Binary RPC: length-prefixed bitcode frames over TCP ([`RpcClient`],
//!   [`RpcServer`]). Procedures are addressed by name, e.g. `"LogInfo"`.
//! - Typed RPC: a tonic `LogService` (requires the `grpc` feature).

mod client;
mod error;
mod frame;
mod server;

#[cfg(feature = "grpc")]
pub mod grpc;

pub use client::RpcClient;
pub use error::RpcError;
pub use frame::{RpcRequest, RpcResponse, MAX_FRAME_LENGTH};
pub use server::RpcServer;
