//! Typed RPC bindings for the log service.
//!
//! Requires the `grpc` feature. Uses tonic for transport and prost for the
//! messages (standard protobuf wire format, no `.proto` file).
//!
//! ## RPCs
//!
//! - `logs.LogService/WriteLog` - write one entry. Input = `LogRequest`,
//!   output = `LogResponse`.

use crate::payload::LogEvent;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub data: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogRequest {
    #[prost(message, optional, tag = "1")]
    pub log_entry: Option<Log>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogResponse {
    #[prost(string, tag = "1")]
    pub result: String,
}

impl From<&LogEvent> for Log {
    fn from(event: &LogEvent) -> Self {
        Log {
            name: event.name.clone(),
            data: event.data.clone(),
        }
    }
}

impl From<Log> for LogEvent {
    fn from(log: Log) -> Self {
        LogEvent {
            name: log.name,
            data: log.data,
        }
    }
}

impl LogRequest {
    pub fn new(event: &LogEvent) -> Self {
        Self {
            log_entry: Some(event.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Generated service trait + server/client
// ---------------------------------------------------------------------------

include!(concat!(env!("OUT_DIR"), "/logs.LogService.rs"));

pub use log_service_client::LogServiceClient;
pub use log_service_server::{LogService, LogServiceServer};
