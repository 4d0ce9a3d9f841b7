//! Normalized result shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DispatchError;

/// What a transport hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message: String,
    pub data: Option<Value>,
}

impl Reply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The single result shape every dispatch produces.
///
/// A failed outcome always has a non-empty message and never carries data.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub failed: bool,
    pub message: String,
    pub data: Option<Value>,
}

impl Outcome {
    pub fn success(reply: Reply) -> Self {
        Self {
            failed: false,
            message: reply.message,
            data: reply.data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = "request failed".to_string();
        }
        Self {
            failed: true,
            message,
            data: None,
        }
    }
}

impl From<Result<Reply, DispatchError>> for Outcome {
    fn from(result: Result<Reply, DispatchError>) -> Self {
        match result {
            Ok(reply) => Outcome::success(reply),
            Err(e) => Outcome::failure(e.to_string()),
        }
    }
}

/// JSON body of the inbound API and of collaborators that answer in kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }
}

impl From<Outcome> for JsonResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            error: outcome.failed,
            message: outcome.message,
            data: outcome.data,
        }
    }
}
