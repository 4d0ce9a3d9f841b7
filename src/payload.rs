//! Wire records shared by the dispatcher, the RPC transports and the event bus.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A log entry, carried over direct calls, RPC and the queue alike.
///
/// Neither field is validated here; the log service owns semantic validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub name: String,
    pub data: String,
}

impl LogEvent {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Credentials forwarded to the identity service.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An outbound mail forwarded to the mail service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRequest {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub message: String,
}
