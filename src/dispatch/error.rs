//! Error types for action dispatch.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::bus::PublishError;

/// Which side of the call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself could not be classified.
    Classification,
    /// The collaborator could not be reached or answered unintelligibly.
    Transport,
    /// The collaborator answered and refused.
    RemoteRejection,
}

#[derive(Debug)]
pub enum DispatchError {
    /// Action tag is not one of the recognized set.
    UnknownAction(String),
    /// Action is recognized but its payload is absent.
    MissingPayload(&'static str),
    /// Identity service refused the credentials.
    Unauthorized,
    /// Collaborator answered with a non-success result.
    Rejected(String),
    /// Dial, send or receive failed. Carries a caller-safe message.
    Transport(String),
    /// The call did not finish within its deadline.
    Timeout(Duration),
    /// The collaborator's reply could not be decoded.
    Decode(String),
    /// The queue transport could not publish.
    Publish(PublishError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnknownAction(_) => write!(f, "unknown action"),
            DispatchError::MissingPayload(action) => {
                write!(f, "missing {} payload", action)
            }
            DispatchError::Unauthorized => write!(f, "invalid authorization"),
            DispatchError::Rejected(msg) => write!(f, "{}", msg),
            DispatchError::Transport(msg) => write!(f, "{}", msg),
            DispatchError::Timeout(after) => {
                write!(f, "request timed out after {}ms", after.as_millis())
            }
            DispatchError::Decode(msg) => write!(f, "invalid response: {}", msg),
            DispatchError::Publish(_) => write!(f, "error publishing log event"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DispatchError::Publish(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PublishError> for DispatchError {
    fn from(err: PublishError) -> Self {
        DispatchError::Publish(err)
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnknownAction(_) | DispatchError::MissingPayload(_) => {
                ErrorKind::Classification
            }
            DispatchError::Unauthorized | DispatchError::Rejected(_) => ErrorKind::RemoteRejection,
            DispatchError::Transport(_)
            | DispatchError::Timeout(_)
            | DispatchError::Decode(_)
            | DispatchError::Publish(_) => ErrorKind::Transport,
        }
    }

    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::Unauthorized => 401,
            _ => 400,
        }
    }
}
