//! Inbound request and its classification into a closed set of actions.

use serde::{Deserialize, Serialize};

use super::error::DispatchError;
use crate::payload::{AuthRequest, LogEvent, MailRequest};

/// The inbound request body.
///
/// Only the payload named by `action` is read; the others are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<MailRequest>,
}

impl ActionRequest {
    pub fn auth(auth: AuthRequest) -> Self {
        Self {
            action: Action::AUTH.to_string(),
            auth: Some(auth),
            ..Self::default()
        }
    }

    pub fn log(log: LogEvent) -> Self {
        Self {
            action: Action::LOG.to_string(),
            log: Some(log),
            ..Self::default()
        }
    }

    pub fn mail(mail: MailRequest) -> Self {
        Self {
            action: Action::MAIL.to_string(),
            mail: Some(mail),
            ..Self::default()
        }
    }
}

/// A classified request, borrowing its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    Auth(&'a AuthRequest),
    Log(&'a LogEvent),
    Mail(&'a MailRequest),
}

impl<'a> Action<'a> {
    pub const AUTH: &'static str = "auth";
    pub const LOG: &'static str = "log";
    pub const MAIL: &'static str = "mail";

    /// Classify `request` by its action tag.
    pub fn parse(request: &'a ActionRequest) -> Result<Self, DispatchError> {
        match request.action.as_str() {
            Self::AUTH => request
                .auth
                .as_ref()
                .map(Action::Auth)
                .ok_or(DispatchError::MissingPayload(Self::AUTH)),
            Self::LOG => request
                .log
                .as_ref()
                .map(Action::Log)
                .ok_or(DispatchError::MissingPayload(Self::LOG)),
            Self::MAIL => request
                .mail
                .as_ref()
                .map(Action::Mail)
                .ok_or(DispatchError::MissingPayload(Self::MAIL)),
            other => Err(DispatchError::UnknownAction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Auth(_) => Self::AUTH,
            Action::Log(_) => Self::LOG,
            Action::Mail(_) => Self::MAIL,
        }
    }
}
