//! Direct calls: JSON over HTTP POST, success is exactly 202 Accepted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use super::Transport;
use crate::dispatch::error::DispatchError;
use crate::dispatch::outcome::{JsonResponse, Reply};
use crate::payload::{AuthRequest, LogEvent, MailRequest};

/// HTTP client shared by the direct-call adapters.
///
/// Idle connections are not kept, so every call dials afresh.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(0)
        .build()
}

/// A POST to one fixed collaborator endpoint.
#[derive(Debug, Clone)]
pub struct DirectCall {
    client: Client,
    url: String,
    service: &'static str,
    timeout: Duration,
}

impl DirectCall {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        service: &'static str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            service,
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` as JSON. Any response, whatever its status, is returned.
    pub async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<Response, DispatchError> {
        self.client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout(self.timeout)
                } else {
                    warn!(service = self.service, error = %e, "direct call failed");
                    DispatchError::Transport(format!("error calling {}", self.service))
                }
            })
    }

    fn rejected(&self, status: StatusCode) -> DispatchError {
        warn!(service = self.service, %status, "unexpected status");
        DispatchError::Rejected(format!("error calling {}", self.service))
    }
}

/// `auth` action against the identity service.
pub struct AuthTransport {
    call: DirectCall,
}

impl AuthTransport {
    pub fn new(call: DirectCall) -> Self {
        Self { call }
    }
}

#[async_trait]
impl Transport<AuthRequest> for AuthTransport {
    async fn deliver(&self, payload: &AuthRequest) -> Result<Reply, DispatchError> {
        let response = self.call.post(payload).await?;
        match response.status() {
            StatusCode::ACCEPTED => {}
            StatusCode::UNAUTHORIZED => return Err(DispatchError::Unauthorized),
            status => return Err(self.call.rejected(status)),
        }

        let body: JsonResponse = response
            .json()
            .await
            .map_err(|e| DispatchError::Decode(e.to_string()))?;
        if body.error {
            return Err(DispatchError::Unauthorized);
        }

        let reply = Reply::new("Authenticated");
        Ok(match body.data {
            Some(data) => reply.with_data(data),
            None => reply,
        })
    }
}

/// `mail` action against the mail service.
pub struct MailTransport {
    call: DirectCall,
}

impl MailTransport {
    pub fn new(call: DirectCall) -> Self {
        Self { call }
    }
}

#[async_trait]
impl Transport<MailRequest> for MailTransport {
    async fn deliver(&self, payload: &MailRequest) -> Result<Reply, DispatchError> {
        let response = self.call.post(payload).await?;
        if response.status() != StatusCode::ACCEPTED {
            return Err(self.call.rejected(response.status()));
        }
        Ok(Reply::new(format!("Message sent to {}", payload.to)))
    }
}

/// Log entries written straight to the log service.
pub struct HttpLogTransport {
    call: DirectCall,
}

impl HttpLogTransport {
    pub fn new(call: DirectCall) -> Self {
        Self { call }
    }
}

#[async_trait]
impl Transport<LogEvent> for HttpLogTransport {
    async fn deliver(&self, payload: &LogEvent) -> Result<Reply, DispatchError> {
        let response = self.call.post(payload).await?;
        if response.status() != StatusCode::ACCEPTED {
            return Err(self.call.rejected(response.status()));
        }
        Ok(Reply::new("Logged"))
    }
}
