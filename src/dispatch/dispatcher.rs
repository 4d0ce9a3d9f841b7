//! Dispatcher — classifies an `ActionRequest` and hands it to the transport
//! registered for its action.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use broker_rust::dispatch::{ActionRequest, Dispatcher};
//!
//! let dispatcher = Dispatcher::new(auth, log, mail);
//! let outcome = dispatcher.dispatch(&ActionRequest::log(entry)).await;
//! if outcome.failed { /* ... */ }
//! ```

use std::sync::Arc;

use tracing::{debug, warn};

use super::action::{Action, ActionRequest};
use super::error::DispatchError;
use super::outcome::{Outcome, Reply};
use super::transport::{
    http_client, AuthTransport, BinaryRpcLogTransport, DirectCall, HttpLogTransport,
    MailTransport, QueueLogTransport, Transport,
};
use crate::bus::Broker;
use crate::config::{DispatchConfig, LogTransportKind};
use crate::payload::{AuthRequest, LogEvent, MailRequest};

/// Routes each action to exactly one transport. Holds no per-request state,
/// so one instance serves concurrent requests.
#[derive(Clone)]
pub struct Dispatcher {
    auth: Arc<dyn Transport<AuthRequest>>,
    log: Arc<dyn Transport<LogEvent>>,
    mail: Arc<dyn Transport<MailRequest>>,
    typed_log: Option<Arc<dyn Transport<LogEvent>>>,
}

impl Dispatcher {
    pub fn new(
        auth: Arc<dyn Transport<AuthRequest>>,
        log: Arc<dyn Transport<LogEvent>>,
        mail: Arc<dyn Transport<MailRequest>>,
    ) -> Self {
        Self {
            auth,
            log,
            mail,
            typed_log: None,
        }
    }

    /// Transport behind the typed-RPC log entry point.
    pub fn with_typed_log(mut self, typed_log: Arc<dyn Transport<LogEvent>>) -> Self {
        self.typed_log = Some(typed_log);
        self
    }

    /// Build every transport from configuration. `broker` is only used when
    /// the `log` action goes through the queue.
    pub fn from_config<B>(config: &DispatchConfig, broker: Arc<B>) -> reqwest::Result<Self>
    where
        B: Broker + 'static,
    {
        let timeout = config.call_timeout();
        let client = http_client(timeout)?;

        let auth = AuthTransport::new(DirectCall::new(
            client.clone(),
            &config.auth_url,
            "auth service",
            timeout,
        ));
        let mail = MailTransport::new(DirectCall::new(
            client.clone(),
            &config.mail_url,
            "mail service",
            timeout,
        ));
        let log: Arc<dyn Transport<LogEvent>> = match config.log_transport {
            LogTransportKind::Rpc => {
                Arc::new(BinaryRpcLogTransport::new(&config.log_rpc_addr, timeout))
            }
            LogTransportKind::Queue => Arc::new(
                QueueLogTransport::new(broker)
                    .with_exchange(config.exchange_spec())
                    .with_routing_key(config.log_routing_key.as_str()),
            ),
            LogTransportKind::Http => Arc::new(HttpLogTransport::new(DirectCall::new(
                client,
                &config.log_url,
                "log service",
                timeout,
            ))),
        };

        let dispatcher = Self::new(Arc::new(auth), log, Arc::new(mail));

        #[cfg(feature = "grpc")]
        let dispatcher = dispatcher.with_typed_log(Arc::new(
            super::transport::TypedRpcLogTransport::new(&config.log_grpc_url),
        ));

        Ok(dispatcher)
    }

    /// Dispatch and normalize into an `Outcome`. Never fails.
    pub async fn dispatch(&self, request: &ActionRequest) -> Outcome {
        self.try_dispatch(request).await.into()
    }

    /// Dispatch, keeping the error for callers that need its status code.
    pub async fn try_dispatch(&self, request: &ActionRequest) -> Result<Reply, DispatchError> {
        let result = match Action::parse(request) {
            Ok(action) => self.deliver(action).await,
            Err(e) => Err(e),
        };
        report(&request.action, &result);
        result
    }

    /// Write the request's `log` payload through the typed-RPC transport,
    /// whatever its action tag.
    pub async fn dispatch_typed_log(&self, request: &ActionRequest) -> Outcome {
        self.try_dispatch_typed_log(request).await.into()
    }

    pub async fn try_dispatch_typed_log(
        &self,
        request: &ActionRequest,
    ) -> Result<Reply, DispatchError> {
        let result = match (&self.typed_log, &request.log) {
            (Some(transport), Some(entry)) => transport.deliver(entry).await,
            (None, _) => Err(DispatchError::Transport(
                "typed rpc log transport not configured".to_string(),
            )),
            (_, None) => Err(DispatchError::MissingPayload(Action::LOG)),
        };
        report("log-grpc", &result);
        result
    }

    async fn deliver(&self, action: Action<'_>) -> Result<Reply, DispatchError> {
        match action {
            Action::Auth(payload) => self.auth.deliver(payload).await,
            Action::Log(payload) => self.log.deliver(payload).await,
            Action::Mail(payload) => self.mail.deliver(payload).await,
        }
    }
}

fn report(action: &str, result: &Result<Reply, DispatchError>) {
    match result {
        Ok(reply) => debug!(action, message = %reply.message, "dispatched"),
        Err(e) => warn!(action, kind = ?e.kind(), error = %e, "dispatch failed"),
    }
}
