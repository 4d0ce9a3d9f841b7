//! Log listener: routes queued log events to the log-write action.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{EventHandler, HandlerError, RoutingKey, RoutingPattern, TopicRouter};
use crate::dispatch::{ErrorKind, Transport};
use crate::payload::LogEvent;

/// Recognized log categories, one routing key each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    Info,
    Warn,
    Error,
}

impl LogCategory {
    pub const ALL: [LogCategory; 3] = [LogCategory::Info, LogCategory::Warn, LogCategory::Error];

    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(self.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Info => "LOG.INFO",
            LogCategory::Warn => "LOG.WARN",
            LogCategory::Error => "LOG.ERROR",
        }
    }

    pub fn from_routing_key(key: &RoutingKey) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == key.as_str())
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes each event to the log service. All categories share this action.
pub struct LogWriter {
    transport: Arc<dyn Transport<LogEvent>>,
}

impl LogWriter {
    pub fn new(transport: Arc<dyn Transport<LogEvent>>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl EventHandler<LogEvent> for LogWriter {
    async fn handle(&self, routing_key: &RoutingKey, event: LogEvent) -> Result<(), HandlerError> {
        tracing::debug!(routing_key = %routing_key, name = %event.name, "writing log event");
        self.transport
            .deliver(&event)
            .await
            .map(|_| ())
            .map_err(|e| match e.kind() {
                ErrorKind::RemoteRejection => HandlerError::Rejected(e.to_string()),
                _ => HandlerError::Other(Box::new(e)),
            })
    }
}

/// Router sending every log category to `writer`.
pub fn log_router(writer: Arc<dyn EventHandler<LogEvent>>) -> TopicRouter<LogEvent> {
    LogCategory::ALL
        .into_iter()
        .fold(TopicRouter::new(), |router, category| {
            router.route(RoutingPattern::from(category.routing_key()), Arc::clone(&writer))
        })
}
