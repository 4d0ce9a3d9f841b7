//! Tracing subscriber setup, shared by both binaries.

use clap::{Args, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Filter directives, used when RUST_LOG is unset
    #[arg(long, env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Text,
            log_filter: "info".to_string(),
        }
    }
}

impl TelemetryConfig {
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_filter))
    }

    /// Install the global subscriber. Returns false if one was already set.
    pub fn init(&self) -> bool {
        let builder = tracing_subscriber::fmt().with_env_filter(self.env_filter());
        let result = match self.log_format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
        result.is_ok()
    }
}
