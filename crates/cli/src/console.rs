//! Console logging: host events rendered through `tracing`.

use std::io::{self, IsTerminal};

use resthost_core::{LogEvent, LogLevel, LogSink};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("failed to install log subscriber: {0}")]
    Subscriber(String),
}

/// Install the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `filter` when set.
pub fn initialise(filter: &str) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            EnvFilter::try_new(filter).map_err(|error| TelemetryError::Filter(error.to_string()))?
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|error| TelemetryError::Subscriber(error.to_string()))
}

/// Forwards host log events to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn on_event(&self, event: &LogEvent) {
        match event.level {
            LogLevel::Info => tracing::info!(source = %event.source, "{}", event.message),
            LogLevel::Warn => tracing::warn!(source = %event.source, "{}", event.message),
            LogLevel::Error => tracing::error!(source = %event.source, "{}", event.message),
        }
    }
}
