//! Structured logging initialisation.

use std::fmt;
use std::io::{self, IsTerminal};
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::subscriber::SetGlobalDefaultError;
use tracing::Subscriber;
use tracing_subscriber::fmt as fmt_layer;
use tracing_subscriber::EnvFilter;

/// Filter used when none is configured.
pub const DEFAULT_FILTER: &str = "info";

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable single-line records.
    #[default]
    Compact,
    /// One JSON object per record.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::Format(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact => f.write_str("compact"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Unknown log format name.
    #[error("unknown log format '{0}', expected 'compact' or 'json'")]
    Format(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Install the global subscriber on the first call; later calls do nothing.
///
/// Records go to stderr so that stdout stays free for command output such
/// as `lk build --json`.
///
/// # Arguments
///
/// * `filter` - An `EnvFilter` directive such as `info,lk::output=warn`
/// * `format` - Compact text or JSON lines
pub fn initialise(filter: &str, format: LogFormat) -> Result<(), TelemetryError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }
    install_subscriber(filter, format)?;
    let _ = TELEMETRY_GUARD.set(());
    Ok(())
}

fn install_subscriber(filter: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(filter).map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt_layer::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        assert!(matches!(
            install_subscriber("lk=notalevel[", LogFormat::Compact),
            Err(TelemetryError::Filter(_))
        ));
    }

    #[test]
    fn test_initialise_is_idempotent() {
        initialise(DEFAULT_FILTER, LogFormat::Compact).unwrap();
        initialise(DEFAULT_FILTER, LogFormat::Json).unwrap();
    }
}
