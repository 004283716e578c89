//! Health check models.
//!
//! A role that exposes a readiness endpoint declares a [`HealthConfig`] in
//! `config.toml`. At startup the supervisor resolves it against the role's
//! port binding into an immutable [`HealthCheckSpec`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health check settings as written in `config.toml`.
///
/// # Example
///
/// ```toml
/// [roles.health]
/// path = "/api/health"
/// port = 5000
/// expected-status = 200
/// interval-ms = 1000
/// max-attempts = 30
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct HealthConfig {
    /// Host to probe. Defaults to the role's bound host, then `127.0.0.1`.
    #[serde(default)]
    pub host: Option<String>,

    /// Port to probe. Defaults to the role's negotiated port.
    #[serde(default)]
    pub port: Option<u16>,

    /// HTTP path of the readiness endpoint.
    #[serde(default = "default_path")]
    pub path: String,

    /// Status code that counts as "ready".
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    /// Timeout applied to each individual request.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Maximum number of requests before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between two consecutive attempts.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_expected_status() -> u16 {
    200
}

fn default_attempt_timeout_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            path: default_path(),
            expected_status: default_expected_status(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Fully resolved, immutable health check for one startup sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub expected_status: u16,
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
    pub interval: Duration,
}

impl HealthCheckSpec {
    /// Build a spec from its config with the target address filled in.
    pub fn from_config(config: &HealthConfig, host: String, port: u16) -> Self {
        Self {
            host,
            port,
            path: config.path.clone(),
            expected_status: config.expected_status,
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            max_attempts: config.max_attempts,
            interval: Duration::from_millis(config.interval_ms),
        }
    }

    /// The probed URL, for logs and error messages.
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }

    /// Whether a response status satisfies the success predicate.
    pub fn is_success(&self, status: u16) -> bool {
        status == self.expected_status
    }
}

/// Result of polling a health endpoint until it is ready or the budget is spent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ProbeOutcome {
    /// The endpoint answered with the expected status.
    Ready { attempts: u32 },

    /// Every attempt failed.
    TimedOut { attempts: u32 },
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ProbeOutcome::Ready { attempts } | ProbeOutcome::TimedOut { attempts } => *attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_config() {
        let config = HealthConfig {
            path: "/api/health".to_string(),
            interval_ms: 250,
            ..HealthConfig::default()
        };
        let spec = HealthCheckSpec::from_config(&config, "localhost".to_string(), 5000);

        assert_eq!(spec.url(), "http://localhost:5000/api/health");
        assert_eq!(spec.interval, Duration::from_millis(250));
        assert_eq!(spec.max_attempts, 30);
        assert!(spec.is_success(200));
        assert!(!spec.is_success(503));
    }

    #[test]
    fn test_probe_outcome_accessors() {
        assert!(ProbeOutcome::Ready { attempts: 3 }.is_ready());
        assert_eq!(ProbeOutcome::TimedOut { attempts: 30 }.attempts(), 30);
    }
}
