//! Supervisor configuration models for `.lifecycle/config.toml`.
//!
//! This module defines the structure of the supervisor configuration file:
//! global settings plus the ordered list of roles to start.

use crate::health_models::HealthConfig;
use crate::port_models::PortConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which flavour of the application is being supervised.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Development server plus shell, backend usually started by hand.
    Development,

    /// Bundled backend plus shell.
    #[default]
    Production,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Project-wide supervisor settings.
///
/// # Example
///
/// ```toml
/// [supervisor]
/// grace-period-ms = 5000
/// output-buffer-lines = 200
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SupervisorSettings {
    /// Default delay between the graceful and the forceful signal.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// How long to wait for exit after the forceful signal.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,

    /// Number of output lines retained per process for diagnostics.
    #[serde(default = "default_output_buffer_lines")]
    pub output_buffer_lines: usize,

    /// Ceiling on ports tried by the negotiator.
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u16,
}

fn default_grace_period_ms() -> u64 {
    5_000
}

fn default_kill_timeout_ms() -> u64 {
    2_000
}

fn default_output_buffer_lines() -> usize {
    200
}

fn default_port_attempts() -> u16 {
    100
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
            output_buffer_lines: default_output_buffer_lines(),
            port_attempts: default_port_attempts(),
        }
    }
}

/// One supervised role, e.g. `backend`, `devserver` or `shell`.
///
/// Roles are started in the order they are declared and stopped in reverse.
///
/// # Example
///
/// ```toml
/// [[roles]]
/// name = "backend"
/// command = "resources/backend/app"
/// working-dir = "resources/backend"
/// modes = ["production"]
/// env = { PYTHONUNBUFFERED = "1" }
///
/// [roles.health]
/// port = 5000
/// path = "/api/health"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct RoleConfig {
    /// Unique role name.
    pub name: String,

    /// Human readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Executable to spawn. A role without a command is attach-only: it is
    /// expected to be running already and is only health checked.
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments; may contain `{port}`, `{host}`, `{url}` and
    /// `{<role>.port}` style placeholders.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory, relative to the project root.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Environment overlay merged into the supervisor's environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Modes this role participates in. Empty means every mode.
    #[serde(default)]
    pub modes: Vec<Mode>,

    /// Failure to become ready asks the operator instead of aborting.
    #[serde(default)]
    pub optional: bool,

    /// Exit of this role shuts the whole session down.
    #[serde(default)]
    pub primary: bool,

    /// Per-role override of the shutdown grace period.
    #[serde(default)]
    pub grace_period_ms: Option<u64>,

    /// Port to negotiate before spawning.
    #[serde(default)]
    pub port: Option<PortConfig>,

    /// Readiness endpoint to poll after spawning.
    #[serde(default)]
    pub health: Option<HealthConfig>,
}

impl RoleConfig {
    /// A bare role with only a name and a command.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            command: Some(command.into()),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            modes: Vec::new(),
            optional: false,
            primary: false,
            grace_period_ms: None,
            port: None,
            health: None,
        }
    }

    /// Whether the role is part of the given mode.
    pub fn runs_in(&self, mode: Mode) -> bool {
        self.modes.is_empty() || self.modes.contains(&mode)
    }

    /// Whether the supervisor only attaches to an external process.
    pub fn is_attach_only(&self) -> bool {
        self.command.is_none()
    }
}

/// Contents of `.lifecycle/config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    #[serde(default)]
    pub roles: Vec<RoleConfig>,
}

impl SupervisorConfig {
    /// Roles that run in `mode`, in declaration order.
    pub fn roles_for(&self, mode: Mode) -> Vec<RoleConfig> {
        self.roles
            .iter()
            .filter(|role| role.runs_in(mode))
            .cloned()
            .collect()
    }
}
