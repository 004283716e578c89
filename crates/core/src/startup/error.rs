//! Startup failures.

use crate::state::StateError;
use crate::startup::template::TemplateError;
use lk_protocol::process_models::{ExitInfo, OutputLine};
use std::fmt;
use thiserror::Error;

/// Why a role could not be brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The executable could not be found or launched.
    Spawn,

    /// The health endpoint never reported ready within its attempt budget.
    HealthTimeout,

    /// The process exited on its own before (or after) becoming ready.
    PrematureExit,

    /// No port could be reserved for the role.
    PortUnavailable,
}

impl FailureReason {
    /// Whether an optional role failing this way may be skipped.
    ///
    /// A process that came up and then died is never skipped.
    pub fn is_overridable(self) -> bool {
        matches!(self, Self::Spawn | Self::HealthTimeout)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn => f.write_str("spawn failure"),
            Self::HealthTimeout => f.write_str("health check timeout"),
            Self::PrematureExit => f.write_str("premature exit"),
            Self::PortUnavailable => f.write_str("port unavailable"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StartupError {
    /// A role failed and every started process was torn down.
    #[error("role '{role}' failed to start ({reason}): {detail}")]
    StartupFailed {
        role: String,
        reason: FailureReason,
        detail: String,
        exit: Option<ExitInfo>,
        /// Last output lines of the failing process, oldest first.
        diagnostics: Vec<OutputLine>,
    },

    /// A shutdown was requested while starting.
    #[error("startup cancelled by shutdown request")]
    Cancelled,

    /// The role configuration cannot be turned into a command.
    #[error("invalid configuration for role '{role}': {reason}")]
    InvalidRole { role: String, reason: String },

    #[error("role '{role}': {source}")]
    Template {
        role: String,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

impl StartupError {
    /// The role the failure is about, if any.
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::StartupFailed { role, .. }
            | Self::InvalidRole { role, .. }
            | Self::Template { role, .. } => Some(role),
            Self::State(StateError::InvalidTransition { role, .. }) => Some(role),
            Self::Cancelled => None,
        }
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::StartupFailed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> &[OutputLine] {
        match self {
            Self::StartupFailed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}
