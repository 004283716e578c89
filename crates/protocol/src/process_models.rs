//! Runtime process state models.
//!
//! This module defines the structures for tracking the state of every
//! process the supervisor starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a managed process.
///
/// The state progresses through these values during a normal run:
/// NotStarted -> Starting -> Ready -> Stopping -> Stopped
///
/// Special states:
/// - Failed: the process never became ready, exited unexpectedly, or was
///   skipped by the operator in degraded mode. Failed is terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// The role is declared but nothing has been spawned yet.
    NotStarted,

    /// The process is spawned and its readiness is being established.
    Starting,

    /// The process passed its health check (or has no health endpoint).
    Ready,

    /// The process failed to start, became unhealthy, or exited unexpectedly.
    Failed,

    /// A termination signal has been sent.
    Stopping,

    /// The process has exited after a shutdown request.
    Stopped,
}

impl ProcessState {
    /// Whether moving from `self` to `next` respects the monotonic lifecycle.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, Ready)
                | (Starting, Failed)
                | (Starting, Stopping)
                | (Ready, Stopping)
                | (Ready, Stopped)
                | (Ready, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }

    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Failed | ProcessState::Stopped)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not-started",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Which standard stream a captured output line came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// One captured line of child output, retained for failure diagnostics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub line: String,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stream, self.line)
    }
}

/// How a process terminated.
///
/// On unix a process killed by a signal has no exit code; `signal` carries
/// the signal number instead.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,

    /// Terminating signal number, if the process was killed by a signal.
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// A normal exit with the given code.
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Whether the process exited with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Observable snapshot of one managed process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    /// Role name, e.g. `backend`, `devserver` or `shell`.
    pub role: String,

    /// OS process id once spawned.
    pub pid: Option<u32>,

    /// Current lifecycle state.
    pub state: ProcessState,

    /// When the process was spawned.
    pub started_at: Option<DateTime<Utc>>,

    /// How the process terminated, once it has.
    pub exit: Option<ExitInfo>,
}

impl ProcessRecord {
    /// A record for a role that has not been started yet.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            pid: None,
            state: ProcessState::NotStarted,
            started_at: None,
            exit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_are_allowed() {
        assert!(ProcessState::NotStarted.can_transition_to(ProcessState::Starting));
        assert!(ProcessState::Starting.can_transition_to(ProcessState::Ready));
        assert!(ProcessState::Ready.can_transition_to(ProcessState::Stopping));
        assert!(ProcessState::Stopping.can_transition_to(ProcessState::Stopped));
    }

    #[test]
    fn test_ready_never_regresses_to_starting() {
        assert!(!ProcessState::Ready.can_transition_to(ProcessState::Starting));
        assert!(!ProcessState::Ready.can_transition_to(ProcessState::NotStarted));
        assert!(!ProcessState::NotStarted.can_transition_to(ProcessState::Ready));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [
            ProcessState::Starting,
            ProcessState::Ready,
            ProcessState::Stopping,
            ProcessState::Stopped,
        ] {
            assert!(!ProcessState::Failed.can_transition_to(next));
        }
        assert!(!ProcessState::Stopped.can_transition_to(ProcessState::Starting));
        assert!(ProcessState::Failed.is_terminal());
        assert!(ProcessState::Stopped.is_terminal());
        assert!(!ProcessState::Ready.is_terminal());
    }

    #[test]
    fn test_exit_info_display() {
        assert_eq!(ExitInfo::from_code(3).to_string(), "exit code 3");
        let killed = ExitInfo {
            code: None,
            signal: Some(9),
        };
        assert_eq!(killed.to_string(), "signal 9");
        assert!(!killed.success());
        assert!(ExitInfo::from_code(0).success());
    }
}
