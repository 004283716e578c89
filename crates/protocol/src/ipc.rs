//! Events published by the supervisor and the build pipeline.
//!
//! The core never calls back into its observers. Everything that happens to
//! a managed process (state changes, output lines, exits) is published as an
//! [`Event`] on a channel owned by the session. The supervision loop consumes
//! that channel and decides whether a shutdown is needed.
//!
//! Uses tagged enum serialization so that events can be logged as JSON:
//! ```json
//! {
//!   "type": "processStateChanged",
//!   "payload": { "role": "backend", "from": "STARTING", "to": "READY" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::build_models::StepReport;
use crate::config_models::Mode;
use crate::port_models::PortBinding;
use crate::process_models::{ExitInfo, OutputStream, ProcessState};

/// Why a shutdown was requested.
///
/// All triggers converge on the same idempotent shutdown path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ShutdownTrigger {
    /// Explicit application quit.
    Quit,

    /// The primary (GUI shell) process went away.
    PrimaryExited { role: String },

    /// The supervisor itself received a termination signal.
    Signal { name: String },

    /// Startup failed and the started processes are being torn down.
    StartupAborted { role: String },
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => f.write_str("quit requested"),
            Self::PrimaryExited { role } => write!(f, "primary role '{role}' exited"),
            Self::Signal { name } => write!(f, "received {name}"),
            Self::StartupAborted { role } => write!(f, "startup of '{role}' failed"),
        }
    }
}

/// Events sent from the core to whoever drives the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A new supervisor session was created.
    SessionStarted { session_id: Uuid, mode: Mode },

    /// A managed process changed lifecycle state.
    ProcessStateChanged {
        role: String,
        from: ProcessState,
        to: ProcessState,
    },

    /// A port was negotiated for a role.
    PortResolved { role: String, binding: PortBinding },

    /// A process was spawned.
    ProcessSpawned { role: String, pid: Option<u32> },

    /// A health check attempt finished.
    HealthAttempt {
        role: String,
        attempt: u32,
        max_attempts: u32,
        ready: bool,
    },

    /// A process wrote one line to stdout or stderr.
    ProcessOutput {
        role: String,
        stream: OutputStream,
        line: String,
    },

    /// A process terminated.
    ProcessExited { role: String, exit: ExitInfo },

    /// The operator chose to continue without an optional role.
    DegradedMode { role: String, reason: String },

    /// Every role reached `Ready` (or was skipped in degraded mode).
    StartupCompleted {
        session_id: Uuid,
        degraded: Vec<String>,
    },

    /// Startup aborted because of the named role.
    StartupFailed { role: String, reason: String },

    /// Someone asked for the session to shut down.
    ShutdownRequested { trigger: ShutdownTrigger },

    /// Teardown began.
    ShutdownStarted { trigger: ShutdownTrigger },

    /// Every process has been confirmed stopped.
    ShutdownCompleted { session_id: Uuid },

    /// A build step is about to run.
    BuildStepStarted {
        step: String,
        index: usize,
        total: usize,
    },

    /// A build step finished (or was skipped).
    BuildStepFinished { report: StepReport },

    /// The build pipeline finished.
    BuildCompleted { success: bool },
}

impl Event {
    /// Role the event is about, if any.
    pub fn role(&self) -> Option<&str> {
        match self {
            Event::ProcessStateChanged { role, .. }
            | Event::PortResolved { role, .. }
            | Event::ProcessSpawned { role, .. }
            | Event::HealthAttempt { role, .. }
            | Event::ProcessOutput { role, .. }
            | Event::ProcessExited { role, .. }
            | Event::DegradedMode { role, .. }
            | Event::StartupFailed { role, .. } => Some(role),
            _ => None,
        }
    }
}
