//! Process state machine implementation.
//!
//! This module provides functions for moving a [`ManagedProcess`] through
//! its lifecycle. Every transition is validated against
//! [`ProcessState::can_transition_to`] and published as
//! [`Event::ProcessStateChanged`].

use crate::process::ProcessHandle;
use chrono::Utc;
use lk_protocol::ipc::Event;
use lk_protocol::process_models::{ExitInfo, ProcessRecord, ProcessState};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("role '{role}' cannot move from {from} to {to}")]
    InvalidTransition {
        role: String,
        from: ProcessState,
        to: ProcessState,
    },
}

/// One role of a supervisor session.
#[derive(Debug)]
pub struct ManagedProcess {
    pub record: ProcessRecord,

    /// `None` until spawned, and forever for attach-only roles.
    pub handle: Option<ProcessHandle>,

    /// How long the process gets between SIGTERM and SIGKILL.
    pub grace_period: Duration,

    /// Whether losing this process ends the session.
    pub primary: bool,
}

impl ManagedProcess {
    pub fn new(role: impl Into<String>, grace_period: Duration, primary: bool) -> Self {
        Self {
            record: ProcessRecord::new(role),
            handle: None,
            grace_period,
            primary,
        }
    }

    pub fn role(&self) -> &str {
        &self.record.role
    }

    pub fn state(&self) -> ProcessState {
        self.record.state
    }

    /// Whether the process may still be running and needs to be stopped.
    pub fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.has_exited())
    }
}

/// Move `process` to `next` and emit the change.
///
/// # Errors
///
/// Returns [`StateError::InvalidTransition`] if the lifecycle does not allow
/// the move; the record is left untouched.
pub fn transition(
    process: &mut ManagedProcess,
    next: ProcessState,
    events_tx: &UnboundedSender<Event>,
) -> Result<(), StateError> {
    let from = process.record.state;
    if !from.can_transition_to(next) {
        return Err(StateError::InvalidTransition {
            role: process.record.role.clone(),
            from,
            to: next,
        });
    }

    process.record.state = next;
    debug!(role = %process.record.role, %from, to = %next, "state transition");
    let _ = events_tx.send(Event::ProcessStateChanged {
        role: process.record.role.clone(),
        from,
        to: next,
    });
    Ok(())
}

/// Transition to Starting, attaching the spawned handle if there is one.
///
/// # Arguments
///
/// * `process` - The process being started
/// * `handle` - The spawned child, or `None` for attach-only roles
/// * `events_tx` - Channel to send the state change event
pub fn mark_starting(
    process: &mut ManagedProcess,
    handle: Option<ProcessHandle>,
    events_tx: &UnboundedSender<Event>,
) -> Result<(), StateError> {
    transition(process, ProcessState::Starting, events_tx)?;
    process.record.pid = handle.as_ref().and_then(ProcessHandle::pid);
    process.record.started_at = Some(Utc::now());
    process.handle = handle;
    Ok(())
}

/// Transition Starting -> Ready.
pub fn mark_ready(
    process: &mut ManagedProcess,
    events_tx: &UnboundedSender<Event>,
) -> Result<(), StateError> {
    transition(process, ProcessState::Ready, events_tx)
}

/// Transition to Failed, recording the exit if the process is gone.
///
/// Failing a process that already failed is a no-op, so that the several
/// paths which can notice one failure don't trip over each other.
pub fn mark_failed(
    process: &mut ManagedProcess,
    events_tx: &UnboundedSender<Event>,
) -> Result<(), StateError> {
    if process.record.state == ProcessState::Failed {
        return Ok(());
    }
    if process.record.state == ProcessState::NotStarted {
        // Spawn failures never reach Starting.
        transition(process, ProcessState::Starting, events_tx)?;
    }
    transition(process, ProcessState::Failed, events_tx)?;
    record_exit(process);
    Ok(())
}

/// Transition to Stopping before the first termination signal.
pub fn mark_stopping(
    process: &mut ManagedProcess,
    events_tx: &UnboundedSender<Event>,
) -> Result<(), StateError> {
    transition(process, ProcessState::Stopping, events_tx)
}

/// Transition to Stopped once the process is confirmed gone.
pub fn mark_stopped(
    process: &mut ManagedProcess,
    events_tx: &UnboundedSender<Event>,
) -> Result<(), StateError> {
    transition(process, ProcessState::Stopped, events_tx)?;
    record_exit(process);
    Ok(())
}

/// Copy the handle's exit status into the record, if it has exited.
pub fn record_exit(process: &mut ManagedProcess) {
    if let Some(exit) = process.handle.as_ref().and_then(ProcessHandle::exit_status) {
        process.record.exit = Some(exit);
    }
}

/// Record an exit observed from an event rather than from the handle.
pub fn set_exit(process: &mut ManagedProcess, exit: ExitInfo) {
    process.record.exit = Some(exit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn backend() -> ManagedProcess {
        ManagedProcess::new("backend", Duration::from_secs(5), false)
    }

    #[test]
    fn test_new_process_is_not_started() {
        let process = backend();
        assert_eq!(process.role(), "backend");
        assert_eq!(process.state(), ProcessState::NotStarted);
        assert!(!process.is_live());
    }

    #[test]
    fn test_happy_path_emits_every_change() {
        let mut process = backend();
        let (tx, mut rx) = mpsc::unbounded_channel();

        mark_starting(&mut process, None, &tx).unwrap();
        assert!(process.record.started_at.is_some());
        mark_ready(&mut process, &tx).unwrap();
        mark_stopping(&mut process, &tx).unwrap();
        mark_stopped(&mut process, &tx).unwrap();

        let mut seen = Vec::new();
        while let Ok(Event::ProcessStateChanged { from, to, .. }) = rx.try_recv() {
            seen.push((from, to));
        }
        assert_eq!(
            seen,
            vec![
                (ProcessState::NotStarted, ProcessState::Starting),
                (ProcessState::Starting, ProcessState::Ready),
                (ProcessState::Ready, ProcessState::Stopping),
                (ProcessState::Stopping, ProcessState::Stopped),
            ]
        );
    }

    #[test]
    fn test_ready_cannot_regress_to_starting() {
        let mut process = backend();
        let (tx, _rx) = mpsc::unbounded_channel();
        mark_starting(&mut process, None, &tx).unwrap();
        mark_ready(&mut process, &tx).unwrap();

        let error = transition(&mut process, ProcessState::Starting, &tx).unwrap_err();
        assert_eq!(
            error,
            StateError::InvalidTransition {
                role: "backend".to_string(),
                from: ProcessState::Ready,
                to: ProcessState::Starting,
            }
        );
        assert_eq!(process.state(), ProcessState::Ready);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut process = backend();
        let (tx, _rx) = mpsc::unbounded_channel();
        mark_failed(&mut process, &tx).unwrap();
        assert_eq!(process.state(), ProcessState::Failed);

        // Failing again is tolerated; anything else is rejected.
        mark_failed(&mut process, &tx).unwrap();
        assert!(mark_stopping(&mut process, &tx).is_err());
        assert!(mark_stopped(&mut process, &tx).is_err());
    }

    #[test]
    fn test_stopped_cannot_restart() {
        let mut process = backend();
        let (tx, _rx) = mpsc::unbounded_channel();
        mark_starting(&mut process, None, &tx).unwrap();
        mark_ready(&mut process, &tx).unwrap();
        mark_stopped(&mut process, &tx).unwrap();
        assert!(mark_starting(&mut process, None, &tx).is_err());
    }
}
