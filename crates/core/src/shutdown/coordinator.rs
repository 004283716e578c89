//! Reverse-order, escalating shutdown.
//!
//! Every live process receives SIGTERM in reverse start order and gets its
//! own grace timer. The timers run concurrently on a [`JoinSet`], so the
//! total latency is bounded by the longest grace period plus the kill
//! timeout rather than their sum.

use crate::process::{ProcessHandle, TerminationSignal, WaitOutcome};
use crate::state::process::{mark_failed, mark_stopped, mark_stopping, record_exit, set_exit};
use crate::state::SupervisorSession;
use lk_protocol::ipc::{Event, ShutdownTrigger};
use lk_protocol::process_models::{ExitInfo, ProcessState};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How a single process went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within its grace period after SIGTERM.
    Graceful,

    /// Needed SIGKILL after the grace period expired.
    Forced,

    /// Was already gone before teardown began.
    AlreadyExited,

    /// Not owned by the supervisor (attach-only), nothing to signal.
    Detached,

    /// Still not reaped after SIGKILL and the kill timeout.
    Unresponsive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub role: String,
    pub outcome: StopOutcome,
    pub exit: Option<ExitInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// This call performed the teardown. Reports are in stop order.
    Completed(Vec<StopReport>),

    /// Another caller already owns the teardown; nothing was done.
    AlreadyInProgress,
}

impl ShutdownOutcome {
    pub fn reports(&self) -> &[StopReport] {
        match self {
            Self::Completed(reports) => reports,
            Self::AlreadyInProgress => &[],
        }
    }
}

/// Tears a [`SupervisorSession`] down.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownCoordinator {
    kill_timeout: Duration,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

struct Target {
    index: usize,
    role: String,
    handle: Option<ProcessHandle>,
    grace: Duration,
}

impl ShutdownCoordinator {
    /// `kill_timeout` bounds the wait for reaping after SIGKILL.
    pub fn new(kill_timeout: Duration) -> Self {
        Self { kill_timeout }
    }

    /// Stop every started process in reverse start order.
    ///
    /// Only the first call per session does anything; later or concurrent
    /// calls return [`ShutdownOutcome::AlreadyInProgress`] straight away.
    /// Every started process ends `Stopped`, or stays `Failed` if it had
    /// already failed.
    pub async fn shutdown(
        &self,
        session: &SupervisorSession,
        trigger: ShutdownTrigger,
    ) -> ShutdownOutcome {
        if !session.begin_shutdown() {
            debug!(session = %session.id(), %trigger, "shutdown already in progress");
            return ShutdownOutcome::AlreadyInProgress;
        }
        session.cancellation().cancel();
        info!(session = %session.id(), %trigger, "shutting down");
        let _ = session.events().send(Event::ShutdownStarted { trigger });

        let targets = self.collect_targets(session).await;

        let mut timers = JoinSet::new();
        for Target {
            index,
            role,
            handle,
            grace,
        } in targets
        {
            match handle {
                Some(handle) if !handle.has_exited() => {
                    if let Err(error) = handle.terminate(TerminationSignal::Graceful) {
                        warn!(role = %role, %error, "graceful signal failed");
                    }
                    let kill_timeout = self.kill_timeout;
                    timers.spawn(async move {
                        let (outcome, exit) =
                            stop_with_escalation(&handle, grace, kill_timeout).await;
                        (index, role, outcome, exit)
                    });
                }
                Some(handle) => {
                    let exit = handle.exit_status();
                    timers.spawn(async move { (index, role, StopOutcome::AlreadyExited, exit) });
                }
                None => {
                    timers.spawn(async move { (index, role, StopOutcome::Detached, None) });
                }
            }
        }

        let mut finished = Vec::new();
        while let Some(joined) = timers.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(error) => error!(%error, "shutdown timer task failed"),
            }
        }
        // Report in stop order, i.e. reverse start order.
        finished.sort_by(|a, b| b.0.cmp(&a.0));

        let mut reports = Vec::with_capacity(finished.len());
        {
            let mut processes = session.processes().await;
            for (index, role, outcome, exit) in finished {
                if let Some(process) = processes.get_mut(index) {
                    if let Some(exit) = exit {
                        set_exit(process, exit);
                    } else {
                        record_exit(process);
                    }
                    let result = match (process.state(), outcome) {
                        (ProcessState::Failed, _) => Ok(()),
                        (_, StopOutcome::Unresponsive) => mark_failed(process, session.events()),
                        (ProcessState::Starting, _) => mark_stopping(process, session.events())
                            .and_then(|()| mark_stopped(process, session.events())),
                        _ => mark_stopped(process, session.events()),
                    };
                    if let Err(error) = result {
                        warn!(role = %role, %error, "unexpected state during shutdown");
                    }
                }
                reports.push(StopReport {
                    role,
                    outcome,
                    exit,
                });
            }
        }

        info!(session = %session.id(), stopped = reports.len(), "shutdown complete");
        let _ = session.events().send(Event::ShutdownCompleted {
            session_id: session.id(),
        });
        ShutdownOutcome::Completed(reports)
    }

    /// Move live processes to `Stopping` and collect what needs signalling.
    async fn collect_targets(&self, session: &SupervisorSession) -> Vec<Target> {
        let mut processes = session.processes().await;
        let mut targets = Vec::new();
        for (index, process) in processes.iter_mut().enumerate().rev() {
            match process.state() {
                ProcessState::NotStarted | ProcessState::Stopped => continue,
                ProcessState::Failed if !process.is_live() => continue,
                ProcessState::Starting | ProcessState::Ready if process.is_live() => {
                    if let Err(error) = mark_stopping(process, session.events()) {
                        warn!(role = %process.role(), %error, "cannot mark stopping");
                    }
                }
                _ => {}
            }
            targets.push(Target {
                index,
                role: process.role().to_string(),
                handle: process.handle.clone(),
                grace: process.grace_period,
            });
        }
        targets
    }
}

/// Wait out the grace period, then escalate to SIGKILL.
async fn stop_with_escalation(
    handle: &ProcessHandle,
    grace: Duration,
    kill_timeout: Duration,
) -> (StopOutcome, Option<ExitInfo>) {
    if let WaitOutcome::Exited(exit) = handle.wait(Some(grace)).await {
        debug!(role = %handle.role(), %exit, "stopped gracefully");
        return (StopOutcome::Graceful, Some(exit));
    }

    warn!(
        role = %handle.role(),
        grace_ms = grace.as_millis() as u64,
        "grace period expired, sending SIGKILL"
    );
    if let Err(error) = handle.terminate(TerminationSignal::Forceful) {
        warn!(role = %handle.role(), %error, "forceful signal failed");
    }

    match handle.wait(Some(kill_timeout)).await {
        WaitOutcome::Exited(exit) => (StopOutcome::Forced, Some(exit)),
        WaitOutcome::TimedOut => {
            error!(role = %handle.role(), "process survived SIGKILL");
            (StopOutcome::Unresponsive, None)
        }
    }
}
