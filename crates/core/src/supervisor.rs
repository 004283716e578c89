//! The supervision loop tying startup, monitoring and shutdown together.

use crate::health::{HealthProbe, HttpProbe};
use crate::process::ProcessHandle;
use crate::shutdown::{listen_for_signals, ShutdownCoordinator, ShutdownOutcome};
use crate::startup::{AlwaysAbort, OperatorPrompt, StartupError, StartupReport, StartupSequencer};
use crate::state::process::{mark_failed, set_exit};
use crate::state::SupervisorSession;
use lk_protocol::config_models::{Mode, SupervisorConfig};
use lk_protocol::ipc::{Event, ShutdownTrigger};
use lk_protocol::process_models::{ExitInfo, ProcessState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub session_id: Uuid,
    pub startup: StartupReport,
    pub trigger: ShutdownTrigger,
    pub shutdown: ShutdownOutcome,
}

/// Runs one supervisor session from startup to teardown.
pub struct Supervisor {
    config: SupervisorConfig,
    project_root: PathBuf,
    probe: Arc<dyn HealthProbe>,
    prompt: Arc<dyn OperatorPrompt>,
    handle_signals: bool,
}

impl Supervisor {
    /// A supervisor using [`HttpProbe`], [`AlwaysAbort`] and OS signals.
    pub fn new(config: SupervisorConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
            probe: Arc::new(HttpProbe::new()),
            prompt: Arc::new(AlwaysAbort),
            handle_signals: true,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn OperatorPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Skip installing SIGINT/SIGTERM/SIGQUIT handlers (for embedding and tests).
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Create a session for `mode` without running it.
    ///
    /// Returns the session and the receiving end of its event channel, for
    /// callers that want to request shutdown from outside via
    /// [`SupervisorSession::request_shutdown`].
    pub fn session(&self, mode: Mode) -> (Arc<SupervisorSession>, mpsc::UnboundedReceiver<Event>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (Arc::new(SupervisorSession::new(mode, events_tx)), events_rx)
    }

    /// Start every role for `mode`, supervise until a shutdown trigger, then
    /// tear down.
    ///
    /// `observer` sees every event as it is consumed.
    pub async fn run<F>(&self, mode: Mode, observer: F) -> Result<RunSummary, StartupError>
    where
        F: FnMut(&Event),
    {
        let (session, events_rx) = self.session(mode);
        self.run_session(session, events_rx, observer).await
    }

    /// [`Supervisor::run`] on a session created with [`Supervisor::session`].
    pub async fn run_session<F>(
        &self,
        session: Arc<SupervisorSession>,
        mut events_rx: mpsc::UnboundedReceiver<Event>,
        mut observer: F,
    ) -> Result<RunSummary, StartupError>
    where
        F: FnMut(&Event),
    {
        let mode = session.mode();
        let roles = self.config.roles_for(mode);
        info!(session = %session.id(), %mode, roles = roles.len(), "starting supervisor session");

        let signals = if self.handle_signals {
            match listen_for_signals(Arc::clone(&session)) {
                Ok(task) => Some(task),
                Err(error) => {
                    warn!(%error, "cannot install signal handlers");
                    None
                }
            }
        } else {
            None
        };

        let sequencer = StartupSequencer::new(
            Arc::clone(&self.probe),
            Arc::clone(&self.prompt),
            self.config.supervisor.clone(),
            self.project_root.clone(),
        );
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(
            self.config.supervisor.kill_timeout_ms,
        ));

        // Forward events while startup runs; the sequencer handles its own
        // cancellation and teardown.
        let startup = {
            let started = sequencer.start(&session, &roles);
            tokio::pin!(started);
            loop {
                tokio::select! {
                    result = &mut started => break result,
                    Some(event) = events_rx.recv() => observer(&event),
                }
            }
        };
        let startup = match startup {
            Ok(report) => report,
            Err(error) => {
                drain(&mut events_rx, &mut observer);
                if let Some(task) = signals {
                    task.abort();
                }
                return Err(error);
            }
        };

        // Requests and exits seen while starting were only forwarded.
        let pending = match session.requested_trigger() {
            Some(trigger) => Some(trigger),
            None => self.reconcile_exits(&session).await,
        };
        let trigger = match pending {
            Some(trigger) => trigger,
            None => self.supervise(&session, &mut events_rx, &mut observer).await,
        };

        let shutdown = coordinator.shutdown(&session, trigger.clone()).await;
        drain(&mut events_rx, &mut observer);
        if let Some(task) = signals {
            task.abort();
        }

        Ok(RunSummary {
            session_id: session.id(),
            startup,
            trigger,
            shutdown,
        })
    }

    /// Consume events until something ends the session.
    async fn supervise<F: FnMut(&Event)>(
        &self,
        session: &SupervisorSession,
        events_rx: &mut mpsc::UnboundedReceiver<Event>,
        observer: &mut F,
    ) -> ShutdownTrigger {
        while let Some(event) = events_rx.recv().await {
            observer(&event);
            match event {
                Event::ShutdownRequested { trigger } => return trigger,
                Event::ProcessExited { role, exit } => {
                    if let Some(trigger) = self.on_exit(session, &role, exit).await {
                        return trigger;
                    }
                }
                _ => {}
            }
        }
        ShutdownTrigger::Quit
    }

    /// Apply exits whose events were consumed while startup was running.
    ///
    /// Returns the trigger if the primary process is among them.
    async fn reconcile_exits(&self, session: &SupervisorSession) -> Option<ShutdownTrigger> {
        let mut processes = session.processes().await;
        let mut trigger = None;
        for process in processes.iter_mut() {
            let Some(exit) = process.handle.as_ref().and_then(ProcessHandle::exit_status) else {
                continue;
            };
            let role = process.role().to_string();
            if process.primary {
                info!(role, %exit, "primary process exited during startup");
                trigger.get_or_insert(ShutdownTrigger::PrimaryExited { role });
            } else if process.state() == ProcessState::Ready {
                error!(role, %exit, "process exited unexpectedly");
                set_exit(process, exit);
                if let Err(error) = mark_failed(process, session.events()) {
                    warn!(role, %error, "cannot mark failed");
                }
            }
        }
        trigger
    }

    /// React to a process exiting while the session is running.
    ///
    /// Losing the primary process ends the session; losing any other
    /// process marks it failed and keeps the session up.
    async fn on_exit(
        &self,
        session: &SupervisorSession,
        role: &str,
        exit: ExitInfo,
    ) -> Option<ShutdownTrigger> {
        if session.is_shutting_down() {
            return None;
        }
        let mut processes = session.processes().await;
        let process = processes.iter_mut().find(|p| p.role() == role)?;
        set_exit(process, exit);

        if process.primary {
            info!(role, %exit, "primary process exited");
            return Some(ShutdownTrigger::PrimaryExited {
                role: role.to_string(),
            });
        }
        if process.state() == ProcessState::Ready {
            error!(role, %exit, "process exited unexpectedly");
            if let Err(error) = mark_failed(process, session.events()) {
                warn!(role, %error, "cannot mark failed");
            }
        }
        None
    }
}

fn drain<F: FnMut(&Event)>(events_rx: &mut mpsc::UnboundedReceiver<Event>, observer: &mut F) {
    while let Ok(event) = events_rx.try_recv() {
        observer(&event);
    }
}
