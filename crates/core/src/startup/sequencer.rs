//! Ordered, health-gated startup.
//!
//! Each role goes through port negotiation, spawn and readiness before the
//! next role is touched. The first unrecoverable failure tears down every
//! process started so far (through the [`ShutdownCoordinator`], in reverse
//! order) and is returned as one [`StartupError::StartupFailed`].

use crate::health::HealthProbe;
use crate::ports::PortNegotiator;
use crate::process::{ProcessCommand, ProcessHandle, TerminationSignal};
use crate::shutdown::ShutdownCoordinator;
use crate::startup::error::{FailureReason, StartupError};
use crate::startup::prompt::{Decision, OperatorPrompt};
use crate::startup::template::TemplateContext;
use crate::state::process::{mark_failed, mark_ready, mark_starting, ManagedProcess};
use crate::state::SupervisorSession;
use lk_protocol::config_models::{RoleConfig, SupervisorSettings};
use lk_protocol::health_models::{HealthCheckSpec, ProbeOutcome};
use lk_protocol::ipc::{Event, ShutdownTrigger};
use lk_protocol::port_models::PortBinding;
use lk_protocol::process_models::{ExitInfo, ProcessState};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_HEALTH_HOST: &str = "127.0.0.1";

/// What a successful startup produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub session_id: Uuid,

    /// Roles that reached `Ready`, in start order.
    pub ready: Vec<String>,

    /// Optional roles the operator chose to continue without.
    pub degraded: Vec<String>,

    /// Negotiated ports by role.
    pub bindings: BTreeMap<String, PortBinding>,
}

impl StartupReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// How one role's startup ended, short of a hard error.
enum RoleOutcome {
    Ready,
    Failed {
        reason: FailureReason,
        detail: String,
        exit: Option<ExitInfo>,
    },
    Cancelled,
}

/// Brings roles up one at a time.
pub struct StartupSequencer {
    probe: Arc<dyn HealthProbe>,
    prompt: Arc<dyn OperatorPrompt>,
    ports: PortNegotiator,
    coordinator: ShutdownCoordinator,
    settings: SupervisorSettings,
    project_root: PathBuf,
}

impl StartupSequencer {
    /// # Arguments
    ///
    /// * `probe` - Readiness check used for roles with a `health` section
    /// * `prompt` - Consulted when an optional role fails
    /// * `settings` - Grace periods, output buffer size and port attempts
    /// * `project_root` - Base for each role's `working_dir`
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        prompt: Arc<dyn OperatorPrompt>,
        settings: SupervisorSettings,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            probe,
            prompt,
            ports: PortNegotiator::new(settings.port_attempts),
            coordinator: ShutdownCoordinator::new(Duration::from_millis(settings.kill_timeout_ms)),
            settings,
            project_root: project_root.into(),
        }
    }

    /// Start `roles` in order on `session`.
    ///
    /// Every role is registered as `NotStarted` up front, so a failed
    /// sequence still shows which roles were never reached.
    ///
    /// # Errors
    ///
    /// - [`StartupError::StartupFailed`] naming the first role that failed
    ///   and could not be skipped; everything started is torn down first.
    /// - [`StartupError::Cancelled`] when a shutdown was requested midway.
    /// - [`StartupError::InvalidRole`] / [`StartupError::Template`] for
    ///   configuration that cannot be turned into a command.
    pub async fn start(
        &self,
        session: &SupervisorSession,
        roles: &[RoleConfig],
    ) -> Result<StartupReport, StartupError> {
        let base = session.processes().await.len();
        for role in roles {
            let grace = Duration::from_millis(
                role.grace_period_ms
                    .unwrap_or(self.settings.grace_period_ms),
            );
            session
                .register(ManagedProcess::new(&role.name, grace, role.primary))
                .await;
        }

        let mut report = StartupReport {
            session_id: session.id(),
            ready: Vec::new(),
            degraded: Vec::new(),
            bindings: BTreeMap::new(),
        };
        let mut templates = TemplateContext::new();

        for (offset, role) in roles.iter().enumerate() {
            let index = base + offset;

            if session.cancellation().is_cancelled() {
                return Err(self.cancel(session).await);
            }
            if let Some(error) = self.abort_if_exited(session, base..index).await {
                return Err(error);
            }

            let outcome = match self.start_role(session, index, role, &mut templates, &mut report).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    // Configuration errors still leave nothing running.
                    self.coordinator
                        .shutdown(
                            session,
                            ShutdownTrigger::StartupAborted {
                                role: role.name.clone(),
                            },
                        )
                        .await;
                    return Err(error);
                }
            };

            match outcome {
                RoleOutcome::Ready => {
                    info!(role = %role.name, "role ready");
                    report.ready.push(role.name.clone());
                }
                RoleOutcome::Cancelled => return Err(self.cancel(session).await),
                RoleOutcome::Failed {
                    reason,
                    detail,
                    exit,
                } => {
                    self.mark_role_failed(session, index).await?;
                    if role.optional && reason.is_overridable() {
                        let decision = tokio::select! {
                            decision = self.prompt.decide(&role.name, reason, &detail) => decision,
                            () = session.cancellation().cancelled() => {
                                return Err(self.cancel(session).await);
                            }
                        };
                        match decision {
                            Decision::Proceed => {
                                self.degrade(session, index, role, &detail).await;
                                report.degraded.push(role.name.clone());
                                continue;
                            }
                            Decision::Abort => {}
                        }
                    }
                    return Err(self.abort(session, &role.name, reason, detail, exit).await);
                }
            }
        }

        // The last health wait only watched its own process.
        if let Some(error) = self.abort_if_exited(session, base..base + roles.len()).await {
            return Err(error);
        }

        info!(
            session = %session.id(),
            ready = report.ready.len(),
            degraded = report.degraded.len(),
            "startup complete"
        );
        let _ = session.events().send(Event::StartupCompleted {
            session_id: session.id(),
            degraded: report.degraded.clone(),
        });
        Ok(report)
    }

    async fn start_role(
        &self,
        session: &SupervisorSession,
        index: usize,
        role: &RoleConfig,
        templates: &mut TemplateContext,
        report: &mut StartupReport,
    ) -> Result<RoleOutcome, StartupError> {
        let cancel = session.cancellation();
        let template_error = |source| StartupError::Template {
            role: role.name.clone(),
            source,
        };

        // 1. Port.
        let binding = match &role.port {
            Some(port) => {
                let host = templates.render(&port.host).map_err(template_error)?;
                let reserved = tokio::select! {
                    reserved = self.ports.reserve(&host, port.preferred) => reserved,
                    () = cancel.cancelled() => return Ok(RoleOutcome::Cancelled),
                };
                match reserved {
                    Ok(binding) => {
                        info!(role = %role.name, port = binding.port, "port resolved");
                        let _ = session.events().send(Event::PortResolved {
                            role: role.name.clone(),
                            binding: binding.clone(),
                        });
                        templates.insert_role(&role.name, binding.clone());
                        report.bindings.insert(role.name.clone(), binding.clone());
                        Some(binding)
                    }
                    Err(error) => {
                        return Ok(RoleOutcome::Failed {
                            reason: FailureReason::PortUnavailable,
                            detail: error.to_string(),
                            exit: None,
                        })
                    }
                }
            }
            None => None,
        };
        let scope = templates.with_own(binding.clone());

        // 2. Spawn.
        let handle = match &role.command {
            Some(program) => {
                let command = self.build_command(role, program, &scope)?;
                match ProcessHandle::spawn(&role.name, &command, session.events().clone()) {
                    Ok(handle) => Some(handle),
                    Err(error) => {
                        return Ok(RoleOutcome::Failed {
                            reason: FailureReason::Spawn,
                            detail: error.to_string(),
                            exit: None,
                        })
                    }
                }
            }
            None => {
                info!(role = %role.name, "attach-only role, not spawning");
                None
            }
        };
        {
            let mut processes = session.processes().await;
            if let Some(process) = processes.get_mut(index) {
                mark_starting(process, handle.clone(), session.events())?;
            }
        }
        if cancel.is_cancelled() {
            return Ok(RoleOutcome::Cancelled);
        }

        // 3. Readiness.
        let Some(health) = &role.health else {
            self.mark_role_ready(session, index).await?;
            return Ok(RoleOutcome::Ready);
        };

        let host = match &health.host {
            Some(host) => scope.render(host).map_err(template_error)?,
            None => binding
                .as_ref()
                .map_or_else(|| DEFAULT_HEALTH_HOST.to_string(), |b| b.host.clone()),
        };
        let Some(port) = health.port.or(binding.as_ref().map(|b| b.port)) else {
            return Err(StartupError::InvalidRole {
                role: role.name.clone(),
                reason: "health check needs either health.port or a port section".to_string(),
            });
        };
        let mut health = health.clone();
        health.path = scope.render(&health.path).map_err(template_error)?;
        let spec = HealthCheckSpec::from_config(&health, host, port);
        info!(role = %role.name, url = %spec.url(), max_attempts = spec.max_attempts, "waiting for readiness");

        let events = session.events().clone();
        let role_name = role.name.clone();
        let max_attempts = spec.max_attempts;
        let on_attempt = move |attempt: u32, ready: bool| {
            let _ = events.send(Event::HealthAttempt {
                role: role_name.clone(),
                attempt,
                max_attempts,
                ready,
            });
        };

        let exited = {
            let handle = handle.clone();
            async move {
                match handle {
                    Some(handle) => handle.exited().await,
                    None => std::future::pending().await,
                }
            }
        };

        let outcome = tokio::select! {
            outcome = self.probe.wait_until_ready_observed(&spec, &on_attempt) => outcome,
            exit = exited => {
                warn!(role = %role.name, %exit, "exited before becoming ready");
                return Ok(RoleOutcome::Failed {
                    reason: FailureReason::PrematureExit,
                    detail: format!("exited with {exit} before becoming ready"),
                    exit: Some(exit),
                });
            }
            () = cancel.cancelled() => return Ok(RoleOutcome::Cancelled),
        };

        match outcome {
            ProbeOutcome::Ready { attempts } => {
                info!(role = %role.name, attempts, "health check passed");
                self.mark_role_ready(session, index).await?;
                Ok(RoleOutcome::Ready)
            }
            ProbeOutcome::TimedOut { attempts } => Ok(RoleOutcome::Failed {
                reason: FailureReason::HealthTimeout,
                detail: format!("{} not ready after {attempts} attempts", spec.url()),
                exit: None,
            }),
        }
    }

    fn build_command(
        &self,
        role: &RoleConfig,
        program: &str,
        scope: &TemplateContext,
    ) -> Result<ProcessCommand, StartupError> {
        let template_error = |source| StartupError::Template {
            role: role.name.clone(),
            source,
        };

        let working_dir = match &role.working_dir {
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.clone(),
        };
        let mut command = ProcessCommand::new(scope.render(program).map_err(template_error)?, working_dir)
            .with_output_lines(self.settings.output_buffer_lines);
        for arg in &role.args {
            command.args.push(scope.render(arg).map_err(template_error)?);
        }
        for (key, value) in &role.env {
            command
                .env
                .insert(key.clone(), scope.render(value).map_err(template_error)?);
        }
        Ok(command)
    }

    async fn mark_role_ready(&self, session: &SupervisorSession, index: usize) -> Result<(), StartupError> {
        let mut processes = session.processes().await;
        if let Some(process) = processes.get_mut(index) {
            mark_ready(process, session.events())?;
        }
        Ok(())
    }

    async fn mark_role_failed(&self, session: &SupervisorSession, index: usize) -> Result<(), StartupError> {
        let mut processes = session.processes().await;
        if let Some(process) = processes.get_mut(index) {
            mark_failed(process, session.events())?;
        }
        Ok(())
    }

    /// Continue without an optional role.
    async fn degrade(&self, session: &SupervisorSession, index: usize, role: &RoleConfig, detail: &str) {
        warn!(role = %role.name, detail, "continuing in degraded mode");
        let processes = session.processes().await;
        if let Some(handle) = processes.get(index).and_then(|p| p.handle.as_ref()) {
            // An unhealthy process is of no use; the coordinator reaps it later.
            if let Err(error) = handle.terminate(TerminationSignal::Graceful) {
                warn!(role = %role.name, %error, "cannot stop degraded role");
            }
        }
        let _ = session.events().send(Event::DegradedMode {
            role: role.name.clone(),
            reason: detail.to_string(),
        });
    }

    /// First role in `range` that was ready but has since exited.
    async fn find_exited(
        &self,
        session: &SupervisorSession,
        range: std::ops::Range<usize>,
    ) -> Option<(String, ExitInfo)> {
        let processes = session.processes().await;
        processes.get(range)?.iter().find_map(|process| {
            if process.state() != ProcessState::Ready {
                return None;
            }
            let exit = process.handle.as_ref()?.exit_status()?;
            Some((process.role().to_string(), exit))
        })
    }

    /// Abort startup if a ready role in `range` has already exited.
    async fn abort_if_exited(
        &self,
        session: &SupervisorSession,
        range: std::ops::Range<usize>,
    ) -> Option<StartupError> {
        let (role, exit) = self.find_exited(session, range).await?;
        Some(
            self.abort(
                session,
                &role,
                FailureReason::PrematureExit,
                format!("exited with {exit} while later roles were starting"),
                Some(exit),
            )
            .await,
        )
    }

    /// Tear down and build the aggregated failure for `role`.
    async fn abort(
        &self,
        session: &SupervisorSession,
        role: &str,
        reason: FailureReason,
        detail: String,
        exit: Option<ExitInfo>,
    ) -> StartupError {
        error!(role, %reason, detail = %detail, "startup failed");

        let diagnostics = {
            let mut processes = session.processes().await;
            match processes.iter_mut().find(|p| p.role() == role) {
                Some(process) => {
                    if let Err(error) = mark_failed(process, session.events()) {
                        warn!(role, %error, "cannot mark failed");
                    }
                    process
                        .handle
                        .as_ref()
                        .map(ProcessHandle::diagnostics)
                        .unwrap_or_default()
                }
                None => Vec::new(),
            }
        };

        let _ = session.events().send(Event::StartupFailed {
            role: role.to_string(),
            reason: reason.to_string(),
        });
        self.coordinator
            .shutdown(
                session,
                ShutdownTrigger::StartupAborted {
                    role: role.to_string(),
                },
            )
            .await;

        // Pick up the last lines written while the process was being stopped.
        let diagnostics = {
            let processes = session.processes().await;
            processes
                .iter()
                .find(|p| p.role() == role)
                .and_then(|p| p.handle.as_ref())
                .map(ProcessHandle::diagnostics)
                .unwrap_or(diagnostics)
        };

        StartupError::StartupFailed {
            role: role.to_string(),
            reason,
            detail,
            exit,
            diagnostics,
        }
    }

    async fn cancel(&self, session: &SupervisorSession) -> StartupError {
        let trigger = session
            .requested_trigger()
            .unwrap_or(ShutdownTrigger::Quit);
        info!(%trigger, "startup cancelled");
        self.coordinator.shutdown(session, trigger).await;
        StartupError::Cancelled
    }
}
