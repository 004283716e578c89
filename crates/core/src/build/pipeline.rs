//! Build pipeline execution.
//!
//! A full run checks the required tools, cleans, runs every step in order
//! and validates the declared artifacts. Partial runs (one phase, one group
//! or named steps) only check tools and run the selected steps, since the
//! artifacts of unselected steps are expected to be missing.

use crate::build::error::BuildError;
use crate::process::handle::resolve_program;
use crate::process::{ProcessCommand, ProcessHandle, TerminationSignal, WaitOutcome};
use chrono::Utc;
use lk_protocol::build_models::{
    BuildPhase, BuildPipelineConfig, BuildStep, BuildSummary, StepReport, StepStatus,
};
use lk_protocol::ipc::Event;
use lk_protocol::process_models::ExitInfo;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long a requirement's version command may take.
const REQUIREMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a cancelled step gets between SIGTERM and SIGKILL.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Which steps a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Every step, plus clean and validation.
    #[default]
    All,
    Phase(BuildPhase),
    Group(String),
    Steps(Vec<String>),
}

impl Selection {
    pub fn includes(&self, step: &BuildStep) -> bool {
        match self {
            Self::All => true,
            Self::Phase(phase) => step.phase == *phase,
            Self::Group(group) => step.group.as_deref() == Some(group.as_str()),
            Self::Steps(names) => names.iter().any(|name| *name == step.name),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// A finished run: the summary is always available, the error only on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub summary: BuildSummary,
    pub error: Option<BuildError>,
}

impl BuildReport {
    pub fn into_result(self) -> Result<BuildSummary, BuildError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.summary),
        }
    }
}

/// Runs the steps of a [`BuildPipelineConfig`].
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    config: BuildPipelineConfig,
    project_root: PathBuf,
    output_lines: usize,
    cancel: CancellationToken,
}

impl BuildPipeline {
    /// Create a pipeline whose relative paths resolve against `project_root`.
    pub fn new(config: BuildPipelineConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
            output_lines: 200,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the run.
    ///
    /// The running step is terminated, and every later step is skipped.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Number of output lines kept per step for failure reports.
    pub fn with_output_lines(mut self, lines: usize) -> Self {
        self.output_lines = lines;
        self
    }

    pub fn config(&self) -> &BuildPipelineConfig {
        &self.config
    }

    /// Execute the pipeline.
    ///
    /// This is the main entry point. It:
    /// 1. Checks the declared tool requirements
    /// 2. Cleans the configured directories (full runs only)
    /// 3. Runs every selected step in order, stopping at the first failed
    ///    required step
    /// 4. Validates the declared artifacts (full runs only, even after an
    ///    abort, so the summary shows what is missing)
    ///
    /// # Arguments
    ///
    /// * `selection` - Which steps to run
    /// * `events_tx` - Channel for step and output events
    pub async fn run(&self, selection: &Selection, events_tx: UnboundedSender<Event>) -> BuildReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut summary = BuildSummary {
            started_at,
            elapsed_ms: 0,
            steps: Vec::new(),
            warnings: Vec::new(),
            artifacts: Vec::new(),
            missing_artifacts: Vec::new(),
            failure: None,
        };

        let mut error = self.check_selection(selection).err();
        if error.is_none() {
            error = self.check_requirements(&events_tx).await.err();
        }

        if error.is_none() {
            if selection.is_full() {
                summary.warnings.extend(self.clean().await);
            }

            let total = self.config.steps.len();
            for (index, step) in self.config.steps.iter().enumerate() {
                if error.is_none() && self.cancel.is_cancelled() {
                    error = Some(BuildError::Cancelled);
                }
                if let Some(error) = &error {
                    let why = match error {
                        BuildError::Cancelled => "not run after cancellation",
                        _ => "not run after an earlier failure",
                    };
                    summary.steps.push(skipped(step, why));
                    continue;
                }
                if !selection.includes(step) {
                    summary.steps.push(skipped(step, "not selected"));
                    continue;
                }

                let _ = events_tx.send(Event::BuildStepStarted {
                    step: step.name.clone(),
                    index,
                    total,
                });
                let (report, failure) = self.run_step(step, &events_tx).await;
                if report.status == StepStatus::Warning {
                    summary.warnings.push(format!(
                        "{}: {}",
                        step.name,
                        report.message.as_deref().unwrap_or("failed")
                    ));
                }
                let _ = events_tx.send(Event::BuildStepFinished {
                    report: report.clone(),
                });
                summary.steps.push(report);
                error = failure;
            }
        }

        if selection.is_full() {
            let (present, missing) = self.partition_artifacts();
            summary.artifacts = present;
            summary.missing_artifacts = missing.clone();
            if error.is_none() && !missing.is_empty() {
                error = Some(BuildError::Validation { missing });
            }
        }

        summary.failure = error.as_ref().map(ToString::to_string);
        summary.elapsed_ms = clock.elapsed().as_millis() as u64;
        match &error {
            None => info!(elapsed_ms = summary.elapsed_ms, warnings = summary.warnings.len(), "build completed"),
            Some(error) => error!(elapsed_ms = summary.elapsed_ms, %error, "build failed"),
        }
        let _ = events_tx.send(Event::BuildCompleted {
            success: error.is_none(),
        });

        BuildReport { summary, error }
    }

    /// Remove the configured clean directories.
    ///
    /// Returns one warning per path that could not be removed. Paths that
    /// do not exist are not an error.
    pub async fn clean(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for dir in &self.config.clean {
            let path = self.project_root.join(dir);
            match remove_path(&path).await {
                Ok(true) => info!(path = %path.display(), "cleaned"),
                Ok(false) => {}
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to clean");
                    warnings.push(format!("failed to clean {}: {error}", dir.display()));
                }
            }
        }
        warnings
    }

    /// Check the declared artifacts without building anything.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Validation`] listing every missing artifact.
    pub fn validate(&self) -> Result<Vec<PathBuf>, BuildError> {
        let (present, missing) = self.partition_artifacts();
        for artifact in &present {
            info!(artifact = %artifact.display(), "found");
        }
        if missing.is_empty() {
            Ok(present)
        } else {
            for artifact in &missing {
                error!(artifact = %artifact.display(), "missing");
            }
            Err(BuildError::Validation { missing })
        }
    }

    /// Resolve and run every declared tool.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::RequirementsNotMet`] naming every tool that is
    /// missing or exits non-zero.
    pub async fn check_requirements(&self, events_tx: &UnboundedSender<Event>) -> Result<(), BuildError> {
        let mut missing = Vec::new();
        for requirement in &self.config.requirements {
            if resolve_program(&requirement.command, &self.project_root).is_err() {
                error!(tool = %requirement.name, command = %requirement.command, "not found");
                missing.push(requirement.name.clone());
                continue;
            }

            let command = ProcessCommand::new(&requirement.command, &self.project_root)
                .with_args(requirement.args.iter().cloned())
                .with_output_lines(4);
            let ok = match ProcessHandle::spawn(&requirement.name, &command, events_tx.clone()) {
                Ok(handle) => match handle.wait(Some(REQUIREMENT_TIMEOUT)).await {
                    WaitOutcome::Exited(exit) if exit.success() => {
                        let version = handle
                            .diagnostics()
                            .into_iter()
                            .next()
                            .map(|line| line.line)
                            .unwrap_or_default();
                        info!(tool = %requirement.name, version = %version.trim(), "requirement found");
                        true
                    }
                    WaitOutcome::Exited(exit) => {
                        error!(tool = %requirement.name, %exit, "requirement check failed");
                        false
                    }
                    WaitOutcome::TimedOut => {
                        let _ = handle.terminate(TerminationSignal::Forceful);
                        error!(tool = %requirement.name, "requirement check timed out");
                        false
                    }
                },
                Err(error) => {
                    error!(tool = %requirement.name, %error, "requirement check failed");
                    false
                }
            };
            if !ok {
                missing.push(requirement.name.clone());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BuildError::RequirementsNotMet { missing })
        }
    }

    fn check_selection(&self, selection: &Selection) -> Result<(), BuildError> {
        if let Selection::Steps(names) = selection {
            for name in names {
                if !self.config.steps.iter().any(|step| step.name == *name) {
                    return Err(BuildError::UnknownStep { name: name.clone() });
                }
            }
        }
        Ok(())
    }

    async fn run_step(&self, step: &BuildStep, events_tx: &UnboundedSender<Event>) -> (StepReport, Option<BuildError>) {
        info!(step = %step.name, "{}", step.label());
        let started = Instant::now();

        let working_dir = match &step.working_dir {
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.clone(),
        };
        let mut command = ProcessCommand::new(&step.command, working_dir)
            .with_args(step.args.iter().cloned())
            .with_output_lines(self.output_lines);
        command.env.extend(step.env.clone());

        let (exit, reason, diagnostics) = match ProcessHandle::spawn(&step.name, &command, events_tx.clone()) {
            Err(error) => (None, Some(error.to_string()), Vec::new()),
            Ok(handle) => {
                let timeout = step.timeout_secs.map(Duration::from_secs);
                let outcome = tokio::select! {
                    outcome = handle.wait(timeout) => Some(outcome),
                    () = self.cancel.cancelled() => None,
                };
                let Some(outcome) = outcome else {
                    let exit = stop_cancelled(step, &handle).await;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    warn!(step = %step.name, duration_ms, "step cancelled");
                    let report = StepReport {
                        name: step.name.clone(),
                        status: StepStatus::Failed,
                        exit,
                        duration_ms,
                        message: Some("cancelled".to_string()),
                    };
                    return (report, Some(BuildError::Cancelled));
                };
                match outcome {
                    WaitOutcome::Exited(exit) if exit.success() => (Some(exit), None, Vec::new()),
                    WaitOutcome::Exited(exit) => (Some(exit), Some(format!("exited with {exit}")), handle.diagnostics()),
                    WaitOutcome::TimedOut => {
                        warn!(step = %step.name, "step timed out, killing");
                        if let Err(error) = handle.terminate(TerminationSignal::Forceful) {
                            warn!(step = %step.name, %error, "cannot kill step");
                        }
                        let exit = match handle.wait(Some(Duration::from_secs(5))).await {
                            WaitOutcome::Exited(exit) => Some(exit),
                            WaitOutcome::TimedOut => None,
                        };
                        let secs = step.timeout_secs.unwrap_or_default();
                        (exit, Some(format!("timed out after {secs}s")), handle.diagnostics())
                    }
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let Some(reason) = reason else {
            info!(step = %step.name, duration_ms, "step succeeded");
            return (
                StepReport {
                    name: step.name.clone(),
                    status: StepStatus::Succeeded,
                    exit,
                    duration_ms,
                    message: None,
                },
                None,
            );
        };

        if step.required {
            error!(step = %step.name, %reason, "required step failed");
            let report = StepReport {
                name: step.name.clone(),
                status: StepStatus::Failed,
                exit,
                duration_ms,
                message: Some(reason.clone()),
            };
            let failure = BuildError::StepFailed {
                step: step.name.clone(),
                reason,
                exit,
                diagnostics,
            };
            (report, Some(failure))
        } else {
            warn!(step = %step.name, %reason, "optional step failed, continuing");
            (
                StepReport {
                    name: step.name.clone(),
                    status: StepStatus::Warning,
                    exit,
                    duration_ms,
                    message: Some(reason),
                },
                None,
            )
        }
    }

    fn partition_artifacts(&self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        self.config
            .artifacts
            .iter()
            .cloned()
            .partition(|artifact| self.project_root.join(artifact).exists())
    }
}

/// Terminate a cancelled step, escalating to SIGKILL after [`CANCEL_GRACE`].
async fn stop_cancelled(step: &BuildStep, handle: &ProcessHandle) -> Option<ExitInfo> {
    if let Err(error) = handle.terminate(TerminationSignal::Graceful) {
        warn!(step = %step.name, %error, "cannot signal step");
    }
    if let WaitOutcome::Exited(exit) = handle.wait(Some(CANCEL_GRACE)).await {
        return Some(exit);
    }
    warn!(step = %step.name, "step ignored SIGTERM, killing");
    if let Err(error) = handle.terminate(TerminationSignal::Forceful) {
        warn!(step = %step.name, %error, "cannot kill step");
    }
    match handle.wait(Some(CANCEL_GRACE)).await {
        WaitOutcome::Exited(exit) => Some(exit),
        WaitOutcome::TimedOut => None,
    }
}

fn skipped(step: &BuildStep, why: &str) -> StepReport {
    StepReport {
        name: step.name.clone(),
        status: StepStatus::Skipped,
        exit: None,
        duration_ms: 0,
        message: Some(why.to_string()),
    }
}

/// Remove a file or directory tree. `Ok(false)` if nothing was there.
async fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await?;
    } else {
        tokio::fs::remove_file(path).await?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, phase: BuildPhase, group: Option<&str>) -> BuildStep {
        let mut step = BuildStep::new(name, phase, "true");
        step.group = group.map(str::to_string);
        step
    }

    #[test]
    fn test_selection_by_phase_group_and_name() {
        let install = step("install-frontend", BuildPhase::Install, Some("frontend"));
        let backend = step("build-backend", BuildPhase::Compile, Some("backend"));

        assert!(Selection::All.includes(&install));
        assert!(Selection::Phase(BuildPhase::Install).includes(&install));
        assert!(!Selection::Phase(BuildPhase::Install).includes(&backend));
        assert!(Selection::Group("backend".into()).includes(&backend));
        assert!(!Selection::Group("backend".into()).includes(&install));
        assert!(Selection::Steps(vec!["build-backend".into()]).includes(&backend));
        assert!(!Selection::Steps(vec!["build-backend".into()]).includes(&install));
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let config = BuildPipelineConfig {
            steps: vec![step("compile", BuildPhase::Compile, None)],
            ..Default::default()
        };
        let pipeline = BuildPipeline::new(config, ".");
        assert_eq!(
            pipeline.check_selection(&Selection::Steps(vec!["deploy".into()])),
            Err(BuildError::UnknownStep {
                name: "deploy".into()
            })
        );
    }

    #[tokio::test]
    async fn test_remove_path_handles_files_dirs_and_absence() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("dist/assets");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("app.js"), "x").unwrap();
        let file = dir.path().join("stale.log");
        std::fs::write(&file, "x").unwrap();

        assert!(remove_path(&dir.path().join("dist")).await.unwrap());
        assert!(remove_path(&file).await.unwrap());
        assert!(!remove_path(&dir.path().join("never")).await.unwrap());
        assert!(!dir.path().join("dist").exists());
    }
}
