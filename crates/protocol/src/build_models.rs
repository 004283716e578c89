//! Build pipeline models for `.lifecycle/build.yaml`.
//!
//! This module defines the structure of the build definition file and the
//! summary produced after a pipeline run.

use crate::process_models::ExitInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Coarse phase a build step belongs to, selectable on the command line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    /// Dependency installation.
    Install,

    /// Asset and executable compilation.
    Compile,

    /// Packaging of the distributable.
    Package,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => f.write_str("install"),
            Self::Compile => f.write_str("compile"),
            Self::Package => f.write_str("package"),
        }
    }
}

impl FromStr for BuildPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "install" => Ok(Self::Install),
            "compile" => Ok(Self::Compile),
            "package" => Ok(Self::Package),
            other => Err(format!("unknown build phase '{other}'")),
        }
    }
}

/// A tool that must be present before the build starts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
    /// Display name, e.g. `Node.js`.
    pub name: String,

    /// Executable to resolve on `PATH`.
    pub command: String,

    /// Arguments for the version check, e.g. `["--version"]`.
    #[serde(default)]
    pub args: Vec<String>,
}

/// One named step of the build pipeline.
///
/// Steps are executed in declaration order. Every step must be safe to
/// re-run on its own.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BuildStep {
    /// Unique step name, e.g. `install-frontend`.
    pub name: String,

    /// What the step does, printed while it runs.
    #[serde(default)]
    pub description: String,

    /// Phase used by `--phase` selection.
    pub phase: BuildPhase,

    /// Optional group used by `--group` selection, e.g. `backend`.
    #[serde(default)]
    pub group: Option<String>,

    /// Executable to run.
    pub command: String,

    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory, relative to the project root.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Environment overlay for this step only.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// A failing required step aborts the pipeline; otherwise it is a warning.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Kill the step and treat it as failed after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_required() -> bool {
    true
}

impl BuildStep {
    /// A required step with no arguments.
    pub fn new(name: impl Into<String>, phase: BuildPhase, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            phase,
            group: None,
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            required: true,
            timeout_secs: None,
        }
    }

    /// Description if set, otherwise the step name.
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }
}

/// Contents of `.lifecycle/build.yaml`.
///
/// # Example
///
/// ```yaml
/// requirements:
///   - name: Node.js
///     command: node
///     args: ["--version"]
/// clean:
///   - dist
/// steps:
///   - name: install-frontend
///     phase: install
///     group: frontend
///     command: npm
///     args: ["ci"]
/// artifacts:
///   - dist/index.html
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildPipelineConfig {
    /// Tools checked before any step runs.
    #[serde(default)]
    pub requirements: Vec<ToolRequirement>,

    /// Directories removed by the clean phase.
    #[serde(default)]
    pub clean: Vec<PathBuf>,

    /// Ordered build steps.
    #[serde(default)]
    pub steps: Vec<BuildStep>,

    /// Files that must exist once the build is done.
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
}

/// How a single step ended.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Succeeded,
    /// A non-required step failed; the pipeline continued.
    Warning,
    /// A required step failed; the pipeline stopped here.
    Failed,
    /// Not selected, or not reached after an abort.
    Skipped,
}

/// Result of running one step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub exit: Option<ExitInfo>,
    pub duration_ms: u64,
    pub message: Option<String>,
}

/// Pass/fail summary of a pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub steps: Vec<StepReport>,
    /// Non-fatal problems: failed optional steps, clean failures.
    pub warnings: Vec<String>,
    /// Artifacts found by the validation pass.
    pub artifacts: Vec<PathBuf>,
    /// Artifacts the validation pass could not find.
    pub missing_artifacts: Vec<PathBuf>,
    /// The fatal error that ended the run, if any.
    pub failure: Option<String>,
}

impl BuildSummary {
    /// Whether no fatal error occurred and every artifact is present.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.missing_artifacts.is_empty()
    }

    /// Reports for steps with the given status.
    pub fn steps_with(&self, status: StepStatus) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(move |step| step.status == status)
    }
}
