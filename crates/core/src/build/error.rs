//! Error types for the build pipeline.

use lk_protocol::process_models::{ExitInfo, OutputLine};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A required tool is missing or does not run.
    #[error("build requirements not met: {}", .missing.join(", "))]
    RequirementsNotMet { missing: Vec<String> },

    /// A required step failed; the remaining steps were not run.
    #[error("build step '{step}' failed: {reason}")]
    StepFailed {
        step: String,
        reason: String,
        exit: Option<ExitInfo>,
        /// Last output lines of the step, oldest first.
        diagnostics: Vec<OutputLine>,
    },

    /// Declared artifacts are missing after the build.
    #[error("build validation failed, missing: {}", display_paths(.missing))]
    Validation { missing: Vec<PathBuf> },

    /// `--step` named something the pipeline does not define.
    #[error("unknown build step '{name}'")]
    UnknownStep { name: String },

    /// The run was cancelled, usually by a signal.
    #[error("build cancelled")]
    Cancelled,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
