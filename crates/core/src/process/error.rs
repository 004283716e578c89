//! Error types for process spawning and signalling.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The executable could not be started.
#[derive(Error, Debug)]
pub enum SpawnError {
    /// Nothing executable was found for the requested program.
    #[error("executable '{program}' not found (looked for {resolved:?})")]
    NotFound { program: String, resolved: PathBuf },

    /// The executable exists but the OS refused to launch it.
    #[error("failed to launch {resolved:?}: {source}")]
    Launch {
        resolved: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// The executable path the spawn attempt resolved to.
    pub fn resolved_path(&self) -> &Path {
        match self {
            SpawnError::NotFound { resolved, .. } | SpawnError::Launch { resolved, .. } => resolved,
        }
    }
}

/// A termination signal could not be delivered.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("failed to signal process group {pid}: {reason}")]
    Delivery { pid: u32, reason: String },
}
