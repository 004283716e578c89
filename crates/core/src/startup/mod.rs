//! Ordered startup of a supervisor session.
//!
//! This module provides:
//! - [`StartupSequencer`]: port, spawn and readiness per role, in order
//! - [`OperatorPrompt`]: the degraded-mode decision for optional roles
//! - [`template`]: `{port}` / `{<role>.url}` placeholder expansion
//! - [`StartupError`]: the single aggregated failure of a sequence

pub mod error;
pub mod prompt;
pub mod sequencer;
pub mod template;

pub use error::{FailureReason, StartupError};
pub use prompt::{AlwaysAbort, AlwaysProceed, Decision, OperatorPrompt};
pub use sequencer::{StartupReport, StartupSequencer};
