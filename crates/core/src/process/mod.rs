//! Spawning and controlling one external process.
//!
//! This module provides:
//! - [`ProcessHandle`]: a spawned child with captured output, termination and
//!   exit observation
//! - [`OutputBuffer`]: the bounded ring of recent output lines used for
//!   failure diagnostics
//! - [`SpawnError`] / [`SignalError`]: launch and signal delivery failures

pub mod error;
pub mod handle;
pub mod output;
pub mod signal;

pub use error::{SignalError, SpawnError};
pub use handle::{ProcessCommand, ProcessHandle, WaitOutcome};
pub use output::OutputBuffer;
pub use signal::TerminationSignal;
