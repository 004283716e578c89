//! Sequenced one-shot build pipeline.
//!
//! The pipeline reuses [`crate::process::ProcessHandle`] for every step and
//! publishes the same [`lk_protocol::ipc::Event`] stream as the supervisor,
//! plus build-specific step events.

pub mod error;
pub mod pipeline;

pub use error::BuildError;
pub use pipeline::{BuildPipeline, BuildReport, Selection};
