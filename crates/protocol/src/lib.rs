//! # lk-protocol
//!
//! Core data models and event definitions for lifecycle-kit.
//!
//! This crate defines all shared data structures used for:
//! - Configuration file parsing (`config.toml` roles, `build.yaml` pipelines)
//! - Runtime process state tracking
//! - Events published by the supervisor and the build pipeline
//!
//! ## Modules
//!
//! - [`build_models`]: Build steps, phases and summaries
//! - [`config_models`]: Supervisor settings and role definitions
//! - [`health_models`]: Health check specifications and probe outcomes
//! - [`port_models`]: Port requests and resolved bindings
//! - [`process_models`]: Managed process state and exit information
//! - [`ipc`]: Events emitted by the core and shutdown triggers
//!
//! ## Design Principles
//!
//! - Minimal dependencies: only serde, chrono and uuid
//! - Independent compilation: no dependencies on other lifecycle-kit crates

pub mod build_models;
pub mod config_models;
pub mod health_models;
pub mod ipc;
pub mod port_models;
pub mod process_models;

// Re-export all public types for convenience
pub use build_models::*;
pub use config_models::*;
pub use health_models::*;
pub use ipc::*;
pub use port_models::*;
pub use process_models::*;
