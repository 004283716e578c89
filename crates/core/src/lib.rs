//! # lk-core
//!
//! Process lifecycle supervision and build pipeline engine for lifecycle-kit.
//!
//! This crate provides:
//! - Configuration loading from `.lifecycle/` directory
//! - A handle over spawned processes with captured output
//! - Health probing and local port negotiation
//! - Ordered, health-gated startup and reverse-order shutdown
//! - A sequenced build pipeline
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`process`]: Spawning, signalling and observing one process
//! - [`health`]: Readiness probes
//! - [`ports`]: Local port negotiation
//! - [`state`]: Supervisor session and process state transitions
//! - [`startup`]: The startup sequencer
//! - [`shutdown`]: The shutdown coordinator and signal handling
//! - [`supervisor`]: The run loop combining startup, monitoring and shutdown
//! - [`build`]: The build pipeline
//! - [`telemetry`]: Tracing subscriber setup

pub mod build;
pub mod config;
pub mod health;
pub mod ports;
pub mod process;
pub mod shutdown;
pub mod startup;
pub mod state;
pub mod supervisor;
pub mod telemetry;
