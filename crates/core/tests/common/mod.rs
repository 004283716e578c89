//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality across all integration tests:
//! - Test fixtures (roles, settings, an in-process HTTP responder)
//! - Custom assertions over sessions and event streams
//! - Mock probes and operator prompts
//! - Helper functions

pub mod assertions;
pub mod fixtures;
pub mod mock_probes;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_probes::*;
