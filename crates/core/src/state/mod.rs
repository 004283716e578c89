//! State management for a supervisor run.
//!
//! - [`session`]: the [`SupervisorSession`] that owns every managed process
//! - [`process`]: the transition functions that move a process through its
//!   lifecycle and publish the change

pub mod process;
pub mod session;

pub use process::{ManagedProcess, StateError};
pub use session::SupervisorSession;
