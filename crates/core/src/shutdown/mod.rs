//! Session teardown.
//!
//! - [`coordinator`]: reverse-order, escalating termination of every live
//!   process
//! - [`signals`]: converts SIGINT/SIGTERM/SIGQUIT into shutdown requests
//!   or cancellation

pub mod coordinator;
pub mod signals;

pub use coordinator::{ShutdownCoordinator, ShutdownOutcome, StopOutcome, StopReport};
pub use signals::{cancel_on_signal, listen_for_signals};
