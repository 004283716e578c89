//! Termination signals sent to managed processes.

use std::fmt;

/// First-attempt cooperative termination vs. unconditional kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGTERM on unix.
    Graceful,

    /// SIGKILL on unix.
    Forceful,
}

impl TerminationSignal {
    #[cfg(unix)]
    pub(crate) fn as_nix(self) -> nix::sys::signal::Signal {
        match self {
            TerminationSignal::Graceful => nix::sys::signal::Signal::SIGTERM,
            TerminationSignal::Forceful => nix::sys::signal::Signal::SIGKILL,
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful => f.write_str("SIGTERM"),
            Self::Forceful => f.write_str("SIGKILL"),
        }
    }
}
