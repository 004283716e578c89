//! Local port negotiation.
//!
//! [`PortNegotiator::reserve`] walks upward from a preferred port until a
//! probe listener binds. The probe is released before the port is handed to
//! the process that will use it, so another program can still grab the port
//! in between. That race is accepted: the window is a few milliseconds and
//! the consuming process fails loudly (and is reported as a startup failure)
//! if it loses.

use lk_protocol::port_models::PortBinding;
use std::io;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Default number of consecutive ports tried before giving up.
pub const DEFAULT_PORT_ATTEMPTS: u16 = 100;

#[derive(Error, Debug)]
pub enum PortError {
    /// Binding failed for a reason other than the port being taken.
    #[error("cannot bind {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Every candidate port was in use.
    #[error("no free port on {host} in {first}..={last}")]
    Exhausted { host: String, first: u16, last: u16 },
}

/// Finds a free local port at or above a preferred value.
#[derive(Debug, Clone, Copy)]
pub struct PortNegotiator {
    attempts: u16,
}

impl Default for PortNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_PORT_ATTEMPTS)
    }
}

impl PortNegotiator {
    /// A negotiator that tries at most `attempts` ports (at least one).
    pub fn new(attempts: u16) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    /// Reserve the first bindable port in `preferred..preferred + attempts`.
    ///
    /// # Errors
    ///
    /// - [`PortError::Exhausted`] if every candidate is in use, including
    ///   when the range would run past 65535.
    /// - [`PortError::Bind`] for any other bind failure (for example an
    ///   unknown host or insufficient permissions).
    pub async fn reserve(&self, host: &str, preferred: u16) -> Result<PortBinding, PortError> {
        let mut last = preferred;
        for offset in 0..self.attempts {
            let Some(port) = preferred.checked_add(offset) else {
                break;
            };
            last = port;

            match TcpListener::bind((host, port)).await {
                Ok(listener) => {
                    drop(listener);
                    if port != preferred {
                        info!(host, requested = preferred, port, "preferred port busy, relocated");
                    }
                    return Ok(PortBinding {
                        requested: preferred,
                        port,
                        host: host.to_string(),
                    });
                }
                Err(error) if error.kind() == io::ErrorKind::AddrInUse => {
                    debug!(host, port, "port in use");
                }
                Err(source) => {
                    return Err(PortError::Bind {
                        host: host.to_string(),
                        port,
                        source,
                    });
                }
            }
        }

        Err(PortError::Exhausted {
            host: host.to_string(),
            first: preferred,
            last,
        })
    }
}
