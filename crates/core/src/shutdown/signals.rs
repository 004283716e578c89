//! OS signal handling.

use crate::state::SupervisorSession;
use lk_protocol::ipc::ShutdownTrigger;
use std::io;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Turn SIGINT, SIGTERM and SIGQUIT into shutdown requests on `session`.
///
/// The first signal requests the shutdown. Later ones are logged and
/// otherwise ignored while that shutdown runs. The listener keeps running
/// until its task is aborted.
///
/// # Errors
///
/// Fails if a signal handler cannot be registered.
pub fn listen_for_signals(session: Arc<SupervisorSession>) -> io::Result<JoinHandle<()>> {
    let mut signals = SignalStream::install()?;

    Ok(tokio::spawn(async move {
        loop {
            let name = signals.recv().await;
            if session.cancellation().is_cancelled() || session.is_shutting_down() {
                warn!(signal = name, "shutdown already in progress");
                continue;
            }
            info!(signal = name, "received signal");
            session.request_shutdown(ShutdownTrigger::Signal {
                name: name.to_string(),
            });
        }
    }))
}

/// Cancel `token` on the first SIGINT, SIGTERM or SIGQUIT.
///
/// For work that runs without a supervisor session, like a build.
///
/// # Errors
///
/// Fails if a signal handler cannot be registered.
pub fn cancel_on_signal(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    let mut signals = SignalStream::install()?;

    Ok(tokio::spawn(async move {
        loop {
            let name = signals.recv().await;
            if token.is_cancelled() {
                warn!(signal = name, "cancellation already in progress");
                continue;
            }
            info!(signal = name, "received signal, cancelling");
            token.cancel();
        }
    }))
}

#[cfg(unix)]
struct SignalStream {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalStream {
    fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

#[cfg(not(unix))]
struct SignalStream {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl SignalStream {
    fn install() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        let _ = self.ctrl_c.recv().await;
        "ctrl-c"
    }
}
