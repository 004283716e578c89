//! Spawned child process with captured output.
//!
//! A [`ProcessHandle`] owns nothing but channels: the child itself lives in a
//! watcher task that waits for it to exit, and its stdout/stderr are drained
//! by a forwarding task. Both tasks only publish [`Event`]s and write to the
//! process's own output buffer, so they never race with whoever is driving
//! the session.

use crate::process::error::{SignalError, SpawnError};
use crate::process::output::OutputBuffer;
use crate::process::signal::TerminationSignal;
use lk_protocol::ipc::Event;
use lk_protocol::process_models::{ExitInfo, OutputLine, OutputStream};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// How long the watcher waits for output to drain after the child exited.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Everything needed to launch one process.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    /// Program name or path. Relative paths resolve against `working_dir`.
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Overlay merged into the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Number of output lines retained for diagnostics.
    pub output_lines: usize,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            output_lines: 200,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_output_lines(mut self, lines: usize) -> Self {
        self.output_lines = lines;
        self
    }
}

/// Result of waiting on a process with a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(ExitInfo),
    TimedOut,
}

/// Shared reference to one running (or exited) child process.
///
/// Cloning the handle is cheap; every clone observes the same process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    role: String,
    pid: Option<u32>,
    output: Arc<Mutex<OutputBuffer>>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    kill_tx: mpsc::UnboundedSender<()>,
}

impl ProcessHandle {
    /// Spawn `command` for `role`, publishing output and exit on `events_tx`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] carrying the resolved executable path when the
    /// program cannot be found or launched.
    pub fn spawn(
        role: impl Into<String>,
        command: &ProcessCommand,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> Result<Self, SpawnError> {
        let role = role.into();
        let program = resolve_program(&command.program, &command.working_dir)?;

        let mut cmd = Command::new(&program);
        cmd.args(&command.args);
        cmd.current_dir(&command.working_dir);
        cmd.envs(&command.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Launch {
            resolved: program.clone(),
            source,
        })?;
        let pid = child.id();

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(SpawnError::Launch {
                resolved: program,
                source: std::io::Error::other("child stdio was not captured"),
            });
        };

        info!(role = %role, pid, program = %program.display(), "process spawned");
        let _ = events_tx.send(Event::ProcessSpawned {
            role: role.clone(),
            pid,
        });

        let output = Arc::new(Mutex::new(OutputBuffer::new(command.output_lines)));
        let forwarder = tokio::spawn(forward_output(
            role.clone(),
            stdout,
            stderr,
            Arc::clone(&output),
            events_tx.clone(),
        ));

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        tokio::spawn(watch_exit(
            role.clone(),
            child,
            kill_rx,
            forwarder,
            exit_tx,
            events_tx,
        ));

        Ok(Self {
            role,
            pid,
            output,
            exit_rx,
            kill_tx,
        })
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit information, if the process has already terminated.
    pub fn exit_status(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_status().is_some()
    }

    /// Send a termination signal without waiting for the process to react.
    ///
    /// Signalling a process that already exited is a no-op.
    pub fn terminate(&self, signal: TerminationSignal) -> Result<(), SignalError> {
        if self.has_exited() {
            return Ok(());
        }
        debug!(role = %self.role, pid = self.pid, %signal, "sending termination signal");

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::killpg;
            use nix::unistd::Pid;

            let Some(pid) = self.pid else {
                let _ = self.kill_tx.send(());
                return Ok(());
            };
            // The child leads its own process group, so its pgid is its pid.
            match killpg(Pid::from_raw(pid as i32), signal.as_nix()) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(errno) => Err(SignalError::Delivery {
                    pid,
                    reason: errno.desc().to_string(),
                }),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = signal;
            let _ = self.kill_tx.send(());
            Ok(())
        }
    }

    /// Wait for the process to exit, optionally bounded by `timeout`.
    pub async fn wait(&self, timeout: Option<Duration>) -> WaitOutcome {
        let exited = self.exited();
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, exited).await {
                Ok(exit) => WaitOutcome::Exited(exit),
                Err(_) => WaitOutcome::TimedOut,
            },
            None => WaitOutcome::Exited(exited.await),
        }
    }

    /// Future resolving once the process has exited.
    ///
    /// The future does not borrow the handle, so it can be raced against
    /// other work with `tokio::select!`.
    pub fn exited(&self) -> impl Future<Output = ExitInfo> + Send + 'static {
        let mut rx = self.exit_rx.clone();
        async move {
            rx.wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|exit| *exit)
                .unwrap_or(ExitInfo {
                    code: None,
                    signal: None,
                })
        }
    }

    /// The most recent output lines, oldest first.
    pub fn diagnostics(&self) -> Vec<OutputLine> {
        self.output
            .lock()
            .map(|buffer| buffer.snapshot())
            .unwrap_or_else(|poisoned| poisoned.into_inner().snapshot())
    }
}

/// Resolve `program` on `PATH` or relative to `working_dir`.
pub(crate) fn resolve_program(program: &str, working_dir: &Path) -> Result<PathBuf, SpawnError> {
    which::which_in(program, std::env::var_os("PATH"), working_dir).map_err(|_| {
        let candidate = Path::new(program);
        let resolved = if candidate.components().count() > 1 && candidate.is_relative() {
            working_dir.join(candidate)
        } else {
            candidate.to_path_buf()
        };
        SpawnError::NotFound {
            program: program.to_string(),
            resolved,
        }
    })
}

async fn forward_output(
    role: String,
    stdout: ChildStdout,
    stderr: ChildStderr,
    buffer: Arc<Mutex<OutputBuffer>>,
    events_tx: mpsc::UnboundedSender<Event>,
) {
    let stdout = LinesStream::new(BufReader::new(stdout).lines())
        .map(|line| (OutputStream::Stdout, line));
    let stderr = LinesStream::new(BufReader::new(stderr).lines())
        .map(|line| (OutputStream::Stderr, line));
    let mut merged = stdout.merge(stderr);

    while let Some((stream, line)) = merged.next().await {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                debug!(role = %role, %stream, %error, "skipping unreadable output");
                continue;
            }
        };

        match stream {
            OutputStream::Stdout => info!(target: "lk::output", role = %role, %stream, "{line}"),
            OutputStream::Stderr => warn!(target: "lk::output", role = %role, %stream, "{line}"),
        }

        match buffer.lock() {
            Ok(mut buffer) => buffer.push(stream, line.clone()),
            Err(poisoned) => poisoned.into_inner().push(stream, line.clone()),
        }

        let _ = events_tx.send(Event::ProcessOutput {
            role: role.clone(),
            stream,
            line,
        });
    }
}

async fn watch_exit(
    role: String,
    mut child: Child,
    mut kill_rx: mpsc::UnboundedReceiver<()>,
    forwarder: JoinHandle<()>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    events_tx: mpsc::UnboundedSender<Event>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(()) = kill_rx.recv() => {
                if let Err(error) = child.start_kill() {
                    debug!(role = %role, %error, "kill request failed");
                }
            }
        }
    };

    let exit = match status {
        Ok(status) => exit_info(status),
        Err(error) => {
            warn!(role = %role, %error, "failed to collect exit status");
            ExitInfo {
                code: None,
                signal: None,
            }
        }
    };

    // Let the last lines reach the buffer before announcing the exit.
    // Grandchildren may keep the pipes open, so this is bounded.
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, forwarder)
        .await
        .is_err()
    {
        debug!(role = %role, "output still open after exit");
    }

    info!(role = %role, %exit, "process exited");
    let _ = exit_tx.send(Some(exit));
    let _ = events_tx.send(Event::ProcessExited { role, exit });
}

fn exit_info(status: std::process::ExitStatus) -> ExitInfo {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitInfo {
            code: status.code(),
            signal: status.signal(),
        }
    }
    #[cfg(not(unix))]
    {
        ExitInfo {
            code: status.code(),
            signal: None,
        }
    }
}
