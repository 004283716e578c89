//! One supervisor run.

use crate::state::process::ManagedProcess;
use lk_protocol::config_models::Mode;
use lk_protocol::ipc::{Event, ShutdownTrigger};
use lk_protocol::process_models::{ProcessRecord, ProcessState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Every managed process of one run, in start order.
///
/// The session is shared (behind an `Arc`) by the startup sequencer, the
/// shutdown coordinator, the signal listener and the supervision loop. It is
/// never global: each run creates its own.
#[derive(Debug)]
pub struct SupervisorSession {
    id: Uuid,
    mode: Mode,
    processes: Mutex<Vec<ManagedProcess>>,
    shutting_down: AtomicBool,
    trigger: StdMutex<Option<ShutdownTrigger>>,
    cancel: CancellationToken,
    events_tx: UnboundedSender<Event>,
}

impl SupervisorSession {
    /// Create a session and announce it on `events_tx`.
    pub fn new(mode: Mode, events_tx: UnboundedSender<Event>) -> Self {
        let id = Uuid::new_v4();
        let _ = events_tx.send(Event::SessionStarted {
            session_id: id,
            mode,
        });
        Self {
            id,
            mode,
            processes: Mutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
            trigger: StdMutex::new(None),
            cancel: CancellationToken::new(),
            events_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn events(&self) -> &UnboundedSender<Event> {
        &self.events_tx
    }

    /// Cancelled as soon as a shutdown is requested.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Claim the shutdown. Only the first caller gets `true`.
    pub(crate) fn begin_shutdown(&self) -> bool {
        self.shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Ask for the session to be torn down.
    ///
    /// Cancels in-flight startup immediately and publishes
    /// [`Event::ShutdownRequested`] for the supervision loop. Requests made
    /// after the shutdown has begun are ignored.
    pub fn request_shutdown(&self, trigger: ShutdownTrigger) {
        if self.is_shutting_down() {
            return;
        }
        info!(session = %self.id, %trigger, "shutdown requested");
        {
            let mut first = self.trigger.lock().unwrap_or_else(|e| e.into_inner());
            first.get_or_insert_with(|| trigger.clone());
        }
        self.cancel.cancel();
        let _ = self.events_tx.send(Event::ShutdownRequested { trigger });
    }

    /// The first trigger passed to [`SupervisorSession::request_shutdown`].
    pub fn requested_trigger(&self) -> Option<ShutdownTrigger> {
        self.trigger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Lock the process list. Mutate records only through
    /// [`crate::state::process`].
    pub async fn processes(&self) -> MutexGuard<'_, Vec<ManagedProcess>> {
        self.processes.lock().await
    }

    /// Append a role in start order.
    pub async fn register(&self, process: ManagedProcess) {
        self.processes.lock().await.push(process);
    }

    /// Copy of every process record, in start order.
    pub async fn snapshot(&self) -> Vec<ProcessRecord> {
        self.processes
            .lock()
            .await
            .iter()
            .map(|p| p.record.clone())
            .collect()
    }

    pub async fn state_of(&self, role: &str) -> Option<ProcessState> {
        self.processes
            .lock()
            .await
            .iter()
            .find(|p| p.role() == role)
            .map(ManagedProcess::state)
    }

    /// Whether `role` is the primary process of this session.
    pub async fn is_primary(&self, role: &str) -> bool {
        self.processes
            .lock()
            .await
            .iter()
            .any(|p| p.primary && p.role() == role)
    }
}
