//! Test fixtures for creating sample configurations and test data.

#![allow(dead_code)]

use lk_core::state::SupervisorSession;
use lk_protocol::config_models::{Mode, RoleConfig, SupervisorSettings};
use lk_protocol::health_models::HealthConfig;
use lk_protocol::ipc::Event;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A role running `sh -c <script>`.
pub fn sh_role(name: &str, script: &str) -> RoleConfig {
    let mut role = RoleConfig::new(name, "sh");
    role.args = vec!["-c".to_string(), script.to_string()];
    role
}

/// A role that idles until signalled.
pub fn sleeper(name: &str) -> RoleConfig {
    sh_role(name, "exec sleep 30")
}

/// A role that ignores SIGTERM and prints `ready` once the trap is set.
pub fn stubborn(name: &str) -> RoleConfig {
    sh_role(name, "trap '' TERM; echo ready; exec sleep 30")
}

/// Supervisor settings with short timeouts suitable for tests.
pub fn fast_settings() -> SupervisorSettings {
    SupervisorSettings {
        grace_period_ms: 2_000,
        kill_timeout_ms: 2_000,
        output_buffer_lines: 50,
        port_attempts: 20,
    }
}

/// Health config polling `port` quickly.
pub fn fast_health(port: u16, max_attempts: u32) -> HealthConfig {
    HealthConfig {
        host: Some("127.0.0.1".to_string()),
        port: Some(port),
        path: "/health".to_string(),
        expected_status: 200,
        attempt_timeout_ms: 200,
        max_attempts,
        interval_ms: 50,
    }
}

/// A session plus the receiving end of its event channel.
pub fn new_session(mode: Mode) -> (Arc<SupervisorSession>, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(SupervisorSession::new(mode, tx)), rx)
}

/// Everything currently queued on `rx`.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// A port with nothing listening on it (at the time of the call).
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Minimal HTTP server answering with scripted status codes.
pub struct Responder {
    pub port: u16,
    hits: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl Responder {
    /// Answer with `script` in order, then `then` forever.
    pub async fn start(script: &[u16], then: u16) -> Self {
        Self::start_with_delay(script, then, Duration::ZERO).await
    }

    /// Like [`Responder::start`], waiting `delay` before every answer.
    pub async fn start_with_delay(script: &[u16], then: u16, delay: Duration) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hits = Arc::new(AtomicU32::new(0));
        let script = Arc::new(Mutex::new(script.iter().copied().collect::<VecDeque<_>>()));

        let counter = Arc::clone(&hits);
        let task = tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let status = script.lock().unwrap().pop_front().unwrap_or(then);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {status} Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { port, hits, task }
    }

    /// Number of connections accepted so far.
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A listener that answers every connection with non-HTTP bytes.
pub async fn garbage_server() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await;
        }
    });
    (port, task)
}

/// Write a `.lifecycle/` project into a fresh temp directory.
pub fn create_test_project(config_toml: &str, build_yaml: &str) -> std::io::Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    let lk_dir = dir.path().join(".lifecycle");
    std::fs::create_dir_all(&lk_dir)?;
    if !config_toml.is_empty() {
        std::fs::write(lk_dir.join("config.toml"), config_toml)?;
    }
    if !build_yaml.is_empty() {
        std::fs::write(lk_dir.join("build.yaml"), build_yaml)?;
    }
    Ok(dir)
}
