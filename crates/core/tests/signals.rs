//! Integration tests for OS signal handling.
//!
//! Signals are raised at the test process itself, so this file holds a
//! single test to keep it in its own binary.

#![cfg(unix)]

mod common;

use common::*;
use lk_core::shutdown::listen_for_signals;
use lk_protocol::config_models::Mode;
use lk_protocol::ipc::ShutdownTrigger;
use nix::sys::signal::{raise, Signal};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_first_signal_requests_shutdown_and_later_ones_keep_it() {
    let (session, _rx) = new_session(Mode::Development);
    let listener = listen_for_signals(Arc::clone(&session)).unwrap();

    raise(Signal::SIGINT).unwrap();
    tokio::time::timeout(Duration::from_secs(2), session.cancellation().cancelled())
        .await
        .expect("SIGINT should request a shutdown");

    raise(Signal::SIGTERM).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        session.requested_trigger(),
        Some(ShutdownTrigger::Signal {
            name: "SIGINT".to_string()
        })
    );
    assert!(!listener.is_finished(), "listener must outlive the first signal");
    listener.abort();
}
