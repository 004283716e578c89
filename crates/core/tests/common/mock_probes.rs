//! Mock probes and prompts for deterministic testing.

#![allow(dead_code)]

use async_trait::async_trait;
use lk_core::health::HealthProbe;
use lk_core::startup::{Decision, FailureReason, OperatorPrompt};
use lk_protocol::health_models::HealthCheckSpec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Reports ready from the given attempt on; never if `None`.
pub struct CountingProbe {
    ready_on: Option<u32>,
    calls: AtomicU32,
}

impl CountingProbe {
    pub fn ready_on(attempt: u32) -> Self {
        Self {
            ready_on: Some(attempt),
            calls: AtomicU32::new(0),
        }
    }

    pub fn never() -> Self {
        Self {
            ready_on: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for CountingProbe {
    async fn check(&self, _spec: &HealthCheckSpec) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.ready_on.is_some_and(|n| call >= n)
    }
}

/// Answers every prompt with a fixed decision and remembers the questions.
pub struct RecordingPrompt {
    decision: Decision,
    asked: Mutex<Vec<(String, FailureReason)>>,
}

impl RecordingPrompt {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<(String, FailureReason)> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperatorPrompt for RecordingPrompt {
    async fn decide(&self, role: &str, reason: FailureReason, _detail: &str) -> Decision {
        self.asked.lock().unwrap().push((role.to_string(), reason));
        self.decision
    }
}

/// Ready on the first attempt.
pub struct AlwaysReady;

#[async_trait]
impl HealthProbe for AlwaysReady {
    async fn check(&self, _spec: &HealthCheckSpec) -> bool {
        true
    }
}

/// Never answers, like an operator who walked away.
pub struct PendingPrompt;

#[async_trait]
impl OperatorPrompt for PendingPrompt {
    async fn decide(&self, _role: &str, _reason: FailureReason, _detail: &str) -> Decision {
        std::future::pending().await
    }
}
