//! Custom assertion helpers for integration tests.

#![allow(dead_code)]

use lk_core::state::SupervisorSession;
use lk_protocol::ipc::Event;
use lk_protocol::process_models::ProcessState;
use std::time::Duration;

/// Assert the current state of `role` in `session`.
pub async fn assert_state(session: &SupervisorSession, role: &str, expected: ProcessState) {
    let actual = session.state_of(role).await;
    assert_eq!(
        actual,
        Some(expected),
        "role '{role}' should be {expected}, is {actual:?}"
    );
}

/// Index of the first event matching `predicate`.
pub fn position(events: &[Event], predicate: impl Fn(&Event) -> bool) -> Option<usize> {
    events.iter().position(predicate)
}

/// Index of the event moving `role` into `state`.
pub fn transition_index(events: &[Event], role: &str, state: ProcessState) -> Option<usize> {
    position(events, |e| {
        matches!(e, Event::ProcessStateChanged { role: r, to, .. } if r == role && *to == state)
    })
}

/// Index of the spawn event for `role`.
pub fn spawn_index(events: &[Event], role: &str) -> Option<usize> {
    position(events, |e| matches!(e, Event::ProcessSpawned { role: r, .. } if r == role))
}

/// Count events matching `predicate`.
pub fn count(events: &[Event], predicate: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}

/// Wait until `role` has printed a line equal to `line`.
pub async fn wait_for_line(session: &SupervisorSession, role: &str, line: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let found = {
            let processes = session.processes().await;
            processes
                .iter()
                .find(|p| p.role() == role)
                .and_then(|p| p.handle.as_ref())
                .is_some_and(|h| h.diagnostics().iter().any(|l| l.line == line))
        };
        if found {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "role '{role}' never printed '{line}'"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Assert that a string contains a substring (case-insensitive).
pub fn assert_contains_ci(haystack: &str, needle: &str) {
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    assert!(
        haystack_lower.contains(&needle_lower),
        "Expected '{}' to contain '{}' (case-insensitive)",
        haystack,
        needle
    );
}
