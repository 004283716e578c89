//! Degraded-mode decisions.

use crate::startup::error::FailureReason;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Continue without the role.
    Proceed,
    /// Fail the whole startup.
    Abort,
}

/// Asked whether startup may continue without an optional role.
///
/// Only consulted for roles marked `optional`, and only for failures where
/// [`FailureReason::is_overridable`] holds.
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    async fn decide(&self, role: &str, reason: FailureReason, detail: &str) -> Decision;
}

/// Never continues. The default for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAbort;

#[async_trait]
impl OperatorPrompt for AlwaysAbort {
    async fn decide(&self, _role: &str, _reason: FailureReason, _detail: &str) -> Decision {
        Decision::Abort
    }
}

/// Always continues in degraded mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysProceed;

#[async_trait]
impl OperatorPrompt for AlwaysProceed {
    async fn decide(&self, _role: &str, _reason: FailureReason, _detail: &str) -> Decision {
        Decision::Proceed
    }
}
