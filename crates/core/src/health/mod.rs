//! Readiness probing for managed processes.
//!
//! A [`HealthProbe`] answers one question per attempt: does the endpoint
//! report the expected status right now? Polling, attempt budgets and the
//! delay between attempts are shared by every implementation through the
//! trait's provided [`HealthProbe::wait_until_ready`].

pub mod http;

pub use http::HttpProbe;

use async_trait::async_trait;
use lk_protocol::health_models::{HealthCheckSpec, ProbeOutcome};
use tracing::debug;

/// Polls a readiness endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Perform a single attempt bounded by `spec.attempt_timeout`.
    ///
    /// Refusal, timeout and unexpected statuses all return `false`; no
    /// single-attempt failure is ever an error.
    async fn check(&self, spec: &HealthCheckSpec) -> bool;

    /// Poll until the endpoint is ready or `spec.max_attempts` is spent.
    async fn wait_until_ready(&self, spec: &HealthCheckSpec) -> ProbeOutcome {
        self.wait_until_ready_observed(spec, &|_, _| {}).await
    }

    /// Like [`HealthProbe::wait_until_ready`], calling `on_attempt` with the
    /// attempt number and its result after every check.
    ///
    /// There is no delay after the final failed attempt.
    async fn wait_until_ready_observed(
        &self,
        spec: &HealthCheckSpec,
        on_attempt: &(dyn Fn(u32, bool) + Send + Sync),
    ) -> ProbeOutcome {
        for attempt in 1..=spec.max_attempts {
            let ready = self.check(spec).await;
            on_attempt(attempt, ready);
            if ready {
                return ProbeOutcome::Ready { attempts: attempt };
            }
            debug!(url = %spec.url(), attempt, max_attempts = spec.max_attempts, "not ready yet");
            if attempt < spec.max_attempts {
                tokio::time::sleep(spec.interval).await;
            }
        }
        ProbeOutcome::TimedOut {
            attempts: spec.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Becomes ready on the given attempt; never if `None`.
    struct Countdown {
        ready_on: Option<u32>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl HealthProbe for Countdown {
        async fn check(&self, _spec: &HealthCheckSpec) -> bool {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.ready_on.is_some_and(|n| call >= n)
        }
    }

    fn spec(max_attempts: u32, interval_ms: u64) -> HealthCheckSpec {
        HealthCheckSpec {
            host: "127.0.0.1".to_string(),
            port: 1,
            path: "/".to_string(),
            expected_status: 200,
            attempt_timeout: Duration::from_millis(50),
            max_attempts,
            interval: Duration::from_millis(interval_ms),
        }
    }

    #[tokio::test]
    async fn test_times_out_after_exactly_max_attempts() {
        let probe = Countdown {
            ready_on: None,
            calls: AtomicU32::new(0),
        };

        let started = Instant::now();
        let outcome = probe.wait_until_ready(&spec(4, 50)).await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, ProbeOutcome::TimedOut { attempts: 4 });
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
        // Three sleeps between four attempts, none after the last.
        assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(195 + 150), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_short_circuits_on_success() {
        let probe = Countdown {
            ready_on: Some(3),
            calls: AtomicU32::new(0),
        };
        let seen = Mutex::new(Vec::new());

        let outcome = probe
            .wait_until_ready_observed(&spec(10, 10), &|attempt, ready| {
                seen.lock().unwrap().push((attempt, ready));
            })
            .await;

        assert_eq!(outcome, ProbeOutcome::Ready { attempts: 3 });
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, false), (2, false), (3, true)]
        );
    }

    #[tokio::test]
    async fn test_zero_attempts_times_out_immediately() {
        let probe = Countdown {
            ready_on: Some(1),
            calls: AtomicU32::new(0),
        };
        let outcome = probe.wait_until_ready(&spec(0, 1000)).await;
        assert_eq!(outcome, ProbeOutcome::TimedOut { attempts: 0 });
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }
}
