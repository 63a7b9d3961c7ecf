// SPDX-License-Identifier: MIT
//! Quadratic backoff retry for report delivery and the auth handshake.
//!
//! Unlike a result-driven retry loop, this driver is keyed on the HTTP
//! status of the response: the operation "succeeding" at the transport
//! level with a retryable status still earns another attempt, and the
//! final response is handed back to the caller for its own status check.
//!
//! # Example
//! ```rust,ignore
//! use faultline::backoff::{run, BackoffPolicy};
//!
//! let response = run(&BackoffPolicy::default(), || async {
//!     transport.post_report(&url, &bearer, &report).await
//! })
//! .await?;
//! if response.status_code() >= 300 { /* cache for later */ }
//! ```

use std::time::Duration;
use tracing::{debug, warn};

/// Anything carrying an HTTP-ish numeric status.
pub trait StatusCarrier {
    fn status_code(&self) -> u16;
}

/// Configuration for [`run`].
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Maximum number of retries after the initial attempt.
    ///
    /// Default: 10 (so a permanently failing operation runs 11 times).
    pub max_retries: u32,
    /// Unit delay; retry *n* waits `base_delay * n²`.
    ///
    /// Default: 100 ms, giving 100 ms, 400 ms, 900 ms, … 10 s.
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl BackoffPolicy {
    /// A policy with no waiting, for unit tests that only count attempts.
    pub fn instant() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry `n` (1-based): `base_delay * n²`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * (retry * retry)
    }

    /// Whether a status earns another attempt.
    ///
    /// The threshold is strictly `> 401`: 402+ retries, while 401 itself
    /// returns immediately. Inherited verbatim from the original client,
    /// where it reads like an off-by-one ("unauthorized" is arguably worth
    /// a retry after re-auth, 4xx below it arguably not) — kept as the
    /// documented contract rather than silently corrected.
    pub fn is_retryable(&self, status: u16) -> bool {
        status > 401
    }
}

/// Drive `op` until it returns a non-retryable status or the retry budget
/// is exhausted, sleeping the quadratic schedule between attempts.
///
/// Returns the LAST response received, whatever its status — the caller
/// re-checks. `Err` only when `op` itself errors (the transport rejected);
/// a non-retryable failure status is a normal return, not an error.
pub async fn run<F, Fut, T, E>(policy: &BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    T: StatusCarrier,
    E: std::fmt::Debug,
{
    let mut response = op().await?;
    let mut retry = 0;

    while policy.is_retryable(response.status_code()) && retry < policy.max_retries {
        retry += 1;
        let delay = policy.delay_for(retry);
        warn!(
            status = response.status_code(),
            retry,
            max = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            "retryable status — backing off"
        );
        tokio::time::sleep(delay).await;
        response = op().await?;
    }

    if retry > 0 && !policy.is_retryable(response.status_code()) {
        debug!(status = response.status_code(), retry, "backoff settled");
    }
    Ok(response)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Resp(u16);

    impl StatusCarrier for Resp {
        fn status_code(&self) -> u16 {
            self.0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_500_is_attempted_eleven_times() {
        let policy = BackoffPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let last: Result<Resp, String> = run(&policy, || {
            let c = calls2.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Ok(Resp(500))
            }
        })
        .await;

        assert_eq!(last.unwrap().status_code(), 500);
        assert_eq!(calls.load(Ordering::Relaxed), 11);
    }

    #[tokio::test]
    async fn status_401_returns_immediately_without_retry() {
        let policy = BackoffPolicy::instant();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let last: Result<Resp, String> = run(&policy, || {
            let c = calls2.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Ok(Resp(401))
            }
        })
        .await;

        assert_eq!(last.unwrap().status_code(), 401);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn status_402_is_retried() {
        let policy = BackoffPolicy::instant();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let _: Result<Resp, String> = run(&policy, || {
            let c = calls2.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Ok(Resp(402))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::Relaxed), 11);
    }

    #[tokio::test]
    async fn success_status_is_not_retried() {
        let policy = BackoffPolicy::instant();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let last: Result<Resp, String> = run(&policy, || {
            let c = calls2.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Ok(Resp(200))
            }
        })
        .await;

        assert_eq!(last.unwrap().status_code(), 200);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn recovery_mid_sequence_returns_the_ok_response() {
        let policy = BackoffPolicy::instant();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let last: Result<Resp, String> = run(&policy, || {
            let c = calls2.clone();
            async move {
                let n = c.fetch_add(1, Ordering::Relaxed) + 1;
                Ok(if n < 3 { Resp(503) } else { Resp(200) })
            }
        })
        .await;

        assert_eq!(last.unwrap().status_code(), 200);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let policy = BackoffPolicy::instant();
        let result: Result<Resp, String> =
            run(&policy, || async { Err("connection refused".to_string()) }).await;
        assert_eq!(result.unwrap_err(), "connection refused");
    }

    #[test]
    fn delay_schedule_is_quadratic() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(900));
        assert_eq!(policy.delay_for(10), Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn total_backoff_time_matches_the_schedule() {
        // Σ 100·n² for n = 1..10 is 38 500 ms.
        let policy = BackoffPolicy::default();
        let start = tokio::time::Instant::now();

        let _: Result<Resp, String> = run(&policy, || async { Ok(Resp(500)) }).await;

        assert_eq!(start.elapsed(), Duration::from_millis(38_500));
    }
}
