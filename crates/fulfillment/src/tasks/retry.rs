//! Retry policies for deferred tasks.

use std::future::Future;
use std::time::Duration;

use super::TaskError;

const DEFAULT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);

/// Delay before a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^retry`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
                base.checked_mul(factor).map_or(max, |d| d.min(max))
            }
        }
    }
}

/// How often and how patiently a task is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// 3 retries, 5 s apart.
    pub fn receipt() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::Fixed(RETRY_BASE_DELAY),
        }
    }

    /// 3 retries, 5 s doubling up to 60 s.
    pub fn shipment() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::Exponential {
                base: RETRY_BASE_DELAY,
                max: RETRY_MAX_DELAY,
            },
        }
    }

    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }
}

/// Runs `attempt` until it succeeds, fails permanently, or the retries run out.
///
/// On failure returns the last error together with the number of attempts made.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    task: &'static str,
    mut attempt: F,
) -> Result<T, (TaskError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TaskError>>,
{
    let mut retry = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retry < policy.max_retries => {
                let delay = policy.backoff.delay(retry);
                tracing::warn!(
                    task,
                    attempt = retry + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "task attempt failed, retrying"
                );
                metrics::counter!("task_retries_total", "task" => task).increment(1);
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) => return Err((e, retry + 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let backoff = RetryPolicy::shipment().backoff;
        let delays: Vec<u64> = (0..5).map(|r| backoff.delay(r).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60]);
        assert_eq!(backoff.delay(40), Duration::from_secs(60));
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = RetryPolicy::receipt().backoff;
        assert_eq!(backoff.delay(0), Duration::from_secs(5));
        assert_eq!(backoff.delay(2), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = &AtomicU32::new(0);
        let result = run_with_retry(&RetryPolicy::shipment(), "test", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(TaskError::Transient("timeout".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(&RetryPolicy::receipt(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::Transient("disk full".into()))
        })
        .await;

        assert_eq!(result, Err((TaskError::Transient("disk full".into()), 4)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_stop_immediately() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(&RetryPolicy::shipment(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::Permanent("400".into()))
        })
        .await;

        assert_eq!(result, Err((TaskError::Permanent("400".into()), 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_grow() {
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = run_with_retry(&RetryPolicy::shipment(), "test", || async {
            Err(TaskError::Transient("503".into()))
        })
        .await;

        // 5 + 10 + 20
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(35), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(36), "{elapsed:?}");
    }
}
