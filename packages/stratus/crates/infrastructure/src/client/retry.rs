use domain::error::{Result, SynthError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backend error codes that signal throttling or a flaky network.
pub const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "ProvisionedThroughputExceededException",
    "SlowDown",
    "RequestTimeout",
    "ServiceUnavailable",
    "NetworkingError",
    "TimeoutError",
    "ECONNRESET",
];

pub fn is_transient(err: &SynthError) -> bool {
    match err {
        SynthError::Backend {
            code, retryable, ..
        } => *retryable || TRANSIENT_CODES.contains(&code.as_str()),
        _ => false,
    }
}

/// Exponential backoff with full jitter.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Upper bound of the wait after `attempt` (0-indexed) failed.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_for_attempt(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let ms = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
        Duration::from_millis(ms)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts run out.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && attempt + 1 < self.max_attempts => {
                    let delay = self.delay(attempt);
                    warn!(
                        "{} failed ({}), retrying in {:?} (attempt {}/{})",
                        label,
                        err,
                        delay,
                        attempt + 1,
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(150));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(225));
    }

    #[test]
    fn test_backoff_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for_attempt(20), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_under_ceiling() {
        let policy = RetryPolicy::default();
        for attempt in 0..10 {
            assert!(policy.delay(attempt) <= policy.backoff_for_attempt(attempt));
        }
    }

    #[test]
    fn test_classification() {
        assert!(is_transient(&SynthError::backend("ThrottlingException", "slow down")));
        assert!(is_transient(&SynthError::transient("Custom", "flaky")));
        assert!(!is_transient(&SynthError::backend("AccessDenied", "no")));
        assert!(!is_transient(&SynthError::not_found("zone", "example.com")));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = quick()
            .execute("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SynthError::backend("Throttling", "rate exceeded"))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = quick()
            .execute("denied", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SynthError::backend("AccessDenied", "no"))
            })
            .await;
        assert_eq!(result.unwrap_err().backend_code(), Some("AccessDenied"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = quick()
            .execute("throttled", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SynthError::backend("SlowDown", "again"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
