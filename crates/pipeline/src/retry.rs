//! Fixed-backoff retry for model calls
//!
//! Each call site has its own attempt budget. The caller decides what a
//! safe default is once the budget is spent.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rag_eval_config::{JudgeConfig, VerificationConfig};

/// Bounded retry with a constant pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn for_extraction(config: &VerificationConfig) -> Self {
        Self::new(
            config.extraction_attempts,
            Duration::from_millis(config.backoff_ms),
        )
    }

    pub fn for_judge(config: &JudgeConfig) -> Self {
        Self::new(config.attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Run `op` until it succeeds or the attempts are used up
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, site: &'static str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts => {
                    tracing::warn!(site, attempt, error = %e, "Retrying");
                    metrics::counter!("rag_eval_retries_total", "site" => site).increment(1);
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(site, attempts = self.attempts, error = %e, "Attempts exhausted");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = Cell::new(0);

        let result: Result<u32, String> = policy
            .run("test", |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {}", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result: Result<(), String> = policy
            .run("test", |attempt| async move { Err(format!("attempt {}", attempt)) })
            .await;
        assert_eq!(result, Err("attempt 2".to_string()));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    #[test]
    fn test_from_settings() {
        let policy = RetryPolicy::for_extraction(&VerificationConfig::default());
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.backoff, Duration::from_secs(1));

        let policy = RetryPolicy::for_judge(&JudgeConfig::default());
        assert_eq!(policy.attempts, 3);
    }
}
