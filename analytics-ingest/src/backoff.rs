use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy for startup operations.
///
/// - max_attempts: total tries, including the first one
/// - initial_delay: delay after the first failure
/// - multiplier: growth factor per attempt (1.0 gives a fixed delay)
/// - max_delay: cap for the computed delay
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    pub fn next_delay(&self, attempt: u32) -> Duration {
        let pow = self.multiplier.powi(attempt as i32);
        let scaled = if pow.is_finite() {
            self.initial_delay.mul_f64(pow)
        } else {
            self.max_delay
        };
        scaled.min(self.max_delay)
    }
}

/// Run `op` until it succeeds or the policy runs out of attempts, returning the
/// last error in that case.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = policy.next_delay(attempt - 1);
                warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "{what} attempt {attempt} failed, retrying in {}s",
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn immediate(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO, 1.0, Duration::ZERO)
    }

    #[test]
    fn test_fixed_policy() {
        let p = RetryPolicy::new(10, Duration::from_secs(2), 1.0, Duration::from_secs(30));
        assert_eq!(p.max_attempts, 10);
        for attempt in [0, 1, 5, 9] {
            assert_eq!(p.next_delay(attempt).as_secs(), 2, "attempt {attempt}");
        }
    }

    #[test]
    fn test_exponential_progression_and_cap() {
        let p = RetryPolicy::new(5, Duration::from_secs(1), 2.0, Duration::from_secs(10));
        let cases = vec![
            (0, 1),
            (1, 2),
            (2, 4),
            (3, 8),
            (4, 10), // 16 capped to 10
            (40, 10),
        ];
        for (attempt, expected_secs) in cases {
            assert_eq!(p.next_delay(attempt).as_secs(), expected_secs, "attempt {attempt}");
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let policy = immediate(5);
        let calls = Cell::new(0);

        let result: Result<&str, String> = retry(&policy, "connect", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(format!("refused {n}"))
                } else {
                    Ok("connected")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("connected"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let policy = immediate(4);
        let calls = Cell::new(0);

        let result: Result<(), String> = retry(&policy, "connect", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Err(format!("refused {n}")) }
        })
        .await;

        assert_eq!(result, Err("refused 4".to_string()));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let policy = immediate(0);
        let calls = Cell::new(0);

        let result: Result<(), &str> = retry(&policy, "connect", || {
            calls.set(calls.get() + 1);
            async { Err("refused") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
