use std::time::Duration;

/// Exponential backoff policy for opening hardware that may still be settling
/// (a camera node that appears a moment after hotplug, a device held by another
/// process).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles each attempt).
    pub base_delay: Duration,
    /// Backoff never exceeds this.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// Run `f` until it succeeds or the attempts are exhausted, sleeping the
    /// calling thread between attempts. Returns the last error.
    pub fn run<F, T, E>(&self, mut f: F, operation_name: &str) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match f() {
                Ok(result) => return Ok(result),
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        operation = operation_name,
                        attempts,
                        error = %e,
                        "Operation failed, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_micros(10),
            max_delay: Duration::from_micros(40),
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = fast();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_micros(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_micros(20));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_micros(40));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_micros(40));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_micros(40));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result: Result<u32, String> = fast().run(
            || {
                calls += 1;
                if calls < 3 { Err("busy".to_string()) } else { Ok(calls) }
            },
            "open",
        );
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn returns_last_error_when_exhausted() {
        let mut calls = 0;
        let result: Result<(), String> = fast().run(
            || {
                calls += 1;
                Err(format!("attempt {calls}"))
            },
            "open",
        );
        assert_eq!(result, Err("attempt 4".to_string()));
        assert_eq!(calls, 4);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..fast()
        };
        let mut calls = 0;
        let _: Result<(), &str> = policy.run(
            || {
                calls += 1;
                Err("nope")
            },
            "open",
        );
        assert_eq!(calls, 1);
    }
}
