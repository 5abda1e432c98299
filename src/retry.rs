use std::fmt::Display;
use std::time::Duration;

use tracing::warn;

/// Exponential backoff with a cap: attempt `n` waits `base_delay * factor^n`,
/// never more than `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.max(1).saturating_pow(attempt);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or the
/// policy runs out of retries. Returns the last error.
pub fn retry_with_backoff<T, E, F, P>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    retryable: P,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && retryable(&e) => {
                let backoff = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}, backing off {:.1}s",
                    label,
                    attempt + 1,
                    policy.max_retries + 1,
                    e,
                    backoff.as_secs_f64()
                );
                if !backoff.is_zero() {
                    std::thread::sleep(backoff);
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
