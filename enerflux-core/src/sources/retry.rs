//! Bounded exponential backoff for transient provider failures.
//!
//! Only `SourceError::Transient` is retried. Waits double from the base delay
//! and are capped; with the defaults the schedule is 2s then 4s across three
//! total attempts. Cancellation is cooperative: a deadline is honored at retry
//! boundaries, never mid-request.

use std::time::{Duration, Instant};

use super::provider::SourceError;

/// Retry schedule for a single adapter request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt cap and the default delays.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Backoff before the given attempt (attempts are 1-based; the first has none).
    fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow((attempt - 2).min(16)));
        exp.min(self.max_delay)
    }

    /// Run `op` under this policy.
    ///
    /// `op` receives the 1-based attempt number. Transient errors are retried
    /// until the attempt cap or the deadline; everything else propagates on
    /// the spot.
    pub fn run<T, F>(&self, deadline: Option<Instant>, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut(u32) -> Result<T, SourceError>,
    {
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.delay_before(attempt);
                if let Some(dl) = deadline {
                    if Instant::now() + delay >= dl {
                        tracing::warn!(attempt, "deadline reached; abandoning retries");
                        return Err(SourceError::RetriesExhausted {
                            attempts: attempt - 1,
                            last,
                        });
                    }
                }
                tracing::debug!(attempt, ?delay, "retrying after backoff");
                std::thread::sleep(delay);
            }

            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    tracing::warn!(attempt, %err, "transient failure");
                    last = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }

        Err(SourceError::RetriesExhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}
