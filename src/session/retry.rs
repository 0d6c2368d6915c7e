use crate::foundation::error::LyricResult;
use crate::session::cancel::CancelToken;
use std::time::Duration;
use xxhash_rust::xxh3::xxh3_64_with_seed;

const JITTER_SEED: u64 = 0x5bd1e9955bd1e995;

/// How transient failures are retried.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles on every further retry.
    pub base_backoff: Duration,
    /// Upper bound for a single backoff.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (0-based).
    ///
    /// Jitter scales the exponential delay into `[0.5, 1.0]` and is derived from `key`, so the
    /// same work item always waits the same amount.
    pub fn backoff(&self, key: u64, retry: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32.checked_shl(retry.min(16)).unwrap_or(u32::MAX))
            .min(self.max_backoff);
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&key.to_le_bytes());
        buf[8..].copy_from_slice(&retry.to_le_bytes());
        let h = xxh3_64_with_seed(&buf, JITTER_SEED);
        let jitter = 0.5 + 0.5 * ((h >> 11) as f64 / (1u64 << 53) as f64);
        exp.mul_f64(jitter)
    }
}

/// A value produced by [`run_with_retry`] and the number of retries it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// Run `f` until it succeeds, fails with a non-transient error, or retries run out.
///
/// `f` receives the 0-based attempt number. Cancellation is checked before every retry.
pub fn run_with_retry<T>(
    policy: &RetryPolicy,
    key: u64,
    cancel: &CancelToken,
    mut f: impl FnMut(u32) -> LyricResult<T>,
) -> LyricResult<Retried<T>> {
    let mut attempt = 0u32;
    loop {
        match f(attempt) {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    retries: attempt,
                });
            }
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let wait = policy.backoff(key, attempt);
                tracing::debug!(attempt, ?wait, error = %e, "retrying after transient failure");
                cancel.check()?;
                std::thread::sleep(wait);
                cancel.check()?;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(attempts = attempt + 1, error = %e, "giving up after retries");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/retry.rs"]
mod tests;
