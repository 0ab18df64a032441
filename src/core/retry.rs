//! Purpose: Run a fallible operation a bounded number of times with a fixed delay.
//! Exports: `RetryPolicy`, `retry`, `retry_when`.
//! Role: Typed replacement for signature-sniffing retry wrappers.
//! Invariants: `max_retries == 0` is a usage error returned before the first attempt.
//! Invariants: No sleep follows the final attempt.
use std::error::Error as StdError;
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::error::{Error, ErrorKind};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// Retry `op` on every failure. `op` receives the 1-based attempt number.
pub fn retry<T, E, F>(policy: RetryPolicy, op: F) -> Result<T, Error>
where
    E: StdError + Send + Sync + 'static,
    F: FnMut(u32) -> Result<T, E>,
{
    retry_when(policy, |_: &E| true, op)
}

/// Retry `op` while `is_retryable` accepts its error.
///
/// A rejected error ends the loop early and is reported like exhaustion,
/// with the attempt count so far.
pub fn retry_when<T, E, P, F>(policy: RetryPolicy, is_retryable: P, mut op: F) -> Result<T, Error>
where
    E: StdError + Send + Sync + 'static,
    P: Fn(&E) -> bool,
    F: FnMut(u32) -> Result<T, E>,
{
    if policy.max_retries == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("max retries must be at least 1")
            .with_hint("Use --retry 1 or larger."));
    }
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= policy.max_retries || !is_retryable(&err) {
            return Err(Error::new(ErrorKind::Exhausted)
                .with_message(format!("operation failed after {attempt} attempts"))
                .with_index(u64::from(attempt))
                .with_source(err));
        }
        debug!(attempt, delay_ms = policy.delay.as_millis() as u64, error = %err, "retrying");
        thread::sleep(policy.delay);
    }
}
