//! Bounded, jittered retry for transient I/O.
//!
//! The session layer wraps connects and sends in a [`RetryPolicy`]; the
//! free function [`retry`] is the one-shot form:
//!
//! ```ignore
//! let body = retry(config.connect_attempts, &cancel, || http.request(probe.clone())).await?;
//! ```
//!
//! Between failed attempts the policy sleeps a uniformly random delay in
//! `[0, 3 × unit)`. The sleep races a [`CancellationToken`]; when the token
//! fires, the remaining attempts are abandoned with
//! [`RetryError::Cancelled`]. The last attempt's error is returned as-is.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the policy itself, never by the retried operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    /// `times` was zero.
    #[error("retry needs at least one attempt, got {0}")]
    InvalidAttempts(u32),

    /// The cancellation token fired while waiting between attempts.
    #[error("retry cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How many times to attempt an operation, and how long to back off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay_unit: Duration,
}

impl RetryPolicy {
    /// Default jitter unit: waits fall in `[0, 3 ms)`.
    pub const DEFAULT_DELAY_UNIT: Duration = Duration::from_millis(1);

    /// Creates a policy allowing `attempts` tries in total.
    ///
    /// # Errors
    /// [`RetryError::InvalidAttempts`] when `attempts` is zero.
    pub fn new(attempts: u32) -> Result<Self, RetryError> {
        if attempts < 1 {
            return Err(RetryError::InvalidAttempts(attempts));
        }
        Ok(Self {
            attempts,
            delay_unit: Self::DEFAULT_DELAY_UNIT,
        })
    }

    /// Sets the jitter unit. Waits are drawn from `[0, 3 × unit)`.
    pub fn with_delay_unit(mut self, delay_unit: Duration) -> Self {
        self.delay_unit = delay_unit;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay_unit(&self) -> Duration {
        self.delay_unit
    }

    /// Draws one inter-attempt delay.
    pub fn jitter(&self) -> Duration {
        let ceiling = self.delay_unit.saturating_mul(3).as_nanos();
        let ceiling = u64::try_from(ceiling).unwrap_or(u64::MAX);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::rng().random_range(0..ceiling))
    }

    /// Runs `operation` until it succeeds or the attempts run out.
    ///
    /// `operation` is called at least once and at most
    /// [`attempts`](Self::attempts) times. If every call fails, the error
    /// from the final call is returned unchanged.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RetryError> + Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.attempts => return Err(e),
                Err(e) => {
                    let delay = self.jitter();
                    debug!(
                        attempt,
                        max_attempts = self.attempts,
                        delay_us = delay.as_micros() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!(attempt, "retry cancelled");
                            return Err(RetryError::Cancelled.into());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Attempts `operation` up to `times` times with the default delay unit.
///
/// # Errors
/// [`RetryError::InvalidAttempts`] (converted into `E`) when `times` is
/// zero; otherwise whatever the last attempt returned, or
/// [`RetryError::Cancelled`] if `cancel` fired between attempts.
pub async fn retry<T, E, F, Fut>(
    times: u32,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<RetryError> + Display,
{
    RetryPolicy::new(times)?.run(cancel, operation).await
}
