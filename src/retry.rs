//! Bounded retry helpers.
//!
//! Two flavours are provided:
//!
//! - [`retry_until_deadline`] keeps calling an operation until it succeeds,
//!   fails with a [`RetryError::NonRetryable`] error, or the wall-clock budget
//!   runs out. This is the loop the consistency poller and the alias
//!   existence check are built on.
//! - [`with_transient_retry`] retries a single API call a bounded number of
//!   times when it fails with a rate-limit (429) or unavailable (503) error.
//!
//! All sleeping goes through the tokio clock, so tests can run the cadences
//! in paused time.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::time::Instant;
use tracing::debug;

use crate::error::ProviderError;

/// A wall-clock deadline measured on the tokio clock.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a deadline that expires `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Time spent since the deadline was started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    /// Whether the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Sleep for `delay`, but never past the deadline.
    pub async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay.min(self.remaining())).await;
    }
}

/// Delay schedule between attempts of a deadline-bounded loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// The same delay before every attempt.
    Fixed(Duration),
    /// `initial * factor^attempt`, capped at `max`.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Upper bound for any single delay.
        max: Duration,
        /// Growth factor per attempt, at least 1.
        factor: f64,
    },
}

impl Backoff {
    /// Create a doubling backoff.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::Exponential {
            initial,
            max,
            factor: 2.0,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential {
                initial,
                max,
                factor,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let nanos = initial.as_nanos() as f64 * factor.max(1.0).powi(exponent);
                if !nanos.is_finite() || nanos >= max.as_nanos() as f64 {
                    *max
                } else {
                    Duration::from_nanos(nanos as u64)
                }
            }
        }
    }
}

/// An operation failure, tagged with whether the loop should try again.
#[derive(Debug)]
pub enum RetryError {
    /// Try again after the next delay, unless the deadline has passed.
    Retryable(ProviderError),
    /// Stop immediately and surface the error.
    NonRetryable(ProviderError),
}

impl RetryError {
    /// Unwrap the underlying error.
    pub fn into_inner(self) -> ProviderError {
        match self {
            Self::Retryable(err) | Self::NonRetryable(err) => err,
        }
    }
}

impl From<ProviderError> for RetryError {
    fn from(err: ProviderError) -> Self {
        if err.is_retryable() {
            Self::Retryable(err)
        } else {
            Self::NonRetryable(err)
        }
    }
}

/// Call `op` until it succeeds, fails fatally, or `budget` has elapsed.
///
/// On timeout the last retryable error is returned. An attempt that is in
/// flight when the deadline passes is allowed to finish.
pub async fn retry_until_deadline<F, Fut, T>(
    budget: Duration,
    backoff: &Backoff,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let deadline = Deadline::after(budget);
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => {
                if deadline.is_elapsed() {
                    return Err(err);
                }
                let delay = backoff.delay(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying before deadline"
                );
                attempt = attempt.saturating_add(1);
                deadline.pause(delay).await;
            }
        }
    }
}

/// Attempt-bounded retry policy for transient API failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    /// Growth factor between delays.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Run `operation`, retrying rate-limit and unavailable errors.
///
/// Errors for which [`ProviderError::is_retryable`] is false are returned
/// after the first failure.
pub async fn with_transient_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    // backon counts retries, not attempts
    let max_retries = policy.max_attempts.saturating_sub(1) as usize;

    let backoff = ExponentialBuilder::default()
        .with_min_delay(policy.initial_backoff)
        .with_max_delay(policy.max_backoff)
        .with_factor(policy.multiplier as f32)
        .with_max_times(max_retries);

    operation
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(|err: &ProviderError| err.is_retryable())
        .notify(|err: &ProviderError, dur: Duration| {
            debug!(
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "retrying transient API error"
            );
        })
        .await
}
