use std::time::Duration;

use crate::ApiError;

/// Backoff strategy mapping a retry attempt number to its delay.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// `base_delay * attempt`.
    Linear,
    /// `base_delay * 2^(attempt - 1)`.
    Exponential,
}

/// Configures retry behavior for failed transport attempts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetrySpec {
    /// Maximum number of retries after the initial attempt. Zero disables
    /// retrying entirely.
    pub count: u32,
    /// Base delay in milliseconds fed into the backoff strategy.
    pub delay_ms: u64,
    /// Delay growth strategy. No jitter is applied.
    pub backoff: Backoff,
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self {
            count: 0,
            delay_ms: 250,
            backoff: Backoff::Exponential,
        }
    }
}

impl RetrySpec {
    /// Builds a spec with the given retry count and the default backoff.
    pub fn with_count(count: u32) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }
}

/// Decides whether a failed attempt should be re-issued.
///
/// `attempt` is 1 for the first retry; the initial try is attempt 0 and is
/// never subject to this policy. Cancellations and interceptor rejections
/// are never retried regardless of remaining budget.
pub fn should_retry(attempt: u32, error: &ApiError, spec: &RetrySpec) -> bool {
    attempt <= spec.count && error.is_retryable()
}

/// Delay to wait before the given retry attempt (1-based).
pub fn delay_for(attempt: u32, spec: &RetrySpec) -> Duration {
    let attempt = attempt.max(1);
    let millis = match spec.backoff {
        Backoff::Linear => spec.delay_ms.saturating_mul(u64::from(attempt)),
        Backoff::Exponential => {
            // Clamp the shift so pathological attempt counts saturate
            // instead of overflowing.
            let exp = (attempt - 1).min(16);
            spec.delay_ms.saturating_mul(1u64 << exp)
        }
    };
    Duration::from_millis(millis)
}
