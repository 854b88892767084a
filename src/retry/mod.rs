//! Retry and polling loops for eventually-consistent remote operations.
//!
//! - [`execute`] reissues a single call with exponential backoff, honoring
//!   server-provided `Retry-After` hints.
//! - [`poll_until_available`] waits for a resource to become visible, with a
//!   deadline measured from the first lookup.
//! - [`update_chunks`] pushes ordered slices of a larger update, halting at the
//!   first chunk that cannot be applied.
//! - [`execute_with_diagnostics`] runs a best-effort diagnostic hook before a
//!   terminal failure is returned.

mod chunks;
mod diagnostics;
mod executor;
mod poll;

pub use chunks::update_chunks;
pub use diagnostics::{execute_with_diagnostics, run_diagnostics};
pub use executor::execute;
pub use poll::{PollSpec, poll_until_available};

use crate::error::{AppError, Result};
use crate::transport::ApiResponse;
use std::time::Duration;

/// Graph error code returned when a workbook operation runs too long.
pub const DURATION_EXCEEDED_CODE: &str = "MaxRequestDurationExceeded";

const TOO_MANY_REQUESTS: u16 = 429;

/// How a single attempt's response is treated by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Retryable,
    Fatal,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub is_success: fn(u16) -> bool,
    pub is_retryable: fn(u16, &[u8]) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
            is_success: is_success_status,
            is_retryable: is_throttled_or_duration_exceeded,
        }
    }

    pub fn with_success(mut self, is_success: fn(u16) -> bool) -> Self {
        self.is_success = is_success;
        self
    }

    pub fn with_retryable(mut self, is_retryable: fn(u16, &[u8]) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AppError::Config(
                "Retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_backoff.is_zero() {
            return Err(AppError::Config(
                "Retry base backoff must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn classify(&self, response: &ApiResponse) -> Outcome {
        if (self.is_success)(response.status) {
            Outcome::Success
        } else if (self.is_retryable)(response.status, &response.body) {
            Outcome::Retryable
        } else {
            Outcome::Fatal
        }
    }

    /// Wait before the attempt following failed attempt `attempt` (0-based).
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if let Some(delay) = retry_after.and_then(parse_retry_after) {
            return delay;
        }
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_backoff.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

pub fn is_throttled_or_duration_exceeded(status: u16, body: &[u8]) -> bool {
    status == TOO_MANY_REQUESTS
        || String::from_utf8_lossy(body).contains(DURATION_EXCEEDED_CODE)
}

/// Parse a `Retry-After` value given in whole seconds.
///
/// HTTP-date values and anything else that is not plain digits are ignored.
fn parse_retry_after(hint: &str) -> Option<Duration> {
    let hint = hint.trim();
    if hint.is_empty() || !hint.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    hint.parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_without_hint() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        let delays: Vec<Duration> = (0..4).map(|k| policy.backoff_delay(k, None)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ]
        );
    }

    #[test]
    fn test_retry_after_hint_wins() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(3, Some("7")), Duration::from_secs(7));
        assert_eq!(policy.backoff_delay(3, Some("0")), Duration::ZERO);
        assert_eq!(policy.backoff_delay(0, Some(" 2 ")), Duration::from_secs(2));
    }

    #[test]
    fn test_malformed_hint_falls_back_to_backoff() {
        let policy = RetryPolicy::default();
        for hint in ["", "-1", "+3", "1.5", "Wed, 21 Oct 2015 07:28:00 GMT"] {
            assert_eq!(
                policy.backoff_delay(2, Some(hint)),
                Duration::from_secs(4),
                "hint {hint:?} should be ignored"
            );
        }
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(64, None), Duration::MAX);
    }

    #[test]
    fn test_classify_default_predicates() {
        let policy = RetryPolicy::default();
        let duration_exceeded = br#"{"error":{"code":"MaxRequestDurationExceeded"}}"#;

        assert_eq!(policy.classify(&ApiResponse::new(200, "")), Outcome::Success);
        assert_eq!(policy.classify(&ApiResponse::new(204, "")), Outcome::Success);
        assert_eq!(policy.classify(&ApiResponse::new(429, "")), Outcome::Retryable);
        assert_eq!(
            policy.classify(&ApiResponse::new(504, duration_exceeded.to_vec())),
            Outcome::Retryable
        );
        assert_eq!(policy.classify(&ApiResponse::new(400, "")), Outcome::Fatal);
        assert_eq!(policy.classify(&ApiResponse::new(401, "")), Outcome::Fatal);
        assert_eq!(policy.classify(&ApiResponse::new(404, "")), Outcome::Fatal);
    }

    #[test]
    fn test_custom_predicates() {
        let policy = RetryPolicy::default()
            .with_success(|status| status == 201)
            .with_retryable(|status, _| status >= 500);

        assert_eq!(policy.classify(&ApiResponse::new(201, "")), Outcome::Success);
        assert_eq!(policy.classify(&ApiResponse::new(200, "")), Outcome::Fatal);
        assert_eq!(policy.classify(&ApiResponse::new(503, "")), Outcome::Retryable);
    }

    #[test]
    fn test_validate_rejects_zero_attempts_and_backoff() {
        assert!(RetryPolicy::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(RetryPolicy::new(1, Duration::ZERO).validate().is_err());
        assert!(RetryPolicy::default().validate().is_ok());
    }
}
