use super::{Outcome, RetryPolicy};
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::transport::ApiResponse;
use std::future::Future;
use tracing::{debug, warn};

/// Run `call` until it succeeds, fails non-retryably, or `policy.max_attempts`
/// attempts have been made.
///
/// A transport error (no HTTP status received) is returned as-is without
/// consuming further attempts.
pub async fn execute<F, Fut>(
    clock: &dyn Clock,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<ApiResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
{
    policy.validate()?;

    let mut last: Option<ApiResponse> = None;
    for attempt in 0..policy.max_attempts {
        let response = call().await?;

        match policy.classify(&response) {
            Outcome::Success => return Ok(response),
            Outcome::Fatal => {
                return Err(AppError::NonRetryable {
                    status_code: response.status,
                    body: response.text().into_owned(),
                });
            }
            Outcome::Retryable => {}
        }

        if attempt + 1 < policy.max_attempts {
            let wait = policy.backoff_delay(attempt, response.retry_after.as_deref());
            debug!(
                status = response.status,
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                ?wait,
                "Retryable response, backing off"
            );
            clock.sleep(wait).await;
        }
        last = Some(response);
    }

    let (status_code, body) = last
        .map(|r| (r.status, r.text().into_owned()))
        .unwrap_or_default();
    warn!(
        status = status_code,
        attempts = policy.max_attempts,
        "Retry attempts exhausted"
    );

    Err(AppError::RetryExhausted {
        status_code,
        body,
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_helpers::MockClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn run_with_responses(
        clock: &MockClock,
        policy: &RetryPolicy,
        responses: Vec<ApiResponse>,
    ) -> (Result<ApiResponse>, u32) {
        let calls = AtomicU32::new(0);
        let result = execute(clock, policy, || {
            let index = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let response = responses[index.min(responses.len() - 1)].clone();
            async move { Ok(response) }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_always_retryable_attempts_exactly_max() {
        for max_attempts in 1..=5 {
            let clock = MockClock::new();
            let policy = RetryPolicy::new(max_attempts, Duration::from_secs(1));

            let (result, calls) =
                run_with_responses(&clock, &policy, vec![ApiResponse::new(429, "slow down")])
                    .await;

            assert_eq!(calls, max_attempts);
            match result {
                Err(AppError::RetryExhausted {
                    status_code,
                    body,
                    attempts,
                }) => {
                    assert_eq!(status_code, 429);
                    assert_eq!(body, "slow down");
                    assert_eq!(attempts, max_attempts);
                }
                other => panic!("expected RetryExhausted, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_backoff_doubles_between_attempts() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(4, Duration::from_secs(2));

        let (result, _) =
            run_with_responses(&clock, &policy, vec![ApiResponse::new(429, "")]).await;

        assert!(result.is_err());
        assert_eq!(
            clock.recorded_sleeps(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_retry_after_means_no_wait() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let responses = vec![
            ApiResponse::new(429, "").with_retry_after("0"),
            ApiResponse::new(200, "done"),
        ];

        let (result, calls) = run_with_responses(&clock, &policy, responses).await;

        assert_eq!(result.unwrap().text(), "done");
        assert_eq!(calls, 2);
        assert_eq!(clock.recorded_sleeps(), vec![Duration::ZERO]);
    }

    #[tokio::test]
    async fn test_malformed_retry_after_uses_backoff() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let responses = vec![
            ApiResponse::new(429, "").with_retry_after("soon"),
            ApiResponse::new(429, "").with_retry_after("3"),
            ApiResponse::new(204, ""),
        ];

        let (result, calls) = run_with_responses(&clock, &policy, responses).await;

        assert!(result.is_ok());
        assert_eq!(calls, 3);
        assert_eq!(
            clock.recorded_sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(3)]
        );
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(10, Duration::from_secs(1));

        let (result, calls) =
            run_with_responses(&clock, &policy, vec![ApiResponse::new(404, "itemNotFound")])
                .await;

        assert_eq!(calls, 1);
        assert!(clock.recorded_sleeps().is_empty());
        match result {
            Err(AppError::NonRetryable { status_code, body }) => {
                assert_eq!(status_code, 404);
                assert_eq!(body, "itemNotFound");
            }
            other => panic!("expected NonRetryable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duration_exceeded_is_retried() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let responses = vec![
            ApiResponse::new(
                504,
                r#"{"error":{"code":"MaxRequestDurationExceeded"}}"#,
            ),
            ApiResponse::new(200, "ok"),
        ];

        let (result, calls) = run_with_responses(&clock, &policy, responses).await;

        assert!(result.is_ok());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_immediately() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result = execute(&clock, &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Graph("connection reset".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Graph(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_policy_is_rejected_before_calling() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result = execute(&clock, &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(ApiResponse::new(200, "")) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
