use super::{RetryPolicy, execute};
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::transport::ApiResponse;
use serde_json::Value;
use std::future::Future;
use tracing::warn;

/// Run a best-effort diagnostic read. Never fails; a failing hook is logged.
pub async fn run_diagnostics<D, DFut>(context: &str, hook: D) -> Option<Value>
where
    D: FnOnce() -> DFut,
    DFut: Future<Output = Result<Value>>,
{
    match hook().await {
        Ok(report) => {
            warn!(context, %report, "Diagnostic report after failure");
            Some(report)
        }
        Err(e) => {
            warn!(context, error = %e, "Diagnostic read failed");
            None
        }
    }
}

/// [`execute`], plus a diagnostic read whenever the remote rejects the call
/// for good (non-retryable or out of attempts).
///
/// The error from `call` is always the one returned.
pub async fn execute_with_diagnostics<F, Fut, D, DFut>(
    clock: &dyn Clock,
    policy: &RetryPolicy,
    context: &str,
    call: F,
    diagnostics: D,
) -> Result<ApiResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse>>,
    D: FnOnce() -> DFut,
    DFut: Future<Output = Result<Value>>,
{
    match execute(clock, policy, call).await {
        Err(e @ (AppError::NonRetryable { .. } | AppError::RetryExhausted { .. })) => {
            run_diagnostics(context, diagnostics).await;
            Err(e)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_helpers::MockClock;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_diagnostics_swallows_errors() {
        let report = run_diagnostics("pivots", || async {
            Err(AppError::NonRetryable {
                status_code: 500,
                body: "boom".to_string(),
            })
        })
        .await;

        assert_eq!(report, None);
    }

    #[tokio::test]
    async fn test_run_diagnostics_returns_report() {
        let report =
            run_diagnostics("pivots", || async { Ok(json!({"value": [{"name": "P1"}]})) }).await;

        assert_eq!(report, Some(json!({"value": [{"name": "P1"}]})));
    }

    #[tokio::test]
    async fn test_non_retryable_runs_diagnostics_and_keeps_call_error() {
        let clock = MockClock::new();
        let policy = RetryPolicy::default();
        let diagnostic_calls = AtomicU32::new(0);

        let result = execute_with_diagnostics(
            &clock,
            &policy,
            "pivots",
            || async { Ok(ApiResponse::new(400, "InvalidPivot")) },
            || {
                diagnostic_calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::Graph("diagnostics down".to_string())) }
            },
        )
        .await;

        assert_eq!(diagnostic_calls.load(Ordering::SeqCst), 1);
        match result {
            Err(AppError::NonRetryable { status_code, body }) => {
                assert_eq!(status_code, 400);
                assert_eq!(body, "InvalidPivot");
            }
            other => panic!("expected NonRetryable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_runs_diagnostics() {
        let clock = MockClock::new();
        let policy = RetryPolicy::new(2, Duration::from_secs(1));
        let diagnostic_calls = AtomicU32::new(0);

        let result = execute_with_diagnostics(
            &clock,
            &policy,
            "pivots",
            || async { Ok(ApiResponse::new(504, "MaxRequestDurationExceeded")) },
            || {
                diagnostic_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({"value": []})) }
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::RetryExhausted { attempts: 2, .. })
        ));
        assert_eq!(diagnostic_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_skips_diagnostics() {
        let clock = MockClock::new();
        let policy = RetryPolicy::default();
        let diagnostic_calls = AtomicU32::new(0);

        let result = execute_with_diagnostics(
            &clock,
            &policy,
            "pivots",
            || async { Ok(ApiResponse::new(204, "")) },
            || {
                diagnostic_calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!(null)) }
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(diagnostic_calls.load(Ordering::SeqCst), 0);
    }
}
