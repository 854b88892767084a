use crate::clock::Clock;
use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSpec {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(3),
        }
    }
}

impl PollSpec {
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self> {
        let spec = Self { timeout, interval };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(AppError::Config(
                "Poll interval must be positive".to_string(),
            ));
        }
        if self.timeout < self.interval {
            return Err(AppError::Config(format!(
                "Poll timeout ({:?}) must not be shorter than the poll interval ({:?})",
                self.timeout, self.interval
            )));
        }
        Ok(())
    }
}

/// Call `lookup` until it yields a value or `spec.timeout` has elapsed since
/// the first call.
///
/// `Ok(None)` and transient errors mean "not there yet". Any other error is
/// returned immediately. Sleeps never run past the deadline.
pub async fn poll_until_available<T, F, Fut>(
    clock: &dyn Clock,
    spec: &PollSpec,
    resource_id: &str,
    mut lookup: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    spec.validate()?;

    let start = clock.now();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match lookup().await {
            Ok(Some(value)) => {
                debug!(resource_id, attempt, "Resource is available");
                return Ok(value);
            }
            Ok(None) => debug!(resource_id, attempt, "Resource not available yet"),
            Err(e) if e.is_transient() => {
                debug!(resource_id, attempt, error = %e, "Lookup failed transiently")
            }
            Err(e) => return Err(e),
        }

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= spec.timeout {
            return Err(AppError::PollTimeout {
                resource_id: resource_id.to_string(),
                elapsed,
            });
        }

        clock.sleep(spec.interval.min(spec.timeout - elapsed)).await;
    }
}
