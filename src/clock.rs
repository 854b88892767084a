use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Time source for retry and poll loops.
///
/// Loops only ever measure time through `now` and wait through `sleep`, so a
/// virtual clock can drive them deterministically.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock whose time only moves when something sleeps on it.
    #[derive(Clone)]
    pub(crate) struct MockClock {
        start: Instant,
        offset: Arc<Mutex<Duration>>,
        pub sleeps: Arc<Mutex<Vec<Duration>>>,
    }

    impl MockClock {
        pub(crate) fn new() -> Self {
            Self {
                start: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
                sleeps: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn elapsed(&self) -> Duration {
            *self.offset.lock().unwrap()
        }

        pub(crate) fn recorded_sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.start + *self.offset.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            *self.offset.lock().unwrap() += duration;
            self.sleeps.lock().unwrap().push(duration);
        }
    }
}
