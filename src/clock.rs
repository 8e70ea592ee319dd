// SPDX-License-Identifier: Apache-2.0

//! Time source for the throttle gate.
//!
//! The gate reads wall-clock time and stalls the calling thread through a
//! [`Clock`], so tests can drive it deterministically.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A trait for abstracting time operations to enable testing.
pub trait Clock {
    /// Returns the current instant in time.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Monotonic clock that really blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Clock> Clock for &T {
    fn now(&self) -> Instant {
        (*self).now()
    }

    fn sleep(&self, duration: Duration) {
        (*self).sleep(duration);
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        self.as_ref().now()
    }

    fn sleep(&self, duration: Duration) {
        self.as_ref().sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Clock;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    /// Mock clock for testing that can be advanced manually.
    ///
    /// Sleeping advances the clock instead of blocking and records the
    /// requested duration.
    #[derive(Debug)]
    pub(crate) struct MockClock {
        base: Instant,
        nanos: AtomicU64,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl MockClock {
        pub(crate) fn new() -> Self {
            Self {
                base: Instant::now(),
                nanos: AtomicU64::new(0),
                sleeps: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn advance(&self, duration: Duration) {
            let _ = self
                .nanos
                .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        }

        pub(crate) fn advance_secs(&self, secs: f64) {
            self.advance(Duration::from_secs_f64(secs));
        }

        pub(crate) fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            let nanos = self.nanos.load(Ordering::Relaxed);
            self.base + Duration::from_nanos(nanos)
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            self.advance(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockClock;
    use super::*;

    #[test]
    fn test_mock_clock_sleep_advances_time() {
        let clock = MockClock::new();
        let start = clock.now();

        (&clock).sleep(Duration::from_millis(1500));
        clock.advance(Duration::from_millis(500));

        assert_eq!(clock.now() - start, Duration::from_secs(2));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(1500)]);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = Arc::new(SystemClock);
        let first = clock.now();
        clock.sleep(Duration::from_millis(1));
        assert!(clock.now() > first);
    }
}
