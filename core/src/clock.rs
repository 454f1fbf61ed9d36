//! Time source abstraction so the breaker, backoff, limit-matcher tick, and day-boundary
//! rollover can be driven deterministically in tests (design note in spec §9).

use chrono::{DateTime, Utc};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// A combined wall-clock + monotonic time source.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Wall-clock time, used for `dataTimestamp` comparisons and day-boundary rollover.
    fn now(&self) -> DateTime<Utc>;
    /// Monotonic time, used for breaker timers, backoff, and polling ticks.
    fn monotonic_now(&self) -> Instant;
}

/// Real-time clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually-advanced clock for deterministic tests.
#[derive(Debug)]
pub struct TestClock {
    mono_base: Instant,
    wall_base: DateTime<Utc>,
    offset_millis: AtomicU64,
}

impl TestClock {
    pub fn new(wall_base: DateTime<Utc>) -> Self {
        Self {
            mono_base: Instant::now(),
            wall_base,
            offset_millis: AtomicU64::new(0),
        }
    }

    /// Advances both the wall and monotonic readings by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.offset_millis
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn offset(&self) -> Duration {
        Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.wall_base + chrono::Duration::from_std(self.offset()).unwrap_or_default()
    }

    fn monotonic_now(&self) -> Instant {
        self.mono_base + self.offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_both_readings() {
        let clock = TestClock::new(DateTime::<Utc>::MIN_UTC);
        let wall0 = clock.now();
        let mono0 = clock.monotonic_now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - wall0, chrono::Duration::seconds(5));
        assert_eq!(clock.monotonic_now() - mono0, Duration::from_secs(5));
    }
}
