//! # Circuit Breaker Manager (C2)
//!
//! Named breakers wrapping external calls (repository writes, vendor I/O) with a
//! closed/open/half-open state machine. Grounded on the `database` defaults from spec
//! §4.2: `failure_threshold = 5`, `open_duration = 10s`, `half_open_successes_required = 2`.

use crate::clock::Clock;
use parking_lot::Mutex;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerParams {
    pub failure_threshold: u32,
    pub open_duration: Duration,
    pub half_open_successes_required: u32,
}

impl Default for BreakerParams {
    /// Defaults for the database resource category (spec §4.2).
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(10),
            half_open_successes_required: 2,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BreakerError<E> {
    #[error("circuit breaker open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<std::time::Instant>,
    success_in_half_open: u32,
    params: BreakerParams,
}

impl BreakerInner {
    fn new(params: BreakerParams) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            success_in_half_open: 0,
            params,
        }
    }
}

/// Owns every named breaker in the process. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct CircuitBreakerManager {
    clock: Arc<dyn Clock>,
    breakers: Mutex<HashMap<String, BreakerInner>>,
    default_params: BreakerParams,
}

impl std::fmt::Debug for BreakerInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerInner")
            .field("state", &self.state)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish()
    }
}

impl CircuitBreakerManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            breakers: Mutex::new(HashMap::new()),
            default_params: BreakerParams::default(),
        }
    }

    pub fn with_default_params(clock: Arc<dyn Clock>, default_params: BreakerParams) -> Self {
        Self {
            clock,
            breakers: Mutex::new(HashMap::new()),
            default_params,
        }
    }

    /// Registers (or overrides) the parameters for a named resource. Safe to call after
    /// the breaker has already seen traffic; it only replaces the parameters, not state.
    pub fn configure(&self, name: impl Into<String>, params: BreakerParams) {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(name.into())
            .or_insert_with(|| BreakerInner::new(params))
            .params = params;
    }

    pub fn state_of(&self, name: &str) -> BreakerState {
        self.breakers
            .lock()
            .get(name)
            .map(|b| b.state)
            .unwrap_or(BreakerState::Closed)
    }

    /// Runs `f` through the named breaker. Fails with [`BreakerError::Open`] without
    /// invoking `f` while the breaker is open.
    pub async fn execute<F, Fut, T, E>(&self, name: &str, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow(name) {
            return Err(BreakerError::Open);
        }
        match f().await {
            Ok(value) => {
                self.record_success(name);
                Ok(value)
            }
            Err(err) => {
                self.record_failure(name);
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn allow(&self, name: &str) -> bool {
        let mut breakers = self.breakers.lock();
        let breaker = breakers
            .entry(name.to_string())
            .or_insert_with(|| BreakerInner::new(self.default_params));

        if breaker.state == BreakerState::Open {
            let elapsed = breaker
                .opened_at
                .map(|at| self.clock.monotonic_now().saturating_duration_since(at))
                .unwrap_or_default();
            if elapsed >= breaker.params.open_duration {
                breaker.state = BreakerState::HalfOpen;
                breaker.success_in_half_open = 0;
            }
        }
        breaker.state != BreakerState::Open
    }

    fn record_success(&self, name: &str) {
        let mut breakers = self.breakers.lock();
        let Some(breaker) = breakers.get_mut(name) else {
            return;
        };
        match breaker.state {
            BreakerState::Closed => breaker.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                breaker.success_in_half_open += 1;
                if breaker.success_in_half_open >= breaker.params.half_open_successes_required {
                    breaker.state = BreakerState::Closed;
                    breaker.consecutive_failures = 0;
                    breaker.success_in_half_open = 0;
                    breaker.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self, name: &str) {
        let mut breakers = self.breakers.lock();
        let Some(breaker) = breakers.get_mut(name) else {
            return;
        };
        match breaker.state {
            BreakerState::Closed => {
                breaker.consecutive_failures += 1;
                if breaker.consecutive_failures >= breaker.params.failure_threshold {
                    breaker.state = BreakerState::Open;
                    breaker.opened_at = Some(self.clock.monotonic_now());
                }
            }
            BreakerState::HalfOpen => {
                breaker.state = BreakerState::Open;
                breaker.opened_at = Some(self.clock.monotonic_now());
                breaker.success_in_half_open = 0;
            }
            BreakerState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use chrono::Utc;

    fn manager() -> (Arc<TestClock>, CircuitBreakerManager) {
        let clock = Arc::new(TestClock::new(Utc::now()));
        let manager = CircuitBreakerManager::with_default_params(
            clock.clone(),
            BreakerParams {
                failure_threshold: 5,
                open_duration: Duration::from_secs(10),
                half_open_successes_required: 2,
            },
        );
        (clock, manager)
    }

    async fn always_fails() -> Result<(), &'static str> {
        Err("boom")
    }

    async fn always_succeeds() -> Result<(), &'static str> {
        Ok(())
    }

    #[tokio::test]
    async fn trips_after_threshold_without_invoking_fn() {
        let (_, manager) = manager();
        for _ in 0..5 {
            let _ = manager.execute("db", always_fails).await;
        }
        assert_eq!(manager.state_of("db"), BreakerState::Open);

        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let invoked_clone = invoked.clone();
        let result = manager
            .execute("db", || async move {
                invoked_clone.store(true, std::sync::atomic::Ordering::SeqCst);
                always_succeeds().await
            })
            .await;
        assert_eq!(result, Err(BreakerError::Open));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn recovers_through_half_open_after_duration() {
        let (clock, manager) = manager();
        for _ in 0..5 {
            let _ = manager.execute("db", always_fails).await;
        }
        assert_eq!(manager.state_of("db"), BreakerState::Open);

        clock.advance(Duration::from_secs(11));
        let _ = manager.execute("db", always_succeeds).await;
        assert_eq!(manager.state_of("db"), BreakerState::HalfOpen);

        let _ = manager.execute("db", always_succeeds).await;
        assert_eq!(manager.state_of("db"), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let (clock, manager) = manager();
        for _ in 0..5 {
            let _ = manager.execute("db", always_fails).await;
        }
        clock.advance(Duration::from_secs(11));
        let _ = manager.execute("db", always_fails).await;
        assert_eq!(manager.state_of("db"), BreakerState::Open);
    }
}
