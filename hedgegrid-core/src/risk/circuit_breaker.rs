//! Rolling error-window circuit breaker.
//!
//! Every rejection/denial appends a monotonic timestamp. When the count
//! inside the configured window reaches the limit the breaker trips,
//! stays active for the cooldown, then resets on the next poll.

use std::collections::VecDeque;
use tracing::{error, info};

/// Hard cap on retained error timestamps regardless of window width.
const ERROR_WINDOW_CAP: usize = 100;

/// Circuit breaker over a rolling window of error timestamps.
pub struct CircuitBreaker {
    window: VecDeque<i64>,
    window_ns: i64,
    max_errors: usize,
    cooldown_ns: i64,
    enabled: bool,
    active: bool,
    reset_at_ns: Option<i64>,
    total_trips: u64,
}

impl CircuitBreaker {
    pub fn new(
        window_seconds: u64,
        max_errors: usize,
        cooldown_seconds: u64,
        enabled: bool,
    ) -> Self {
        Self {
            window: VecDeque::with_capacity(ERROR_WINDOW_CAP),
            window_ns: (window_seconds as i64) * 1_000_000_000,
            max_errors,
            cooldown_ns: (cooldown_seconds as i64) * 1_000_000_000,
            enabled,
            active: false,
            reset_at_ns: None,
            total_trips: 0,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn total_trips(&self) -> u64 {
        self.total_trips
    }

    /// Errors currently inside the window.
    #[inline]
    pub fn error_count(&self) -> usize {
        self.window.len()
    }

    /// Record an error at `now_ns`. Returns `true` when this error trips
    /// the breaker (caller then sweeps open orders).
    pub fn record_error(&mut self, now_ns: i64) -> bool {
        if !self.enabled {
            return false;
        }
        if self.active {
            self.poll(now_ns);
            return false;
        }

        if self.window.len() == ERROR_WINDOW_CAP {
            self.window.pop_front();
        }
        self.window.push_back(now_ns);

        let window_start = now_ns - self.window_ns;
        while matches!(self.window.front(), Some(&ts) if ts < window_start) {
            self.window.pop_front();
        }

        if self.window.len() >= self.max_errors {
            error!(
                errors = self.window.len(),
                "circuit breaker activated - cancelling open orders"
            );
            self.active = true;
            self.reset_at_ns = Some(now_ns + self.cooldown_ns);
            self.total_trips += 1;
            self.window.clear();
            return true;
        }
        false
    }

    /// Reset the breaker if the cooldown has expired. Returns the active
    /// state after the poll.
    pub fn poll(&mut self, now_ns: i64) -> bool {
        if self.active {
            if let Some(reset_at) = self.reset_at_ns {
                if now_ns >= reset_at {
                    self.active = false;
                    self.reset_at_ns = None;
                    info!("circuit breaker reset - resuming normal operation");
                }
            }
        }
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1_000_000_000;

    #[test]
    fn trips_at_threshold_within_window() {
        let mut breaker = CircuitBreaker::new(60, 3, 300, true);
        assert!(!breaker.record_error(SEC));
        assert!(!breaker.record_error(2 * SEC));
        assert!(breaker.record_error(3 * SEC));
        assert!(breaker.is_active());
        assert_eq!(breaker.total_trips(), 1);
    }

    #[test]
    fn old_errors_fall_out_of_the_window() {
        let mut breaker = CircuitBreaker::new(60, 3, 300, true);
        assert!(!breaker.record_error(SEC));
        assert!(!breaker.record_error(2 * SEC));
        // Third error arrives after the first left the window.
        assert!(!breaker.record_error(100 * SEC));
        assert!(!breaker.is_active());
        assert_eq!(breaker.error_count(), 2);
    }

    #[test]
    fn stays_active_for_exactly_the_cooldown() {
        let mut breaker = CircuitBreaker::new(60, 2, 300, true);
        breaker.record_error(SEC);
        breaker.record_error(2 * SEC);
        assert!(breaker.is_active());

        // One nanosecond before the reset boundary.
        assert!(breaker.poll(2 * SEC + 300 * SEC - 1));
        // At the boundary it resets.
        assert!(!breaker.poll(2 * SEC + 300 * SEC));
        assert!(!breaker.is_active());
    }

    #[test]
    fn errors_while_active_do_not_extend_cooldown() {
        let mut breaker = CircuitBreaker::new(60, 2, 300, true);
        breaker.record_error(SEC);
        breaker.record_error(2 * SEC);
        assert!(breaker.is_active());

        assert!(!breaker.record_error(10 * SEC));
        assert!(!breaker.poll(2 * SEC + 300 * SEC));
    }

    #[test]
    fn disabled_breaker_never_trips() {
        let mut breaker = CircuitBreaker::new(60, 1, 300, false);
        assert!(!breaker.record_error(SEC));
        assert!(!breaker.record_error(2 * SEC));
        assert!(!breaker.is_active());
    }

    #[test]
    fn window_is_bounded() {
        let mut breaker = CircuitBreaker::new(1_000_000, usize::MAX, 300, true);
        for i in 0..500 {
            breaker.record_error(i * SEC);
        }
        assert!(breaker.error_count() <= 100);
    }
}
