//! Bounded retry of post-only rejections with tick-by-tick price backoff.
//!
//! A post-only order that would cross the spread is rejected by the venue.
//! The handler moves the price one tick per attempt AWAY from the spread
//! (LONG down, SHORT up) so the replacement can rest as maker, and gives up
//! after `max_attempts`.

use crate::core::types::Side;
use crate::execution::precision::PrecisionGuard;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

/// Rejection substrings that indicate a post-only order would have taken
/// liquidity. Matched case-insensitively.
const POST_ONLY_PATTERNS: &[&str] = &[
    "post-only",
    "post only",
    "post_only",
    "would be filled immediately",
    "would immediately match",
    "would execute as taker",
    "would have been a taker",
    "would take liquidity",
    "would cross",
    "taker",
];

/// Venue error code for "post-only would trade"; terminal, never retried.
const NON_RETRYABLE_VENUE_CODE: &str = "-5022";

/// Record of a single retry attempt, kept for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub original_price: Decimal,
    pub adjusted_price: Decimal,
    pub reason: String,
    pub ts_ms: i64,
}

/// Post-only retry handler with bounded attempts per order.
pub struct PostOnlyRetryHandler {
    precision_guard: PrecisionGuard,
    max_attempts: u32,
    enabled: bool,
    history: HashMap<String, Vec<RetryAttempt>>,
}

impl PostOnlyRetryHandler {
    pub fn new(precision_guard: PrecisionGuard, max_attempts: u32, enabled: bool) -> Self {
        Self {
            precision_guard,
            max_attempts,
            enabled,
            history: HashMap::new(),
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled && self.max_attempts > 0
    }

    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Terminal venue code: the order must not be resubmitted; the grid is
    /// recalculated on the next bar instead.
    pub fn is_non_retryable(&self, reason: &str) -> bool {
        reason.contains(NON_RETRYABLE_VENUE_CODE)
    }

    /// True when the rejection reason indicates a post-only cross.
    pub fn should_retry(&self, reason: &str) -> bool {
        if !self.enabled() {
            return false;
        }
        if self.is_non_retryable(reason) {
            return false;
        }
        let lower = reason.to_lowercase();
        POST_ONLY_PATTERNS.iter().any(|p| lower.contains(p))
    }

    /// Move the price `attempt` ticks away from the spread and clamp to a
    /// valid tick boundary. LONG retreats down (away from the ask), SHORT
    /// retreats up (away from the bid).
    pub fn adjust_price_for_retry(
        &self,
        original_price: Decimal,
        side: Side,
        attempt: u32,
    ) -> Decimal {
        let adjustment = self.precision_guard.precision().price_tick * Decimal::from(attempt);
        let adjusted = match side {
            Side::Long => original_price - adjustment,
            Side::Short => original_price + adjustment,
        };
        self.precision_guard.clamp_price(adjusted)
    }

    pub fn record_attempt(
        &mut self,
        client_order_id: &str,
        attempt: u32,
        original_price: Decimal,
        adjusted_price: Decimal,
        reason: &str,
        ts_ms: i64,
    ) {
        self.history
            .entry(client_order_id.to_string())
            .or_default()
            .push(RetryAttempt {
                attempt,
                original_price,
                adjusted_price,
                reason: reason.to_string(),
                ts_ms,
            });
        info!(
            client_order_id,
            attempt, %original_price, %adjusted_price, reason, "post-only retry"
        );
    }

    pub fn retry_history(&self, client_order_id: &str) -> &[RetryAttempt] {
        self.history
            .get(client_order_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Clear history after success or abandonment.
    pub fn clear_history(&mut self, client_order_id: &str) {
        self.history.remove(client_order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::precision::InstrumentPrecision;
    use rust_decimal_macros::dec;

    fn handler(max_attempts: u32, enabled: bool) -> PostOnlyRetryHandler {
        let guard = PrecisionGuard::new(
            InstrumentPrecision::new(dec!(0.01), dec!(0.001), dec!(5), dec!(0.001), dec!(1000))
                .unwrap(),
        );
        PostOnlyRetryHandler::new(guard, max_attempts, enabled)
    }

    #[test]
    fn recognizes_post_only_rejections() {
        let h = handler(3, true);
        assert!(h.should_retry("Order would be filled immediately"));
        assert!(h.should_retry("POST-ONLY order would cross"));
        assert!(h.should_retry("would have been a TAKER"));
        assert!(!h.should_retry("insufficient margin"));
    }

    #[test]
    fn venue_post_only_trade_code_is_terminal() {
        let h = handler(3, true);
        assert!(h.is_non_retryable("error -5022: post-only would trade"));
        assert!(!h.should_retry("error -5022: post-only would trade"));
    }

    #[test]
    fn disabled_handler_never_retries() {
        let h = handler(3, false);
        assert!(!h.enabled());
        assert!(!h.should_retry("would cross"));

        let h = handler(0, true);
        assert!(!h.enabled());
    }

    #[test]
    fn long_retreats_down_short_retreats_up() {
        let h = handler(3, true);
        assert_eq!(
            h.adjust_price_for_retry(dec!(100.00), Side::Long, 1),
            dec!(99.99)
        );
        assert_eq!(
            h.adjust_price_for_retry(dec!(100.00), Side::Long, 3),
            dec!(99.97)
        );
        assert_eq!(
            h.adjust_price_for_retry(dec!(100.00), Side::Short, 2),
            dec!(100.02)
        );
    }

    #[test]
    fn adjusted_price_lands_on_tick() {
        let h = handler(3, true);
        let adjusted = h.adjust_price_for_retry(dec!(100.005), Side::Long, 1);
        assert_eq!(adjusted % dec!(0.01), dec!(0));
    }

    #[test]
    fn history_tracks_and_clears() {
        let mut h = handler(3, true);
        h.record_attempt("HG1-L01-1-1", 1, dec!(100), dec!(99.99), "would cross", 1000);
        h.record_attempt("HG1-L01-1-1", 2, dec!(100), dec!(99.98), "would cross", 2000);
        assert_eq!(h.retry_history("HG1-L01-1-1").len(), 2);
        assert_eq!(h.retry_history("HG1-L01-1-1")[1].attempt, 2);
        h.clear_history("HG1-L01-1-1");
        assert!(h.retry_history("HG1-L01-1-1").is_empty());
    }
}
