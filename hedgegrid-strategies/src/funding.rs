//! Funding-aware exposure reduction.
//!
//! Perp venues exchange funding every 8 hours; holding inventory on the
//! paying side through the timestamp is a pure cost. Inside the configured
//! window before funding, if the projected cost exceeds the threshold, the
//! paying side's ladder is suppressed so the diff cancels its resting
//! rungs. Passive until a funding rate has been fed (backtests without
//! funding data never trigger it).

use hedgegrid_core::config::FundingSection;
use hedgegrid_core::core::{Ladder, Side};
use tracing::info;

pub struct FundingGuard {
    window_ns: i64,
    max_cost_bps: f64,
    rate: Option<f64>,
    next_funding_ns: Option<i64>,
}

impl FundingGuard {
    pub fn new(cfg: &FundingSection) -> Self {
        Self {
            window_ns: cfg.funding_window_minutes * 60 * 1_000_000_000,
            max_cost_bps: cfg.funding_max_cost_bps,
            rate: None,
            next_funding_ns: None,
        }
    }

    pub fn on_funding_update(&mut self, rate: f64, next_funding_time_ns: i64) {
        self.rate = Some(rate);
        self.next_funding_ns = Some(next_funding_time_ns);
    }

    /// Projected 8h funding cost in bps of inventory.
    pub fn projected_cost_bps(&self) -> f64 {
        self.rate.map(|r| r.abs() * 10_000.0).unwrap_or(0.0)
    }

    /// The side that pays at the current rate: longs pay when positive.
    fn paying_side(rate: f64) -> Side {
        if rate > 0.0 {
            Side::Long
        } else {
            Side::Short
        }
    }

    /// Suppress the paying side when `now` is inside the pre-funding
    /// window and the projected cost exceeds the threshold; otherwise the
    /// ladders pass through unchanged.
    pub fn adjust_ladders(&self, ladders: Vec<Ladder>, now_ns: i64) -> Vec<Ladder> {
        let (rate, next) = match (self.rate, self.next_funding_ns) {
            (Some(rate), Some(next)) => (rate, next),
            _ => return ladders,
        };
        if rate == 0.0 {
            return ladders;
        }

        let armed = now_ns >= next - self.window_ns && now_ns <= next;
        if !armed {
            return ladders;
        }

        let cost_bps = rate.abs() * 10_000.0;
        if cost_bps <= self.max_cost_bps {
            return ladders;
        }

        let paying = Self::paying_side(rate);
        info!(
            rate,
            cost_bps,
            side = %paying,
            "funding window active, suppressing paying side"
        );
        ladders
            .into_iter()
            .map(|mut ladder| {
                if ladder.side() == paying {
                    ladder.clear();
                }
                ladder
            })
            .collect()
    }
}
