//! External collaborator seams consumed by the controller.
//!
//! The venue adapter implements [`OrderGateway`] and [`PositionCache`];
//! the grid planning stack implements [`LadderPlanner`]. All gateway I/O
//! is best-effort - results arrive later as [`OrderEvent`]s, and the event
//! stream is the authoritative truth.

use crate::core::types::{Bar, InstrumentId, Ladder, Position, Regime, Side};
use crate::execution::types::{LiveOrder, OrderIntent};
use anyhow::Result;
use rust_decimal::Decimal;
use std::time::SystemTime;

/// Injected time source; all engine timestamps come from here, never from
/// ad-hoc wall-clock reads.
pub trait Clock: Send + Sync {
    /// Nanoseconds since the Unix epoch.
    fn now_ns(&self) -> i64;

    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64 {
        self.now_ns() / 1_000_000
    }
}

/// Wall-clock implementation for live trading.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> i64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

/// Account balance for one currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountBalance {
    pub total: Decimal,
    pub free: Decimal,
}

/// Venue order gateway. Submit and cancel are fire-and-forget; outcomes
/// are delivered through the event stream.
pub trait OrderGateway: Send {
    fn submit(&self, intent: &OrderIntent) -> Result<()>;

    fn cancel(&self, client_order_id: &str) -> Result<()>;

    /// Open orders whose client order id starts with `prefix`.
    fn orders_open(&self, prefix: &str) -> Vec<LiveOrder>;

    /// Current hedge-mode positions for this account.
    fn positions(&self) -> Vec<Position>;

    fn account_balance(&self, currency: &str) -> Option<AccountBalance>;
}

/// Read surface over the venue position state, mirrored per (instrument,
/// side). Lifecycle is owned by the exchange.
pub trait PositionCache: Send {
    fn position(&self, instrument_id: &InstrumentId, side: Side) -> Option<Position>;
}

/// Grid planning stack: regime tracking plus ladder construction/shaping.
///
/// The controller owns the center price and the throttle; the planner owns
/// everything derived from the bar stream.
pub trait LadderPlanner: Send {
    /// Consume one bar. Called for warm-up bars too; must not emit orders.
    fn on_bar(&mut self, bar: &Bar);

    /// Feed a funding update from the mark-price stream.
    fn on_funding_update(&mut self, rate: f64, next_funding_time_ns: i64);

    /// True once every indicator has consumed its lookback.
    fn is_warm(&self) -> bool;

    /// Current regime; meaningful only when warm.
    fn regime(&self) -> Regime;

    /// Build the raw LONG/SHORT ladders around `center`.
    fn build_ladders(&self, center: Decimal) -> Vec<Ladder>;

    /// Apply placement policy and funding guard to raw ladders.
    fn shape_ladders(&self, ladders: Vec<Ladder>, now_ns: i64) -> Vec<Ladder>;

    /// Whether the grid should be rebuilt around `mid`.
    fn recenter_needed(&self, mid: Decimal, last_center: Decimal) -> bool;
}
