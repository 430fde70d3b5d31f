//! Domain types for the hedge-grid engine
//!
//! All prices and quantities are `rust_decimal::Decimal`; timestamps are
//! nanoseconds since the Unix epoch from the injected clock. Types with
//! invariants expose validated constructors that return [`DomainError`]
//! instead of panicking.

use crate::core::errors::DomainError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position side in hedge mode (two independent positions per instrument).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// One-letter abbreviation used inside client order ids.
    #[inline]
    pub fn abbrev(&self) -> char {
        match self {
            Side::Long => 'L',
            Side::Short => 'S',
        }
    }

    pub fn from_abbrev(c: char) -> Option<Side> {
        match c {
            'L' => Some(Side::Long),
            'S' => Some(Side::Short),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Market regime classification.
///
/// Undefined until the detector is warm; the controller refuses to trade
/// before warmth regardless of the reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Up,
    Down,
    Side,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Up => write!(f, "UP"),
            Regime::Down => write!(f, "DOWN"),
            Regime::Side => write!(f, "SIDE"),
        }
    }
}

/// Engine execution mode.
///
/// Staleness checks apply in `Live` only; `Backtest` and `Optimization`
/// run without wall-clock guards and without state persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Live,
    Backtest,
    Optimization,
}

impl EngineMode {
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, EngineMode::Live)
    }

    /// Optimization runs suppress per-bar informational logging.
    #[inline]
    pub fn is_quiet(&self) -> bool {
        matches!(self, EngineMode::Optimization)
    }
}

/// Instrument identifier, e.g. `BTCUSDT-PERP.BINANCE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form: `.` and `/` replaced with `_`.
    pub fn safe_id(&self) -> String {
        self.0.replace(['.', '/'], "_")
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// OHLCV bar from the market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Venue event time (ns).
    pub ts_event: i64,
    /// Local receive/init time (ns).
    pub ts_init: i64,
}

/// Mark price update carrying funding data (perp venues only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkPriceUpdate {
    pub mark: Decimal,
    /// Funding rate per 8h interval as a fraction (e.g. 0.0001 = 1bp).
    pub funding_rate: f64,
    pub next_funding_time_ns: i64,
}

/// A single intended order at one grid level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rung {
    pub price: Decimal,
    pub qty: Decimal,
    pub side: Side,
    pub tp: Option<Decimal>,
    pub sl: Option<Decimal>,
    pub tag: Option<String>,
}

impl Rung {
    pub fn new(price: Decimal, qty: Decimal, side: Side) -> Result<Self, DomainError> {
        if price <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice(price));
        }
        if qty <= Decimal::ZERO {
            return Err(DomainError::NonPositiveQty(qty));
        }
        Ok(Self {
            price,
            qty,
            side,
            tp: None,
            sl: None,
            tag: None,
        })
    }

    /// Attach exit prices; each must sit on the correct side of `price`.
    ///
    /// LONG exits take profit above and stop below; SHORT is mirrored.
    pub fn with_exits(
        mut self,
        tp: Option<Decimal>,
        sl: Option<Decimal>,
    ) -> Result<Self, DomainError> {
        if let Some(tp) = tp {
            let ok = match self.side {
                Side::Long => tp > self.price,
                Side::Short => tp < self.price && tp > Decimal::ZERO,
            };
            if !ok {
                return Err(DomainError::InvalidExitPrice {
                    kind: "tp",
                    price: tp,
                    entry: self.price,
                    side: self.side.to_string(),
                });
            }
        }
        if let Some(sl) = sl {
            let ok = match self.side {
                Side::Long => sl < self.price && sl > Decimal::ZERO,
                Side::Short => sl > self.price,
            };
            if !ok {
                return Err(DomainError::InvalidExitPrice {
                    kind: "sl",
                    price: sl,
                    entry: self.price,
                    side: self.side.to_string(),
                });
            }
        }
        self.tp = tp;
        self.sl = sl;
        Ok(self)
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[inline]
    pub fn notional(&self) -> Decimal {
        self.price * self.qty
    }
}

/// Ordered sequence of rungs of a single side, level 1 closest to center.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ladder {
    side: Side,
    rungs: Vec<Rung>,
}

impl Ladder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            rungs: Vec::new(),
        }
    }

    pub fn push(&mut self, rung: Rung) -> Result<(), DomainError> {
        if rung.side != self.side {
            return Err(DomainError::SideMismatch {
                expected: self.side.to_string(),
                actual: rung.side.to_string(),
            });
        }
        self.rungs.push(rung);
        Ok(())
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    #[inline]
    pub fn rungs(&self) -> &[Rung] {
        &self.rungs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rung> {
        self.rungs.iter()
    }

    /// Keep only the first `n` rungs. Level indices are positional, so
    /// truncation preserves the identity of the kept levels.
    pub fn truncate(&mut self, n: usize) {
        self.rungs.truncate(n);
    }

    pub fn clear(&mut self) {
        self.rungs.clear();
    }

    /// Drop rungs that would cross the spread at `mid` so post-only limits
    /// can rest as maker: LONG rungs must price strictly below mid, SHORT
    /// rungs strictly above.
    pub fn filter_placeable(mut self, mid: Decimal) -> Self {
        match self.side {
            Side::Long => self.rungs.retain(|r| r.price < mid),
            Side::Short => self.rungs.retain(|r| r.price > mid),
        }
        self
    }

    /// Scale every rung quantity by `factor` (operator throttle).
    ///
    /// A non-positive factor empties the ladder.
    pub fn scale_qty(mut self, factor: Decimal) -> Self {
        if factor <= Decimal::ZERO {
            self.rungs.clear();
            return self;
        }
        for rung in &mut self.rungs {
            rung.qty *= factor;
        }
        self
    }

    /// Total notional across all rungs.
    pub fn notional(&self) -> Decimal {
        self.rungs.iter().map(Rung::notional).sum()
    }
}

impl<'a> IntoIterator for &'a Ladder {
    type Item = &'a Rung;
    type IntoIter = std::slice::Iter<'a, Rung>;

    fn into_iter(self) -> Self::IntoIter {
        self.rungs.iter()
    }
}

/// Hedge-mode position snapshot, mirrored from the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub quantity: Decimal,
    pub avg_entry_px: Decimal,
}

impl Position {
    pub fn new(
        instrument_id: InstrumentId,
        side: Side,
        quantity: Decimal,
        avg_entry_px: Decimal,
    ) -> Result<Self, DomainError> {
        if quantity < Decimal::ZERO {
            return Err(DomainError::NegativeQty(quantity));
        }
        if quantity > Decimal::ZERO && avg_entry_px <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice(avg_entry_px));
        }
        Ok(Self {
            instrument_id,
            side,
            quantity,
            avg_entry_px,
        })
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.quantity == Decimal::ZERO
    }

    #[inline]
    pub fn notional(&self) -> Decimal {
        self.quantity * self.avg_entry_px
    }
}

/// Observed lifecycle state of an exchange order.
///
/// Only `Open` participates in order diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Pending,
    Filled,
    Canceled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// Which side of the book a fill consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiquiditySide {
    Maker,
    Taker,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_abbrev_round_trip() {
        assert_eq!(Side::from_abbrev(Side::Long.abbrev()), Some(Side::Long));
        assert_eq!(Side::from_abbrev(Side::Short.abbrev()), Some(Side::Short));
        assert_eq!(Side::from_abbrev('X'), None);
    }

    #[test]
    fn rung_rejects_non_positive_values() {
        assert!(Rung::new(dec!(0), dec!(1), Side::Long).is_err());
        assert!(Rung::new(dec!(-1), dec!(1), Side::Long).is_err());
        assert!(Rung::new(dec!(100), dec!(0), Side::Short).is_err());
    }

    #[test]
    fn rung_exit_prices_must_bracket_entry() {
        let rung = Rung::new(dec!(100), dec!(1), Side::Long).unwrap();
        assert!(rung
            .clone()
            .with_exits(Some(dec!(101)), Some(dec!(99)))
            .is_ok());
        assert!(rung
            .clone()
            .with_exits(Some(dec!(99)), None)
            .is_err());
        assert!(rung.with_exits(None, Some(dec!(101))).is_err());

        let rung = Rung::new(dec!(100), dec!(1), Side::Short).unwrap();
        assert!(rung
            .clone()
            .with_exits(Some(dec!(99)), Some(dec!(101)))
            .is_ok());
        assert!(rung.with_exits(Some(dec!(101)), None).is_err());
    }

    #[test]
    fn ladder_rejects_mismatched_side() {
        let mut ladder = Ladder::new(Side::Long);
        let rung = Rung::new(dec!(100), dec!(1), Side::Short).unwrap();
        assert!(ladder.push(rung).is_err());
        assert!(ladder.is_empty());
    }

    #[test]
    fn filter_placeable_drops_crossing_rungs() {
        let mut ladder = Ladder::new(Side::Long);
        for price in [dec!(99), dec!(100), dec!(101)] {
            ladder
                .push(Rung::new(price, dec!(1), Side::Long).unwrap())
                .unwrap();
        }
        let ladder = ladder.filter_placeable(dec!(100));
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder.rungs()[0].price, dec!(99));

        let mut ladder = Ladder::new(Side::Short);
        for price in [dec!(99), dec!(100), dec!(101)] {
            ladder
                .push(Rung::new(price, dec!(1), Side::Short).unwrap())
                .unwrap();
        }
        let ladder = ladder.filter_placeable(dec!(100));
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder.rungs()[0].price, dec!(101));
    }

    #[test]
    fn scale_qty_applies_factor_and_empties_on_zero() {
        let mut ladder = Ladder::new(Side::Long);
        ladder
            .push(Rung::new(dec!(100), dec!(1), Side::Long).unwrap())
            .unwrap();
        let scaled = ladder.clone().scale_qty(dec!(0.5));
        assert_eq!(scaled.rungs()[0].qty, dec!(0.5));
        assert!(ladder.scale_qty(Decimal::ZERO).is_empty());
    }

    #[test]
    fn instrument_safe_id_replaces_separators() {
        let id = InstrumentId::new("BTCUSDT-PERP.BINANCE");
        assert_eq!(id.safe_id(), "BTCUSDT-PERP_BINANCE");
    }

    #[test]
    fn position_validation() {
        let id = InstrumentId::new("X.Y");
        assert!(Position::new(id.clone(), Side::Long, dec!(-1), dec!(1)).is_err());
        assert!(Position::new(id.clone(), Side::Long, dec!(1), dec!(0)).is_err());
        let flat = Position::new(id, Side::Long, dec!(0), dec!(0)).unwrap();
        assert!(flat.is_flat());
    }
}
