//! Venue precision guards for price and quantity clamping.
//!
//! Every rung the diff engine emits has passed through [`PrecisionGuard`],
//! so the gateway never sees an off-tick price or a sub-step quantity.

use crate::core::errors::DomainError;
use crate::core::types::Rung;
use rust_decimal::{Decimal, RoundingStrategy};

/// Venue precision rules for one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentPrecision {
    /// Minimum price increment.
    pub price_tick: Decimal,
    /// Minimum quantity increment.
    pub qty_step: Decimal,
    /// Minimum order value (price * qty).
    pub min_notional: Decimal,
    /// Minimum order quantity.
    pub min_qty: Decimal,
    /// Maximum order quantity.
    pub max_qty: Decimal,
}

impl InstrumentPrecision {
    pub fn new(
        price_tick: Decimal,
        qty_step: Decimal,
        min_notional: Decimal,
        min_qty: Decimal,
        max_qty: Decimal,
    ) -> Result<Self, DomainError> {
        if price_tick <= Decimal::ZERO {
            return Err(DomainError::InvalidPrecision(format!(
                "price_tick must be positive, got {price_tick}"
            )));
        }
        if qty_step <= Decimal::ZERO {
            return Err(DomainError::InvalidPrecision(format!(
                "qty_step must be positive, got {qty_step}"
            )));
        }
        if min_notional < Decimal::ZERO {
            return Err(DomainError::InvalidPrecision(format!(
                "min_notional must be non-negative, got {min_notional}"
            )));
        }
        if min_qty < Decimal::ZERO {
            return Err(DomainError::InvalidPrecision(format!(
                "min_qty must be non-negative, got {min_qty}"
            )));
        }
        if max_qty <= Decimal::ZERO {
            return Err(DomainError::InvalidPrecision(format!(
                "max_qty must be positive, got {max_qty}"
            )));
        }
        if min_qty > max_qty {
            return Err(DomainError::InvalidPrecision(format!(
                "min_qty ({min_qty}) cannot exceed max_qty ({max_qty})"
            )));
        }
        Ok(Self {
            price_tick,
            qty_step,
            min_notional,
            min_qty,
            max_qty,
        })
    }
}

/// Clamps prices and quantities to venue rules. Pure; no interior state.
#[derive(Debug, Clone)]
pub struct PrecisionGuard {
    precision: InstrumentPrecision,
}

impl PrecisionGuard {
    pub fn new(precision: InstrumentPrecision) -> Self {
        Self { precision }
    }

    #[inline]
    pub fn precision(&self) -> &InstrumentPrecision {
        &self.precision
    }

    /// Round price to the nearest tick (not down) to minimize displacement
    /// from the intended level. Midpoints round away from zero.
    pub fn clamp_price(&self, price: Decimal) -> Decimal {
        let tick = self.precision.price_tick;
        (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * tick
    }

    /// Round quantity DOWN to the step (conservative for risk), then apply
    /// min/max bounds. Below `min_qty` collapses to zero.
    pub fn clamp_qty(&self, qty: Decimal) -> Decimal {
        let step = self.precision.qty_step;
        let clamped = (qty / step).floor() * step;

        if clamped < self.precision.min_qty {
            return Decimal::ZERO;
        }
        if clamped > self.precision.max_qty {
            return self.precision.max_qty;
        }
        clamped
    }

    /// `price * qty` must clear the venue's minimum order value.
    pub fn validate_notional(&self, price: Decimal, qty: Decimal) -> bool {
        price * qty >= self.precision.min_notional
    }

    /// Apply all guards to a rung, preserving side/tp/sl/tag.
    ///
    /// Returns `None` when the clamped quantity collapses to zero or the
    /// notional falls below the venue minimum.
    pub fn clamp_rung(&self, rung: &Rung) -> Option<Rung> {
        let price = self.clamp_price(rung.price);
        let qty = self.clamp_qty(rung.qty);

        if qty <= Decimal::ZERO {
            return None;
        }
        if !self.validate_notional(price, qty) {
            return None;
        }

        Some(Rung {
            price,
            qty,
            side: rung.side,
            tp: rung.tp,
            sl: rung.sl,
            tag: rung.tag.clone(),
        })
    }
}
