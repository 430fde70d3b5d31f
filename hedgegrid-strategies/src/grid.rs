//! Symmetric ladder construction around a stable center price.

use hedgegrid_core::config::GridSection;
use hedgegrid_core::config::RegimeSection;
use hedgegrid_core::core::{Ladder, Regime, Rung, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Builds the LONG/SHORT ladders and decides when to recenter.
pub struct GridEngine;

impl GridEngine {
    /// Build both ladders around `center`: level `i` sits `i` grid steps
    /// away (LONG below, SHORT above). The regime bias scales quantity on
    /// the side the market is moving away from - UP biases the LONG
    /// ladder, DOWN the SHORT ladder, SIDE both.
    ///
    /// Levels whose price would be non-positive are skipped.
    pub fn build_ladders(
        center: Decimal,
        grid: &GridSection,
        regime_cfg: &RegimeSection,
        regime: Regime,
    ) -> Vec<Ladder> {
        let mut long = Ladder::new(Side::Long);
        let mut short = Ladder::new(Side::Short);
        if center <= Decimal::ZERO {
            return vec![long, short];
        }

        let (long_mult, short_mult) = match regime {
            Regime::Up => (regime_cfg.up_bias, Decimal::ONE),
            Regime::Down => (Decimal::ONE, regime_cfg.down_bias),
            Regime::Side => (regime_cfg.side_bias, regime_cfg.side_bias),
        };

        for i in 1..=grid.n_rungs {
            let offset = center * grid.grid_step_bps * Decimal::from(i) / dec!(10000);
            let long_px = center - offset;
            let short_px = center + offset;

            if let Ok(rung) = Rung::new(long_px, grid.base_qty * long_mult, Side::Long) {
                let _ = long.push(rung);
            }
            if let Ok(rung) = Rung::new(short_px, grid.base_qty * short_mult, Side::Short) {
                let _ = short.push(rung);
            }
        }

        vec![long, short]
    }

    /// True when the grid must be rebuilt around `mid`: either no center
    /// has been established yet, or the mid has drifted beyond the
    /// configured threshold.
    pub fn recenter_needed(mid: Decimal, last_center: Decimal, grid: &GridSection) -> bool {
        if last_center <= Decimal::ZERO {
            return true;
        }
        let deviation_bps = ((mid - last_center) / last_center).abs() * dec!(10000);
        deviation_bps > grid.recenter_threshold_bps
    }
}
