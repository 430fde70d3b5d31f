//! Market regime detection from the bar stream.
//!
//! EMA-pair slope classifies direction, ADX gates on trend strength, and a
//! basis-point dead-band provides hysteresis: inside the band the regime is
//! SIDE, outside it without ADX confirmation the previous regime is
//! retained. ATR participates in the warmth criterion.

use crate::indicators::{Adx, Atr, Ema};
use hedgegrid_core::config::RegimeSection;
use hedgegrid_core::core::{Bar, Regime};
use rust_decimal::prelude::ToPrimitive;

/// Classifies the bar stream into UP / DOWN / SIDE.
#[derive(Debug, Clone)]
pub struct RegimeDetector {
    ema_fast: Ema,
    ema_slow: Ema,
    adx: Adx,
    atr: Atr,
    hysteresis_bps: f64,
    trending_adx: f64,
    current: Regime,
}

impl RegimeDetector {
    pub fn new(cfg: &RegimeSection) -> Self {
        Self {
            ema_fast: Ema::new(cfg.ema_fast),
            ema_slow: Ema::new(cfg.ema_slow),
            adx: Adx::new(cfg.adx_len),
            atr: Atr::new(cfg.atr_len),
            hysteresis_bps: cfg.hysteresis_bps,
            trending_adx: cfg.trending_adx,
            current: Regime::Side,
        }
    }

    /// Consume one bar. Also used for warmup; produces no side effects
    /// beyond indicator state.
    pub fn update_from_bar(&mut self, bar: &Bar) {
        let high = bar.high.to_f64().unwrap_or(0.0);
        let low = bar.low.to_f64().unwrap_or(0.0);
        let close = bar.close.to_f64().unwrap_or(0.0);

        self.ema_fast.update(close);
        self.ema_slow.update(close);
        self.adx.update(high, low, close);
        self.atr.update(high, low, close);

        if self.is_warm() {
            self.classify();
        }
    }

    fn classify(&mut self) {
        let (Some(fast), Some(slow), Some(adx)) =
            (self.ema_fast.value(), self.ema_slow.value(), self.adx.value())
        else {
            return;
        };
        if slow <= 0.0 {
            return;
        }

        let ratio_bps = (fast / slow - 1.0) * 10_000.0;
        if ratio_bps.abs() <= self.hysteresis_bps {
            self.current = Regime::Side;
        } else if ratio_bps > 0.0 && adx >= self.trending_adx {
            self.current = Regime::Up;
        } else if ratio_bps < 0.0 && adx >= self.trending_adx {
            self.current = Regime::Down;
        }
        // Outside the dead-band without ADX confirmation: retain.
    }

    /// Latest classification; meaningful only once warm.
    #[inline]
    pub fn current(&self) -> Regime {
        self.current
    }

    /// Warm when every indicator has consumed its lookback.
    pub fn is_warm(&self) -> bool {
        self.ema_fast.is_warm()
            && self.ema_slow.is_warm()
            && self.adx.is_warm()
            && self.atr.is_warm()
    }

    #[inline]
    pub fn atr(&self) -> Option<f64> {
        self.atr.value()
    }

    #[inline]
    pub fn adx(&self) -> Option<f64> {
        self.adx.value()
    }
}
