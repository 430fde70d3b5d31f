//! Streaming indicators for regime classification.
//!
//! All three are incremental: one `update` per bar, O(1) state, no lookback
//! buffers. ATR and ADX use Wilder's smoothing. Values are `None` until the
//! indicator has consumed its lookback.

/// Exponential moving average, seeded with the first sample.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: f64,
    value: Option<f64>,
    count: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
            count: 0,
        }
    }

    pub fn update(&mut self, sample: f64) {
        self.count += 1;
        self.value = Some(match self.value {
            None => sample,
            Some(prev) => prev + self.alpha * (sample - prev),
        });
    }

    #[inline]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    #[inline]
    pub fn is_warm(&self) -> bool {
        self.count >= self.period
    }
}

/// Average true range with Wilder smoothing.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    tr_sum: f64,
    value: Option<f64>,
    count: usize,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev_close: None,
            tr_sum: 0.0,
            value: None,
            count: 0,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) {
        let tr = match self.prev_close {
            None => high - low,
            Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
        };
        self.prev_close = Some(close);
        self.count += 1;

        match self.value {
            None => {
                self.tr_sum += tr;
                if self.count >= self.period {
                    self.value = Some(self.tr_sum / self.period as f64);
                }
            }
            Some(prev) => {
                self.value = Some((prev * (self.period as f64 - 1.0) + tr) / self.period as f64);
            }
        }
    }

    #[inline]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    #[inline]
    pub fn is_warm(&self) -> bool {
        self.value.is_some()
    }
}

/// Average directional index (Wilder): smoothed +DM/-DM against TR give
/// DI+/DI-, their normalized spread is DX, and ADX is the Wilder average
/// of DX. Produces a value after roughly two lookbacks of bars.
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<(f64, f64, f64)>,
    tr_smooth: f64,
    plus_smooth: f64,
    minus_smooth: f64,
    dx_sum: f64,
    dx_count: usize,
    value: Option<f64>,
    count: usize,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev: None,
            tr_smooth: 0.0,
            plus_smooth: 0.0,
            minus_smooth: 0.0,
            dx_sum: 0.0,
            dx_count: 0,
            value: None,
            count: 0,
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) {
        let (ph, pl, pc) = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some((high, low, close));
                return;
            }
        };
        self.prev = Some((high, low, close));

        let up_move = high - ph;
        let down_move = pl - low;
        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };
        let tr = (high - low).max((high - pc).abs()).max((low - pc).abs());

        self.count += 1;
        let n = self.period as f64;

        if self.count <= self.period {
            self.tr_smooth += tr;
            self.plus_smooth += plus_dm;
            self.minus_smooth += minus_dm;
            if self.count < self.period {
                return;
            }
        } else {
            self.tr_smooth = self.tr_smooth - self.tr_smooth / n + tr;
            self.plus_smooth = self.plus_smooth - self.plus_smooth / n + plus_dm;
            self.minus_smooth = self.minus_smooth - self.minus_smooth / n + minus_dm;
        }

        let dx = self.dx();
        match self.value {
            None => {
                self.dx_sum += dx;
                self.dx_count += 1;
                if self.dx_count >= self.period {
                    self.value = Some(self.dx_sum / self.period as f64);
                }
            }
            Some(prev) => {
                self.value = Some((prev * (n - 1.0) + dx) / n);
            }
        }
    }

    fn dx(&self) -> f64 {
        if self.tr_smooth <= 0.0 {
            return 0.0;
        }
        let di_plus = 100.0 * self.plus_smooth / self.tr_smooth;
        let di_minus = 100.0 * self.minus_smooth / self.tr_smooth;
        let denom = di_plus + di_minus;
        if denom <= 0.0 {
            return 0.0;
        }
        100.0 * (di_plus - di_minus).abs() / denom
    }

    #[inline]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    #[inline]
    pub fn is_warm(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ema_seeds_with_first_sample_and_converges() {
        let mut ema = Ema::new(4);
        ema.update(100.0);
        assert_eq!(ema.value(), Some(100.0));
        assert!(!ema.is_warm());

        for _ in 0..50 {
            ema.update(110.0);
        }
        assert!(ema.is_warm());
        assert_relative_eq!(ema.value().unwrap(), 110.0, epsilon = 1e-6);
    }

    #[test]
    fn ema_warm_after_period_samples() {
        let mut ema = Ema::new(3);
        ema.update(1.0);
        ema.update(2.0);
        assert!(!ema.is_warm());
        ema.update(3.0);
        assert!(ema.is_warm());
    }

    #[test]
    fn atr_of_constant_range_bars() {
        let mut atr = Atr::new(3);
        // Bars with constant 2.0 high-low range, no gaps.
        for _ in 0..10 {
            atr.update(101.0, 99.0, 100.0);
        }
        assert!(atr.is_warm());
        assert_relative_eq!(atr.value().unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn atr_includes_gap_in_true_range() {
        let mut atr = Atr::new(1);
        atr.update(101.0, 99.0, 100.0);
        // Gap up: TR = max(1, |111-100|, |109-100|) = 11.
        atr.update(111.0, 109.0, 110.0);
        assert_relative_eq!(atr.value().unwrap(), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn adx_high_in_a_clean_trend() {
        let mut adx = Adx::new(3);
        let mut price = 100.0;
        for _ in 0..20 {
            price += 1.0;
            adx.update(price + 0.5, price - 0.5, price);
        }
        assert!(adx.is_warm());
        // Monotonic rises have no -DM, so DX pins at 100.
        assert!(adx.value().unwrap() > 90.0);
    }

    #[test]
    fn adx_low_in_chop() {
        let mut adx = Adx::new(3);
        for i in 0..30 {
            let price = if i % 2 == 0 { 100.0 } else { 99.0 };
            adx.update(price + 0.5, price - 0.5, price);
        }
        assert!(adx.is_warm());
        assert!(adx.value().unwrap() < 40.0);
    }

    #[test]
    fn adx_needs_two_lookbacks_to_warm() {
        let mut adx = Adx::new(5);
        let mut price = 100.0;
        for _ in 0..8 {
            price += 1.0;
            adx.update(price + 0.5, price - 0.5, price);
        }
        assert!(!adx.is_warm());
        for _ in 0..8 {
            price += 1.0;
            adx.update(price + 0.5, price - 0.5, price);
        }
        assert!(adx.is_warm());
    }
}
