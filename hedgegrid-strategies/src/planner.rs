//! Grid planner: the full planning stack behind the core's
//! [`LadderPlanner`] seam.
//!
//! Composition per bar: detector tracks the regime; ladders are built
//! around the controller's center, thinned by the placement policy, then
//! funding-adjusted. The controller applies throttle and the
//! cross-the-spread filter afterwards.

use crate::detector::RegimeDetector;
use crate::funding::FundingGuard;
use crate::grid::GridEngine;
use crate::policy::PlacementPolicy;
use hedgegrid_core::config::{GridSection, HedgeGridConfig, PolicySection, RegimeSection};
use hedgegrid_core::core::{Bar, Ladder, Regime};
use hedgegrid_core::engine::LadderPlanner;
use rust_decimal::Decimal;

pub struct GridPlanner {
    grid: GridSection,
    regime_cfg: RegimeSection,
    policy: PolicySection,
    detector: RegimeDetector,
    funding: FundingGuard,
}

impl GridPlanner {
    pub fn new(cfg: &HedgeGridConfig) -> Self {
        Self {
            grid: cfg.grid.clone(),
            regime_cfg: cfg.regime.clone(),
            policy: cfg.policy.clone(),
            detector: RegimeDetector::new(&cfg.regime),
            funding: FundingGuard::new(&cfg.funding),
        }
    }

    pub fn detector(&self) -> &RegimeDetector {
        &self.detector
    }
}

impl LadderPlanner for GridPlanner {
    fn on_bar(&mut self, bar: &Bar) {
        self.detector.update_from_bar(bar);
    }

    fn on_funding_update(&mut self, rate: f64, next_funding_time_ns: i64) {
        self.funding.on_funding_update(rate, next_funding_time_ns);
    }

    fn is_warm(&self) -> bool {
        self.detector.is_warm()
    }

    fn regime(&self) -> Regime {
        self.detector.current()
    }

    fn build_ladders(&self, center: Decimal) -> Vec<Ladder> {
        GridEngine::build_ladders(center, &self.grid, &self.regime_cfg, self.regime())
    }

    fn shape_ladders(&self, ladders: Vec<Ladder>, now_ns: i64) -> Vec<Ladder> {
        let shaped = PlacementPolicy::shape_ladders(ladders, self.regime(), &self.policy);
        self.funding.adjust_ladders(shaped, now_ns)
    }

    fn recenter_needed(&self, mid: Decimal, last_center: Decimal) -> bool {
        GridEngine::recenter_needed(mid, last_center, &self.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn fast_cfg() -> HedgeGridConfig {
        let mut cfg = HedgeGridConfig::default();
        cfg.regime.ema_fast = 2;
        cfg.regime.ema_slow = 3;
        cfg.regime.adx_len = 2;
        cfg.regime.atr_len = 2;
        cfg.grid.n_rungs = 2;
        cfg
    }

    fn bar(close: f64) -> Bar {
        let d = |v: f64| Decimal::from_f64(v).unwrap();
        Bar {
            open: d(close),
            high: d(close + 0.5),
            low: d(close - 0.5),
            close: d(close),
            volume: d(1.0),
            ts_event: 0,
            ts_init: 0,
        }
    }

    #[test]
    fn warms_up_and_plans_both_sides() {
        let mut planner = GridPlanner::new(&fast_cfg());
        assert!(!planner.is_warm());
        for _ in 0..10 {
            planner.on_bar(&bar(100.0));
        }
        assert!(planner.is_warm());

        let ladders = planner.build_ladders(dec!(100));
        assert_eq!(ladders.len(), 2);
        assert_eq!(ladders[0].len(), 2);
        assert_eq!(ladders[1].len(), 2);
    }

    #[test]
    fn shaping_applies_policy_then_funding() {
        let mut cfg = fast_cfg();
        cfg.grid.n_rungs = 4;
        cfg.policy.short_keep_levels = 1;
        let mut planner = GridPlanner::new(&cfg);
        // Strong rise: regime UP thins the short side.
        let mut price = 100.0;
        for _ in 0..15 {
            price *= 1.01;
            planner.on_bar(&bar(price));
        }
        assert_eq!(planner.regime(), Regime::Up);

        let ladders = planner.build_ladders(Decimal::from_f64(price).unwrap());
        let shaped = planner.shape_ladders(ladders, 0);
        assert_eq!(shaped[0].len(), 4);
        assert_eq!(shaped[1].len(), 1);

        // Funding kicks in on top: longs pay, long side suppressed.
        planner.on_funding_update(0.001, 10 * 60 * 1_000_000_000);
        let ladders = planner.build_ladders(Decimal::from_f64(price).unwrap());
        let shaped = planner.shape_ladders(ladders, 5 * 60 * 1_000_000_000);
        assert!(shaped[0].is_empty());
        assert_eq!(shaped[1].len(), 1);
    }

    #[test]
    fn recenter_delegates_to_grid_engine() {
        let planner = GridPlanner::new(&fast_cfg());
        assert!(planner.recenter_needed(dec!(100), Decimal::ZERO));
        assert!(!planner.recenter_needed(dec!(100.5), dec!(100)));
        assert!(planner.recenter_needed(dec!(102), dec!(100)));
    }
}
