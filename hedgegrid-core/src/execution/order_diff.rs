//! Order reconciliation between desired ladder state and live orders.
//!
//! The diff engine emits the minimal operation set (create / cancel /
//! replace) that transitions the live order set into a precision-clamped
//! projection of the desired ladders. Matching correlates by (side, level)
//! parsed from the client order id, with tolerance-based price/qty
//! comparison to avoid churn.

use crate::core::errors::DomainError;
use crate::core::ids::{parse_client_order_id, OrderIdGenerator};
use crate::core::types::{Ladder, Rung, Side};
use crate::execution::precision::PrecisionGuard;
use crate::execution::types::{
    CancelIntent, CreateIntent, DiffResult, LiveOrder, OrderMeta, ReplaceIntent,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Tolerance-based comparison of desired rungs against live orders.
#[derive(Debug, Clone)]
pub struct OrderMatcher {
    price_tolerance_bps: Decimal,
    qty_tolerance_pct: Decimal,
}

impl OrderMatcher {
    pub fn new(
        price_tolerance_bps: Decimal,
        qty_tolerance_pct: Decimal,
    ) -> Result<Self, DomainError> {
        if price_tolerance_bps < Decimal::ZERO {
            return Err(DomainError::InvalidTolerance(format!(
                "price_tolerance_bps must be non-negative, got {price_tolerance_bps}"
            )));
        }
        if qty_tolerance_pct < Decimal::ZERO {
            return Err(DomainError::InvalidTolerance(format!(
                "qty_tolerance_pct must be non-negative, got {qty_tolerance_pct}"
            )));
        }
        Ok(Self {
            price_tolerance_bps,
            qty_tolerance_pct,
        })
    }

    /// Relative price difference in bps (live denominator) within tolerance.
    pub fn match_price(&self, desired: Decimal, live: Decimal) -> bool {
        if live == Decimal::ZERO {
            return false;
        }
        let diff_bps = ((desired - live) / live).abs() * dec!(10000);
        diff_bps <= self.price_tolerance_bps
    }

    /// Relative quantity difference (live denominator) within tolerance.
    pub fn match_qty(&self, desired: Decimal, live: Decimal) -> bool {
        if live == Decimal::ZERO {
            return false;
        }
        ((desired - live) / live).abs() <= self.qty_tolerance_pct
    }

    /// Side identity is strict; price and qty use tolerances.
    pub fn matches(&self, desired: &Rung, live: &LiveOrder) -> bool {
        desired.side == live.side
            && self.match_price(desired.price, live.price)
            && self.match_qty(desired.qty, live.qty)
    }
}

/// Diff engine reconciling desired ladders against live exchange orders.
pub struct OrderDiff {
    ids: Arc<OrderIdGenerator>,
    precision_guard: PrecisionGuard,
    matcher: OrderMatcher,

    // Content-hash cache; purely an optimisation, correctness never
    // depends on a hit.
    last_desired_hash: Option<u64>,
    last_live_hash: Option<u64>,
    last_result: Option<DiffResult>,
}

impl OrderDiff {
    pub fn new(
        ids: Arc<OrderIdGenerator>,
        precision_guard: PrecisionGuard,
        price_tolerance_bps: Decimal,
        qty_tolerance_pct: Decimal,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            ids,
            precision_guard,
            matcher: OrderMatcher::new(price_tolerance_bps, qty_tolerance_pct)?,
            last_desired_hash: None,
            last_live_hash: None,
            last_result: None,
        })
    }

    /// Generate the minimal operation set for `desired` vs `live`.
    ///
    /// Iteration is deterministic: desired rungs in ladder insertion order
    /// (levels ascending from 1), cancels in `live` order. Running the diff
    /// twice over unchanged inputs yields an empty result.
    pub fn diff(&mut self, desired: &[Ladder], live: &[LiveOrder], ts_ms: i64) -> DiffResult {
        let desired_hash = hash_of(desired);
        let live_hash = hash_of(live);
        if self.last_desired_hash == Some(desired_hash)
            && self.last_live_hash == Some(live_hash)
        {
            if let Some(cached) = &self.last_result {
                debug!("order diff cache hit");
                return cached.clone();
            }
        }

        // Assign ids by (side, level) and clamp to venue precision;
        // rungs the guard refuses never become adds.
        let mut valid_desired: Vec<(String, u32, Rung)> = Vec::new();
        for ladder in desired {
            for (idx, rung) in ladder.iter().enumerate() {
                let level = (idx + 1) as u32;
                if let Some(clamped) = self.precision_guard.clamp_rung(rung) {
                    let cid = self.ids.next_grid_id(rung.side, level, ts_ms);
                    valid_desired.push((cid, level, clamped));
                }
            }
        }

        // Index OPEN live orders by (side, level); unparseable ids stay
        // unmatched and are swept by the cancel pass.
        let open_live: Vec<&LiveOrder> = live.iter().filter(|o| o.is_open()).collect();
        let mut live_by_level_side: HashMap<(Side, u32), &LiveOrder> = HashMap::new();
        for &order in &open_live {
            if let Ok(parsed) = parse_client_order_id(&order.client_order_id) {
                if parsed.exit.is_none() {
                    live_by_level_side.insert((parsed.side, parsed.level), order);
                }
            }
        }

        let mut matched_live_ids: HashSet<&str> = HashSet::new();
        let mut result = DiffResult::default();

        for (cid, level, rung) in &valid_desired {
            let key = (rung.side, *level);
            match live_by_level_side.get(&key).copied() {
                Some(live_order) => {
                    matched_live_ids.insert(live_order.client_order_id.as_str());
                    if !self.matcher.matches(rung, live_order) {
                        let replace_with = self.ids.next_grid_id(rung.side, *level, ts_ms);
                        result.replaces.push(ReplaceIntent {
                            client_order_id: live_order.client_order_id.clone(),
                            replace_with,
                            side: rung.side,
                            price: rung.price,
                            qty: rung.qty,
                            meta: OrderMeta::grid(rung.tag.clone()),
                        });
                    }
                }
                None => {
                    let mut intent = CreateIntent::new(
                        cid.clone(),
                        rung.side,
                        rung.price,
                        rung.qty,
                        OrderMeta::grid(rung.tag.clone()),
                    );
                    intent.original_price = Some(rung.price);
                    result.adds.push(intent);
                }
            }
        }

        for order in &open_live {
            if !matched_live_ids.contains(order.client_order_id.as_str()) {
                result
                    .cancels
                    .push(CancelIntent::new(order.client_order_id.clone()));
            }
        }

        self.last_desired_hash = Some(desired_hash);
        self.last_live_hash = Some(live_hash);
        self.last_result = Some(result.clone());

        result
    }

    /// Drop the cached result (e.g. after a recenter invalidates state).
    pub fn invalidate_cache(&mut self) {
        self.last_desired_hash = None;
        self.last_live_hash = None;
        self.last_result = None;
    }
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
