//! TP/SL exit lifecycle: creation on grid fills, OCO-like cancellation,
//! orphan cleanup, and position reconciliation on restart/recenter.
//!
//! Exit intents bypass the pre-trade size gate: they reduce exposure and
//! must be placed even while the drawdown latch or circuit breaker is
//! active; blocking them would leave positions unprotected.

use crate::core::ids::{fill_key, is_exit_order_id, parse_client_order_id, ExitKind};
use crate::core::types::{Position, Side};
use crate::engine::controller::Controller;
use crate::engine::traits::{LadderPlanner, OrderGateway, PositionCache};
use crate::execution::types::{CreateIntent, OrderIntent, OrderMeta};
use anyhow::Result;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Position-cache lag retries before a fill is left unprotected.
const MAX_POSITION_RETRIES: u32 = 3;

/// Existing-coverage tolerance when reconciling positions (rounding slack).
const COVERAGE_TOLERANCE: Decimal = dec!(0.95);

/// Claim on a fill key, released on drop unless committed.
///
/// Replaces exception-driven cleanup: every early return on the TP/SL
/// creation path releases the key so a later event can retry.
pub(crate) struct FillKeyClaim {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
    committed: bool,
}

impl FillKeyClaim {
    /// `None` when the key is already claimed (exits exist or are being
    /// created by a concurrent path).
    pub(crate) fn acquire(set: Arc<Mutex<HashSet<String>>>, key: String) -> Option<Self> {
        if !set.lock().insert(key.clone()) {
            return None;
        }
        Some(Self {
            set,
            key,
            committed: false,
        })
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for FillKeyClaim {
    fn drop(&mut self) {
        if !self.committed {
            self.set.lock().remove(&self.key);
        }
    }
}

impl<P, G, C> Controller<P, G, C>
where
    P: LadderPlanner,
    G: OrderGateway,
    C: PositionCache,
{
    /// Attach TP/SL to a freshly filled grid order.
    pub(crate) fn handle_grid_fill(
        &mut self,
        side: Side,
        level: u32,
        fill_px: Decimal,
        fill_qty: Decimal,
        ts_event: i64,
    ) -> Result<()> {
        let key = fill_key(side, level);
        let claim = match FillKeyClaim::acquire(self.fills_with_exits.clone(), key.clone()) {
            Some(claim) => claim,
            None => {
                debug!(fill_key = %key, "TP/SL already exist, skipping creation");
                return Ok(());
            }
        };

        let mid = match self.last_mid {
            Some(mid) => mid,
            None => {
                warn!(fill_key = %key, "no mid price yet, cannot create TP/SL");
                return Ok(());
            }
        };

        // Position updates can lag the fill event by a cycle; postpone a
        // bounded number of times, releasing the key each time so the next
        // event retries.
        let retry_key = format!("pos_retry_{key}");
        let position = self.positions.position(&self.instrument_id, side);
        let position = match position {
            Some(pos) if pos.quantity > Decimal::ZERO => pos,
            _ => {
                let count = self.position_retry_counts.get(&retry_key).copied().unwrap_or(0);
                if count < MAX_POSITION_RETRIES {
                    self.position_retry_counts.insert(retry_key, count + 1);
                    warn!(
                        fill_key = %key,
                        retry = count + 1,
                        max = MAX_POSITION_RETRIES,
                        "position not yet in cache, postponing TP/SL"
                    );
                } else {
                    error!(
                        fill_key = %key,
                        "position never appeared after {MAX_POSITION_RETRIES} retries; \
                         fill left unprotected until a later event succeeds"
                    );
                    self.position_retry_counts.remove(&retry_key);
                    self.unprotected_fills += 1;
                }
                return Ok(());
            }
        };
        self.position_retry_counts.remove(&retry_key);

        // The cached quantity must cover the fill (1% slack for rounding).
        if position.quantity < fill_qty && (fill_qty - position.quantity) > fill_qty * dec!(0.01) {
            warn!(
                fill_key = %key,
                pos_qty = %position.quantity,
                %fill_qty,
                "position smaller than fill, waiting for full update"
            );
            return Ok(());
        }

        let (tp_price, sl_price) = self.compute_exit_prices(side, fill_px, mid);
        info!(
            fill_key = %key,
            %fill_px, tp = %tp_price, sl = %sl_price,
            "creating exit orders"
        );

        self.submit_exit_pair(side, level, fill_qty, tp_price, sl_price, ts_event, claim)
    }

    /// TP above / SL below the fill for LONG, mirrored for SHORT, floored
    /// above zero and clamped to tick. The SL trigger is additionally kept
    /// clear of the mid by the configured buffer so a fresh stop cannot
    /// fire on the tick it is placed.
    pub(crate) fn compute_exit_prices(
        &self,
        side: Side,
        entry_px: Decimal,
        mid: Decimal,
    ) -> (Decimal, Decimal) {
        let step = mid * self.cfg.grid.grid_step_bps / dec!(10000);
        let tp_steps = Decimal::from(self.cfg.exit.tp_steps);
        let sl_steps = Decimal::from(self.cfg.exit.sl_steps);
        let buffer = mid * self.cfg.execution.tp_sl_adjustment_buffer_bps / dec!(10000);
        let positive_floor = entry_px * dec!(0.01);

        let (mut tp, mut sl) = match side {
            Side::Long => (entry_px + tp_steps * step, entry_px - sl_steps * step),
            Side::Short => (entry_px - tp_steps * step, entry_px + sl_steps * step),
        };
        if tp <= Decimal::ZERO {
            tp = positive_floor;
        }

        match side {
            Side::Long => sl = sl.min(mid - buffer),
            Side::Short => sl = sl.max(mid + buffer),
        }
        if sl <= Decimal::ZERO {
            sl = positive_floor;
        }

        (
            self.precision.clamp_price(tp),
            self.precision.clamp_price(sl),
        )
    }

    /// Submit TP (reduce-only limit) and SL (reduce-only stop-market) and
    /// register the OCO pair. The claim commits only when both legs are
    /// accepted by the gateway call.
    #[allow(clippy::too_many_arguments)]
    fn submit_exit_pair(
        &mut self,
        side: Side,
        level: u32,
        qty: Decimal,
        tp_price: Decimal,
        sl_price: Decimal,
        ts_event: i64,
        claim: FillKeyClaim,
    ) -> Result<()> {
        let ts_ms = ts_event / 1_000_000;
        let tp_cid = self.ids.next_exit_id(ExitKind::TakeProfit, side, level, ts_ms);
        let sl_cid = self.ids.next_exit_id(ExitKind::StopLoss, side, level, ts_ms);

        let tp_intent = CreateIntent::new(
            tp_cid.clone(),
            side,
            tp_price,
            qty,
            OrderMeta::take_profit(),
        );
        let sl_intent = CreateIntent::new(sl_cid.clone(), side, sl_price, qty, OrderMeta::stop_loss())
            .with_trigger(sl_price);

        if let Err(e) = self.gateway.submit(&OrderIntent::Create(tp_intent)) {
            error!(cid = %tp_cid, error = %e, "TP submit failed");
            return Ok(());
        }
        if let Err(e) = self.gateway.submit(&OrderIntent::Create(sl_intent)) {
            error!(cid = %sl_cid, error = %e, "SL submit failed, cancelling TP leg");
            let _ = self.gateway.cancel(&tp_cid);
            return Ok(());
        }

        self.tp_sl_pairs
            .lock()
            .insert(claim.key().to_string(), (tp_cid.clone(), sl_cid.clone()));
        info!(tp = %tp_cid, sl = %sl_cid, "submitted exit pair");
        claim.commit();
        Ok(())
    }

    /// An exit fill: realize PnL, release the fill key, cancel the OCO
    /// counterpart, and sweep leftovers if the position is flat.
    pub(crate) fn handle_exit_fill(&mut self, cid: &str, fill_px: Decimal, fill_qty: Decimal) {
        let parsed = match parse_client_order_id(cid) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(cid, error = %e, "could not parse exit order id");
                return;
            }
        };
        let kind = match parsed.exit {
            Some(kind) => kind,
            None => return,
        };
        info!(cid, %kind, px = %fill_px, qty = %fill_qty, "exit order filled");

        // Realize PnL against the average entry of the position being
        // closed; persist after each update.
        if let Some(pos) = self.positions.position(&self.instrument_id, parsed.side) {
            if pos.avg_entry_px > Decimal::ZERO {
                let delta = match parsed.side {
                    Side::Long => (fill_px - pos.avg_entry_px) * fill_qty,
                    Side::Short => (pos.avg_entry_px - fill_px) * fill_qty,
                };
                self.realized_pnl += delta.to_f64().unwrap_or(0.0);
                self.save_state();
            }
        }

        let key = fill_key(parsed.side, parsed.level);
        if self.fills_with_exits.lock().remove(&key) {
            info!(fill_key = %key, "level released for new TP/SL");
        }

        self.cancel_counterpart_exit(&key, kind);

        // If this exit flattened the position, remaining exit orders for
        // the side would open unwanted positions when triggered.
        let flat = self
            .positions
            .position(&self.instrument_id, parsed.side)
            .map_or(true, |p| p.is_flat());
        if flat {
            let orphans = self.cancel_exit_orders_for_side(parsed.side);
            if orphans > 0 {
                info!(
                    side = %parsed.side,
                    orphans, "position flat, cancelled remaining exit orders"
                );
            }
        }
    }

    /// OCO: one side filled, cancel the paired other side.
    pub(crate) fn cancel_counterpart_exit(&mut self, fill_key: &str, filled: ExitKind) {
        let pair = self.tp_sl_pairs.lock().remove(fill_key);
        let (tp_cid, sl_cid) = match pair {
            Some(pair) => pair,
            None => {
                debug!(fill_key, "no pair found, may have been cleared by recenter");
                return;
            }
        };
        let counterpart = match filled {
            ExitKind::TakeProfit => sl_cid,
            ExitKind::StopLoss => tp_cid,
        };

        let still_open = self
            .gateway
            .orders_open(&counterpart)
            .iter()
            .any(|o| o.client_order_id == counterpart && o.is_open());
        if still_open {
            match self.gateway.cancel(&counterpart) {
                Ok(()) => info!(
                    fill_key,
                    cancelled = %counterpart,
                    filled = %filled,
                    "cancelled orphaned counterpart exit"
                ),
                Err(e) => warn!(cid = %counterpart, error = %e, "counterpart cancel failed"),
            }
        } else {
            debug!(cid = %counterpart, "counterpart already closed, no cancel needed");
        }
    }

    /// Cancel all live TP/SL orders for one side; clears pair tracking.
    pub(crate) fn cancel_exit_orders_for_side(&mut self, side: Side) -> usize {
        let tp_pat = format!("-TP-{}", side.abbrev());
        let sl_pat = format!("-SL-{}", side.abbrev());
        let mut cancelled = 0;
        for order in self.gateway.orders_open(self.ids.strategy()) {
            let cid = &order.client_order_id;
            if cid.contains(&tp_pat) || cid.contains(&sl_pat) {
                match self.gateway.cancel(cid) {
                    Ok(()) => {
                        cancelled += 1;
                        info!(%cid, "cancelled exit order for flat position");
                    }
                    Err(e) => error!(%cid, error = %e, "exit cancel failed"),
                }
            }
        }
        if cancelled > 0 {
            let side_name = side.to_string();
            self.tp_sl_pairs
                .lock()
                .retain(|key, _| !key.starts_with(&side_name));
        }
        cancelled
    }

    /// Cancel every live TP/SL order (grid recenter sweep).
    pub(crate) fn cancel_all_exit_orders(&mut self) -> usize {
        let mut cancelled = 0;
        for order in self.gateway.orders_open(self.ids.strategy()) {
            if is_exit_order_id(&order.client_order_id) {
                match self.gateway.cancel(&order.client_order_id) {
                    Ok(()) => {
                        cancelled += 1;
                        debug!(cid = %order.client_order_id, "cancelled exit order on recenter");
                    }
                    Err(e) => {
                        error!(cid = %order.client_order_id, error = %e, "exit cancel failed")
                    }
                }
            }
        }
        cancelled
    }

    /// Attach missing TP/SL to positions that survived a restart or a
    /// recenter. Existing coverage is the per-side minimum of resting TP
    /// and SL quantity, accepted within a 5% tolerance; only the gap gets
    /// new exits, registered at the reserved level 0.
    pub(crate) fn reconcile_positions(&mut self, mid: Decimal) {
        self.positions_reconciled = true;

        for side in [Side::Long, Side::Short] {
            let position = match self.positions.position(&self.instrument_id, side) {
                Some(pos) if !pos.is_flat() => pos,
                _ => continue,
            };
            self.reconcile_side(side, &position, mid);
        }
    }

    fn reconcile_side(&mut self, side: Side, position: &Position, mid: Decimal) {
        let tp_pat = format!("-TP-{}", side.abbrev());
        let sl_pat = format!("-SL-{}", side.abbrev());
        let open = self.gateway.orders_open(self.ids.strategy());
        let tp_total: Decimal = open
            .iter()
            .filter(|o| o.client_order_id.contains(&tp_pat))
            .map(|o| o.qty)
            .sum();
        let sl_total: Decimal = open
            .iter()
            .filter(|o| o.client_order_id.contains(&sl_pat))
            .map(|o| o.qty)
            .sum();
        let min_coverage = tp_total.min(sl_total);

        if min_coverage >= position.quantity * COVERAGE_TOLERANCE {
            info!(
                %side,
                qty = %position.quantity,
                tp_coverage = %tp_total,
                sl_coverage = %sl_total,
                "position fully covered by existing exits"
            );
            return;
        }

        let gap_qty = position.quantity - min_coverage;
        let (tp_price, sl_price) = self.compute_exit_prices(side, position.avg_entry_px, mid);
        info!(
            %side,
            qty = %position.quantity,
            %gap_qty,
            entry = %position.avg_entry_px,
            tp = %tp_price,
            sl = %sl_price,
            "attaching exits to pre-existing position"
        );

        let key = fill_key(side, 0);
        // Level 0 is singular per side: replace any previous claim/pair.
        self.fills_with_exits.lock().insert(key.clone());
        let ts_event = self.clock.now_ns();
        let claim = FillKeyClaim {
            set: self.fills_with_exits.clone(),
            key,
            committed: false,
        };
        if let Err(e) = self.submit_exit_pair(side, 0, gap_qty, tp_price, sl_price, ts_event, claim)
        {
            warn!(%side, error = %e, "reconcile exit submission failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_releases_on_drop() {
        let set = Arc::new(Mutex::new(HashSet::new()));
        {
            let claim = FillKeyClaim::acquire(set.clone(), "LONG-1".to_string()).unwrap();
            assert!(set.lock().contains("LONG-1"));
            drop(claim);
        }
        assert!(!set.lock().contains("LONG-1"));
    }

    #[test]
    fn claim_persists_after_commit() {
        let set = Arc::new(Mutex::new(HashSet::new()));
        let claim = FillKeyClaim::acquire(set.clone(), "LONG-1".to_string()).unwrap();
        claim.commit();
        assert!(set.lock().contains("LONG-1"));
    }

    #[test]
    fn second_claim_on_same_key_is_refused() {
        let set = Arc::new(Mutex::new(HashSet::new()));
        let first = FillKeyClaim::acquire(set.clone(), "SHORT-2".to_string()).unwrap();
        assert!(FillKeyClaim::acquire(set.clone(), "SHORT-2".to_string()).is_none());
        drop(first);
        assert!(FillKeyClaim::acquire(set, "SHORT-2".to_string()).is_some());
    }
}
