//! Strategy controller: orchestrates planning, reconciliation, execution
//! and risk on every bar and every order event.
//!
//! The controller is logically single-threaded - the host serialises bar
//! and event callbacks - while operator threads read and mutate through
//! the lock-protected [`OpsHandle`](crate::engine::ops::OpsHandle)
//! surface. Callbacks never propagate errors to the host: failures degrade
//! to the critical-error handler, which cancels everything and pauses.

use crate::config::HedgeGridConfig;
use crate::core::errors::DomainError;
use crate::core::ids::{is_exit_order_id, OrderIdGenerator};
use crate::core::types::{
    Bar, EngineMode, InstrumentId, Ladder, MarkPriceUpdate, OrderStatus, Side,
};
use crate::engine::ops::{LadderSnapshot, OpsHandle, SharedOps};
use crate::engine::order_events::{PendingRetries, RejectionLog};
use crate::engine::traits::{AccountBalance, Clock, LadderPlanner, OrderGateway, PositionCache};
use crate::execution::order_diff::OrderDiff;
use crate::execution::precision::{InstrumentPrecision, PrecisionGuard};
use crate::execution::retry::PostOnlyRetryHandler;
use crate::execution::types::{CreateIntent, DiffResult, LiveOrder, OrderIntent, OrderMeta};
use crate::monitoring::metrics::MetricsSnapshot;
use crate::persistence::{StateStore, StrategyState};
use crate::risk::{CircuitBreaker, DrawdownGuard, DrawdownVerdict, ExposureValidator};
use anyhow::Result;
use chrono::DateTime;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Interval between diagnostic log lines (clock time).
const DIAGNOSTIC_LOG_INTERVAL_NS: i64 = 300_000_000_000;

/// Per-instrument hedge-grid controller.
pub struct Controller<P, G, C>
where
    P: LadderPlanner,
    G: OrderGateway,
    C: PositionCache,
{
    pub(crate) cfg: HedgeGridConfig,
    pub(crate) instrument_id: InstrumentId,
    pub(crate) mode: EngineMode,
    pub(crate) settlement_currency: String,

    pub(crate) precision: PrecisionGuard,
    pub(crate) planner: P,
    pub(crate) gateway: G,
    pub(crate) positions: C,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) store: Box<dyn StateStore>,

    pub(crate) ids: Arc<OrderIdGenerator>,
    pub(crate) order_diff: OrderDiff,
    pub(crate) retry_handler: PostOnlyRetryHandler,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) drawdown: DrawdownGuard,
    pub(crate) exposure: ExposureValidator,

    // Grid state
    pub(crate) center: Decimal,
    pub(crate) last_mid: Option<Decimal>,
    pub(crate) last_funding_rate: f64,
    pub(crate) last_bar_ts_ns: Option<i64>,
    pub(crate) positions_reconciled: bool,
    pub(crate) start_time_ns: Option<i64>,
    pub(crate) last_balance_check_ns: i64,
    pub(crate) last_balance: Option<AccountBalance>,
    pub(crate) last_diagnostic_log_ns: i64,

    // Fill statistics and PnL
    pub(crate) total_fills: u64,
    pub(crate) maker_fills: u64,
    pub(crate) unprotected_fills: u64,
    pub(crate) realized_pnl: f64,

    // Shared structures, one lock per structure; the trading thread is
    // the only mutator of the plain fields above
    pub(crate) grid_orders_cache: DashMap<String, LiveOrder>,
    pub(crate) pending_submits: HashMap<String, CreateIntent>,
    pub(crate) pending_retries: Mutex<PendingRetries>,
    pub(crate) deferred_retries: Vec<(i64, CreateIntent)>,
    pub(crate) processed_rejections: Mutex<RejectionLog>,
    pub(crate) fills_with_exits: Arc<Mutex<HashSet<String>>>,
    pub(crate) tp_sl_pairs: Mutex<HashMap<String, (String, String)>>,
    pub(crate) position_retry_counts: HashMap<String, u32>,
    pub(crate) shared: Arc<SharedOps>,
}

impl<P, G, C> Controller<P, G, C>
where
    P: LadderPlanner,
    G: OrderGateway,
    C: PositionCache,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: HedgeGridConfig,
        instrument_id: InstrumentId,
        strategy_name: &str,
        precision: InstrumentPrecision,
        mode: EngineMode,
        settlement_currency: impl Into<String>,
        planner: P,
        gateway: G,
        positions: C,
        clock: Box<dyn Clock>,
        store: Box<dyn StateStore>,
    ) -> Result<Self, DomainError> {
        let ids = Arc::new(OrderIdGenerator::new(strategy_name)?);
        let precision_guard = PrecisionGuard::new(precision);

        let order_diff = OrderDiff::new(
            ids.clone(),
            precision_guard.clone(),
            cfg.execution.order_diff_price_tolerance_bps,
            cfg.execution.order_diff_qty_tolerance_pct,
        )?;
        let retry_handler = PostOnlyRetryHandler::new(
            precision_guard.clone(),
            cfg.execution.retry_attempts,
            cfg.execution.use_post_only_retries,
        );
        let breaker = CircuitBreaker::new(
            cfg.risk.circuit_breaker_window_seconds,
            cfg.risk.max_errors_per_minute,
            cfg.risk.circuit_breaker_cooldown_seconds,
            cfg.risk.enable_circuit_breaker,
        );
        let drawdown = DrawdownGuard::new(
            cfg.risk.max_drawdown_pct,
            cfg.risk.enable_drawdown_protection,
        );
        let exposure = ExposureValidator::new(
            cfg.position.max_position_pct,
            cfg.risk.enable_position_validation,
        );

        // Optimization hosts flag themselves through config; quiet logs
        // and no persistence apply regardless of the mode they pass.
        let mode = if cfg.execution.optimization_mode {
            EngineMode::Optimization
        } else {
            mode
        };

        Ok(Self {
            cfg,
            instrument_id,
            mode,
            settlement_currency: settlement_currency.into(),
            precision: precision_guard,
            planner,
            gateway,
            positions,
            clock,
            store,
            ids,
            order_diff,
            retry_handler,
            breaker,
            drawdown,
            exposure,
            center: Decimal::ZERO,
            last_mid: None,
            last_funding_rate: 0.0,
            last_bar_ts_ns: None,
            positions_reconciled: false,
            start_time_ns: None,
            last_balance_check_ns: 0,
            last_balance: None,
            last_diagnostic_log_ns: 0,
            total_fills: 0,
            maker_fills: 0,
            unprotected_fills: 0,
            realized_pnl: 0.0,
            grid_orders_cache: DashMap::new(),
            pending_submits: HashMap::new(),
            pending_retries: Mutex::new(PendingRetries::new()),
            deferred_retries: Vec::new(),
            processed_rejections: Mutex::new(RejectionLog::new()),
            fills_with_exits: Arc::new(Mutex::new(HashSet::new())),
            tp_sl_pairs: Mutex::new(HashMap::new()),
            position_retry_counts: HashMap::new(),
            shared: Arc::new(SharedOps::new()),
        })
    }

    /// Operator control surface; cloneable, safe to hand to other threads.
    pub fn ops_handle(&self) -> OpsHandle {
        OpsHandle::new(self.shared.clone())
    }

    #[inline]
    pub fn strategy_name(&self) -> &str {
        self.ids.strategy()
    }

    #[inline]
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    #[inline]
    pub fn grid_center(&self) -> Decimal {
        self.center
    }

    /// Startup sequence: hydrate the live-order cache from the exchange,
    /// load persisted state, and consume warm-up bars (which produce no
    /// orders).
    pub fn start(&mut self, warmup_bars: &[Bar]) {
        info!(
            instrument = %self.instrument_id,
            strategy = self.ids.strategy(),
            mode = ?self.mode,
            "starting hedge-grid controller"
        );

        self.hydrate_grid_orders_cache();
        self.load_state();

        if !warmup_bars.is_empty() {
            info!(bars = warmup_bars.len(), "warming up regime detector");
            for bar in warmup_bars {
                self.planner.on_bar(bar);
            }
            info!(
                warm = self.planner.is_warm(),
                regime = %self.planner.regime(),
                "warmup complete"
            );
        } else if self.mode.is_live() {
            warn!("no warmup bars provided; detector warms up from live bars");
        }

        self.start_time_ns = Some(self.clock.now_ns());
    }

    /// Clean shutdown: cancel open strategy orders and persist state.
    /// Positions are left open.
    pub fn stop(&mut self) {
        info!("stopping hedge-grid controller");
        let cancelled = self.cancel_all_strategy_orders();
        if cancelled > 0 {
            info!(cancelled, "cancelled open orders on stop");
        }
        self.save_state();
    }

    /// Bar callback. Never propagates errors to the host.
    pub fn on_bar(&mut self, bar: &Bar) {
        if let Err(e) = self.handle_bar(bar) {
            error!(error = %e, "unrecoverable error in bar handler");
            self.handle_critical_error();
        }
    }

    /// Mark price callback feeding the funding guard.
    pub fn on_mark_price(&mut self, update: &MarkPriceUpdate) {
        self.last_funding_rate = update.funding_rate;
        self.planner
            .on_funding_update(update.funding_rate, update.next_funding_time_ns);
    }

    fn handle_bar(&mut self, bar: &Bar) -> Result<()> {
        if self.shared.critical_error.load(Ordering::SeqCst) {
            return Ok(());
        }

        // Operator requests run even while paused: flatten must still be
        // honoured after a kill switch.
        self.process_ops_requests();
        if self.shared.pause_trading.load(Ordering::SeqCst) {
            return Ok(());
        }

        // Drawdown gate runs unconditionally, even during warmup, to catch
        // pre-existing drawdown at startup.
        self.check_drawdown();
        if self.shared.pause_trading.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.last_bar_ts_ns = Some(bar.ts_init);

        // Stale bars are observed but never acted on (live only).
        if self.mode.is_live() && self.cfg.execution.max_bar_staleness_seconds > 0 {
            let age_ns = self.clock.now_ns() - bar.ts_init;
            let max_ns = (self.cfg.execution.max_bar_staleness_seconds as i64) * 1_000_000_000;
            if age_ns > max_ns {
                warn!(
                    age_s = age_ns / 1_000_000_000,
                    max_s = self.cfg.execution.max_bar_staleness_seconds,
                    "bar data stale, skipping order placement"
                );
                return Ok(());
            }
        }

        let mid = bar.close;
        self.last_mid = Some(mid);

        self.planner.on_bar(bar);
        let regime = self.planner.regime();

        if !self.mode.is_quiet() {
            info!(close = %mid, %regime, warm = self.planner.is_warm(), "bar");
        }

        if !self.planner.is_warm() {
            return Ok(());
        }

        if self.breaker.is_active() {
            let now = self.clock.now_ns();
            let still_active = self.breaker.poll(now);
            self.shared
                .circuit_breaker_active
                .store(still_active, Ordering::SeqCst);
            if still_active {
                debug!("circuit breaker active, skipping bar");
                return Ok(());
            }
        }

        self.drain_deferred_retries();

        let recenter_needed = self.planner.recenter_needed(mid, self.center);

        // One-shot: protect positions surviving from a previous session.
        // When a recenter is about to run (always the case on the first
        // bar, center starts at zero) that path owns the reconciliation,
        // so the exit pair is not submitted twice.
        if !self.positions_reconciled && !recenter_needed {
            self.reconcile_positions(mid);
        }

        if recenter_needed {
            info!(%mid, old_center = %self.center, "grid recenter triggered");
            let cancelled_exits = self.cancel_all_exit_orders();
            let stale_keys = {
                let mut fills = self.fills_with_exits.lock();
                let n = fills.len();
                fills.clear();
                n
            };
            self.tp_sl_pairs.lock().clear();
            if stale_keys > 0 || cancelled_exits > 0 {
                info!(
                    stale_keys,
                    cancelled_exits, "cleared exit tracking on recenter"
                );
            }
            self.center = mid;
            self.order_diff.invalidate_cache();
            // Re-attach exits to surviving positions with no one-bar gap.
            self.reconcile_positions(mid);
        }

        let ladders = self.planner.build_ladders(self.center);
        self.snapshot_ladders(&ladders);

        let now_ns = self.clock.now_ns();
        let mut ladders = self.planner.shape_ladders(ladders, now_ns);

        let throttle = self.shared.ops.lock().throttle;
        if throttle < 1.0 {
            let factor = Decimal::from_f64(throttle).unwrap_or(Decimal::ZERO);
            ladders = ladders.into_iter().map(|l| l.scale_qty(factor)).collect();
        }

        let ladders: Vec<Ladder> = ladders
            .into_iter()
            .map(|l| l.filter_placeable(mid))
            .collect();

        let live = self.live_grid_orders();
        let diff = self
            .order_diff
            .diff(&ladders, &live, self.clock.now_ms());

        if !self.mode.is_quiet() {
            info!(
                adds = diff.adds.len(),
                cancels = diff.cancels.len(),
                replaces = diff.replaces.len(),
                "diff result"
            );
        }

        self.execute_diff(diff);
        self.publish_metrics();
        self.maybe_log_diagnostics();

        Ok(())
    }

    /// Apply pending operator requests (kill switch, flatten).
    fn process_ops_requests(&mut self) {
        let (flatten, kill) = {
            let mut ops = self.shared.ops.lock();
            let flatten = ops.flatten_requested;
            ops.flatten_requested = false;
            (flatten, ops.kill_switch_engaged)
        };
        if flatten {
            warn!("executing operator flatten request");
            self.flatten_all();
            self.shared.pause_trading.store(true, Ordering::SeqCst);
        }
        if kill {
            self.shared.pause_trading.store(true, Ordering::SeqCst);
        }
    }

    /// Query balance at the configured interval and enforce the drawdown
    /// limit. A breach cancels everything, closes both positions, and
    /// latches the pause.
    fn check_drawdown(&mut self) {
        let now = self.clock.now_ns();
        let interval_ns = (self.cfg.execution.balance_check_interval_seconds as i64) * 1_000_000_000;
        if self.last_balance_check_ns != 0 && now - self.last_balance_check_ns < interval_ns {
            return;
        }
        self.last_balance_check_ns = now;

        let balance = match self.gateway.account_balance(&self.settlement_currency) {
            Some(b) => b,
            None => return,
        };
        self.last_balance = Some(balance);

        let total = balance.total.to_f64().unwrap_or(0.0);
        if let DrawdownVerdict::Breached { drawdown_pct } = self.drawdown.on_balance(total) {
            error!(drawdown_pct, "drawdown protection triggered");
            self.flatten_all();
            self.shared.drawdown_triggered.store(true, Ordering::SeqCst);
            self.shared.pause_trading.store(true, Ordering::SeqCst);
            self.save_state();
        }
    }

    /// Cancel all open strategy orders and submit reduce-only market
    /// closes for both hedge positions.
    pub(crate) fn flatten_all(&mut self) {
        warn!("flattening all positions");
        self.cancel_all_strategy_orders();

        for side in [Side::Long, Side::Short] {
            let pos = match self.positions.position(&self.instrument_id, side) {
                Some(p) if !p.is_flat() => p,
                _ => continue,
            };
            let cid = self
                .ids
                .next_grid_id(side, 0, self.clock.now_ms());
            let close = CreateIntent::new(
                cid,
                side,
                pos.avg_entry_px,
                pos.quantity,
                OrderMeta::market_close(),
            );
            info!(%side, qty = %pos.quantity, "closing position at market");
            if let Err(e) = self.gateway.submit(&OrderIntent::Create(close)) {
                error!(%side, error = %e, "failed to submit market close");
            }
        }
    }

    /// Cancel every open order carrying this strategy's id prefix.
    pub(crate) fn cancel_all_strategy_orders(&mut self) -> usize {
        let open = self.gateway.orders_open(self.ids.strategy());
        let mut cancelled = 0;
        for order in open {
            match self.gateway.cancel(&order.client_order_id) {
                Ok(()) => cancelled += 1,
                Err(e) => {
                    error!(cid = %order.client_order_id, error = %e, "cancel failed")
                }
            }
        }
        cancelled
    }

    /// Live grid orders from the internal mirror, sorted for determinism.
    pub(crate) fn live_grid_orders(&self) -> Vec<LiveOrder> {
        let mut orders: Vec<LiveOrder> = self
            .grid_orders_cache
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| a.client_order_id.cmp(&b.client_order_id));
        orders
    }

    fn execute_diff(&mut self, diff: DiffResult) {
        // Cancels and replaces reduce exposure; they pass unconditionally.
        for cancel in diff.cancels {
            if let Err(e) = self.gateway.cancel(&cancel.client_order_id) {
                warn!(cid = %cancel.client_order_id, error = %e, "cancel failed");
            }
        }
        for replace in diff.replaces {
            let mut intent = CreateIntent::new(
                replace.replace_with.clone(),
                replace.side,
                replace.price,
                replace.qty,
                replace.meta.clone(),
            );
            intent.original_price = Some(replace.price);
            self.track_submitted_create(&intent);
            if let Err(e) = self.gateway.submit(&OrderIntent::Replace(replace)) {
                warn!(error = %e, "replace failed");
            }
        }
        for add in diff.adds {
            self.submit_create(add);
        }
    }

    /// Pre-trade-validate and submit a create. Reduce-only intents skip
    /// the size gate.
    pub(crate) fn submit_create(&mut self, intent: CreateIntent) {
        if !intent.meta.reduce_only && !self.validate_exposure(&intent) {
            return;
        }
        self.track_submitted_create(&intent);
        if let Err(e) = self.gateway.submit(&OrderIntent::Create(intent.clone())) {
            warn!(cid = %intent.client_order_id, error = %e, "submit failed");
        }
    }

    /// Record an in-flight create: `pending_submits` feeds the live cache
    /// on acceptance, `pending_retries` feeds the post-only retry path.
    fn track_submitted_create(&mut self, intent: &CreateIntent) {
        self.pending_submits
            .insert(intent.client_order_id.clone(), intent.clone());
        if self.retry_handler.enabled()
            && intent.meta.post_only
            && !is_exit_order_id(&intent.client_order_id)
        {
            self.pending_retries.lock().insert(intent.clone());
        }
    }

    /// Cumulative exposure check. Fail-safe: anything that cannot be
    /// evaluated rejects the order.
    fn validate_exposure(&self, intent: &CreateIntent) -> bool {
        let existing = self
            .positions
            .position(&self.instrument_id, intent.side)
            .map(|p| p.notional())
            .unwrap_or(Decimal::ZERO);
        let pending: Decimal = self
            .grid_orders_cache
            .iter()
            .filter(|entry| entry.value().side == intent.side)
            .map(|entry| entry.value().price * entry.value().qty)
            .sum();
        let balance = self.gateway.account_balance(&self.settlement_currency);
        let verdict = self
            .exposure
            .check(intent.notional(), existing, pending, balance.as_ref());
        if !verdict.is_allowed() {
            warn!(cid = %intent.client_order_id, "pre-trade validation rejected create");
        }
        verdict.is_allowed()
    }

    /// Resubmit deferred retries whose delay has elapsed.
    pub(crate) fn drain_deferred_retries(&mut self) {
        if self.deferred_retries.is_empty() {
            return;
        }
        let now = self.clock.now_ns();
        let due: Vec<CreateIntent> = {
            let (ready, waiting): (Vec<_>, Vec<_>) = self
                .deferred_retries
                .drain(..)
                .partition(|(due_ns, _)| *due_ns <= now);
            self.deferred_retries = waiting;
            ready.into_iter().map(|(_, intent)| intent).collect()
        };
        for intent in due {
            self.submit_create(intent);
        }
    }

    /// Populate the grid cache from the exchange so the first bar after a
    /// restart does not double-place.
    fn hydrate_grid_orders_cache(&mut self) {
        let open = self.gateway.orders_open(self.ids.strategy());
        let mut hydrated = 0;
        for order in open {
            if is_exit_order_id(&order.client_order_id) {
                continue;
            }
            if crate::core::ids::parse_client_order_id(&order.client_order_id).is_err() {
                warn!(cid = %order.client_order_id, "could not hydrate order");
                continue;
            }
            if order.status == OrderStatus::Open {
                self.grid_orders_cache
                    .insert(order.client_order_id.clone(), order);
                hydrated += 1;
            }
        }
        if hydrated > 0 {
            info!(hydrated, "hydrated grid orders from exchange");
        }
    }

    pub(crate) fn load_state(&mut self) {
        if let Some(state) = self.store.load() {
            if state.peak_balance > 0.0 {
                self.drawdown.restore_peak(state.peak_balance);
            }
            self.realized_pnl = state.realized_pnl;
        }
    }

    pub(crate) fn save_state(&self) {
        let state = StrategyState {
            peak_balance: self.drawdown.peak_balance(),
            realized_pnl: self.realized_pnl,
            last_saved: rfc3339(self.clock.now_ns()),
            instrument_id: self.instrument_id.to_string(),
        };
        if let Err(e) = self.store.save(&state) {
            warn!(error = %e, "failed to persist strategy state");
        }
    }

    /// Cancel all open orders, latch the critical-error pause, and wait
    /// for the operator.
    pub(crate) fn handle_critical_error(&mut self) {
        error!("CRITICAL ERROR - entering safe mode");
        self.shared.critical_error.store(true, Ordering::SeqCst);
        self.shared.pause_trading.store(true, Ordering::SeqCst);
        let cancelled = self.cancel_all_strategy_orders();
        error!(
            cancelled,
            "critical error handler complete; manual intervention required"
        );
    }

    fn snapshot_ladders(&self, ladders: &[Ladder]) {
        let mut snap = LadderSnapshot {
            long: None,
            short: None,
            center: self.center,
            ts_ns: self.clock.now_ns(),
        };
        for ladder in ladders {
            match ladder.side() {
                Side::Long => snap.long = Some(ladder.clone()),
                Side::Short => snap.short = Some(ladder.clone()),
            }
        }
        *self.shared.ladders.lock() = snap;
    }

    /// Assemble and publish the per-bar metrics snapshot.
    fn publish_metrics(&self) {
        let inventory = |side: Side| -> f64 {
            self.positions
                .position(&self.instrument_id, side)
                .map(|p| p.notional().to_f64().unwrap_or(0.0))
                .unwrap_or(0.0)
        };
        let long_inventory = inventory(Side::Long);
        let short_inventory = inventory(Side::Short);

        let mut rungs_long = 0usize;
        let mut rungs_short = 0usize;
        for entry in self.grid_orders_cache.iter() {
            match entry.value().side {
                Side::Long => rungs_long += 1,
                Side::Short => rungs_short += 1,
            }
        }

        let uptime_seconds = self
            .start_time_ns
            .map(|start| (self.clock.now_ns() - start) as f64 / 1e9)
            .unwrap_or(0.0);

        let snap = MetricsSnapshot {
            account_balance: self
                .last_balance
                .map(|b| b.total.to_f64().unwrap_or(0.0))
                .unwrap_or(0.0),
            long_inventory,
            short_inventory,
            net_inventory: long_inventory - short_inventory,
            active_rungs_long: rungs_long,
            active_rungs_short: rungs_short,
            open_orders: self.grid_orders_cache.len(),
            total_fills: self.total_fills,
            maker_fills: self.maker_fills,
            maker_ratio: MetricsSnapshot::maker_ratio_of(self.total_fills, self.maker_fills),
            funding_rate: self.last_funding_rate,
            realized_pnl: self.realized_pnl,
            unprotected_fills: self.unprotected_fills,
            uptime_seconds,
            last_bar_ts_ns: self.last_bar_ts_ns.unwrap_or(0),
            throttle: self.shared.ops.lock().throttle,
            pause_trading: self.shared.pause_trading.load(Ordering::SeqCst),
            circuit_breaker_active: self.breaker.is_active(),
            drawdown_triggered: self.drawdown.is_triggered(),
        };
        *self.shared.metrics.lock() = snap;
    }

    fn maybe_log_diagnostics(&mut self) {
        let now = self.clock.now_ns();
        if now - self.last_diagnostic_log_ns < DIAGNOSTIC_LOG_INTERVAL_NS {
            return;
        }
        self.last_diagnostic_log_ns = now;
        info!(
            total_fills = self.total_fills,
            maker_fills = self.maker_fills,
            open_orders = self.grid_orders_cache.len(),
            pending_retries = self.pending_retries.lock().len(),
            realized_pnl = self.realized_pnl,
            center = %self.center,
            "diagnostic status"
        );
    }
}

fn rfc3339(ts_ns: i64) -> String {
    DateTime::from_timestamp(ts_ns.div_euclid(1_000_000_000), ts_ns.rem_euclid(1_000_000_000) as u32)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::rfc3339;

    #[test]
    fn rfc3339_renders_epoch_nanos() {
        let rendered = rfc3339(1_700_000_000_000_000_000);
        assert!(rendered.starts_with("2023-11-14T"));
    }

    #[test]
    fn rfc3339_zero_is_epoch() {
        assert!(rfc3339(0).starts_with("1970-01-01T"));
    }
}
