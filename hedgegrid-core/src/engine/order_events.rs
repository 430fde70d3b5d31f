//! Order lifecycle event handling.
//!
//! Per client-order-id state machine:
//!
//! ```text
//! PENDING_SUBMIT ──▶ OPEN ──▶ CANCELED | EXPIRED | FILLED
//!        │                          ▲
//!        └── REJECTED ── retryable ─┘ (new id, price backed off)
//!                └────── terminal: abandon, feed circuit breaker
//! ```
//!
//! The exchange event stream is the authoritative truth; the internal
//! grid-order cache only mirrors it.

use crate::core::ids::{fill_key, is_exit_order_id, parse_client_order_id, retry_order_id};
use crate::core::types::LiquiditySide;
use crate::engine::controller::Controller;
use crate::engine::traits::{LadderPlanner, OrderGateway, PositionCache};
use crate::execution::types::{CreateIntent, OrderEvent};
use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::Ordering;
use tracing::{debug, error, info, warn};

/// Retry queue bound; oldest entries are evicted on overflow.
const PENDING_RETRIES_CAP: usize = 50;

/// Rejection idempotency set bound (ring eviction).
const PROCESSED_REJECTIONS_CAP: usize = 100;

/// Insertion-ordered, bounded map of in-flight retryable creates.
pub(crate) struct PendingRetries {
    map: HashMap<String, CreateIntent>,
    order: VecDeque<String>,
}

impl PendingRetries {
    pub(crate) fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn insert(&mut self, intent: CreateIntent) {
        let cid = intent.client_order_id.clone();
        if self.map.insert(cid.clone(), intent).is_none() {
            self.order.push_back(cid);
            while self.map.len() > PENDING_RETRIES_CAP {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                } else {
                    break;
                }
            }
        }
    }

    pub(crate) fn remove(&mut self, cid: &str) -> Option<CreateIntent> {
        let removed = self.map.remove(cid);
        if removed.is_some() {
            self.order.retain(|k| k != cid);
        }
        removed
    }

    pub(crate) fn get(&self, cid: &str) -> Option<&CreateIntent> {
        self.map.get(cid)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// Bounded set of processed `(cid, ts_event)` rejection keys.
pub(crate) struct RejectionLog {
    seen: HashSet<String>,
    ring: VecDeque<String>,
}

impl RejectionLog {
    pub(crate) fn new() -> Self {
        Self {
            seen: HashSet::new(),
            ring: VecDeque::new(),
        }
    }

    /// Returns `false` when the key was already processed.
    pub(crate) fn insert(&mut self, key: String) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.ring.push_back(key);
        while self.ring.len() > PROCESSED_REJECTIONS_CAP {
            if let Some(oldest) = self.ring.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

impl<P, G, C> Controller<P, G, C>
where
    P: LadderPlanner,
    G: OrderGateway,
    C: PositionCache,
{
    /// Gateway event callback. Never propagates errors to the host.
    pub fn on_order_event(&mut self, event: &OrderEvent) {
        let result = match event {
            OrderEvent::Accepted {
                client_order_id, ..
            } => {
                self.handle_accepted(client_order_id);
                Ok(())
            }
            OrderEvent::Canceled {
                client_order_id, ..
            } => {
                self.handle_canceled(client_order_id);
                Ok(())
            }
            OrderEvent::Expired {
                client_order_id, ..
            } => {
                self.handle_expired(client_order_id);
                Ok(())
            }
            OrderEvent::Rejected {
                client_order_id,
                reason,
                ts_event,
            } => {
                self.handle_rejected(client_order_id, reason, *ts_event);
                Ok(())
            }
            OrderEvent::Denied {
                client_order_id,
                reason,
            } => {
                self.handle_denied(client_order_id, reason);
                Ok(())
            }
            OrderEvent::CancelRejected {
                client_order_id,
                reason,
            } => {
                self.handle_cancel_rejected(client_order_id, reason);
                Ok(())
            }
            OrderEvent::Filled {
                client_order_id,
                last_px,
                last_qty,
                liquidity,
                ts_event,
            } => self.handle_filled(client_order_id, *last_px, *last_qty, *liquidity, *ts_event),
        };
        if let Err(e) = result {
            error!(error = %e, "unrecoverable error in event handler");
            self.handle_critical_error();
        }
        self.drain_deferred_retries();
    }

    fn handle_accepted(&mut self, cid: &str) {
        if let Some(intent) = self.pending_retries.lock().remove(cid) {
            if intent.retry_count > 0 {
                info!(
                    cid,
                    retries = intent.retry_count,
                    original_price = ?intent.original_price,
                    final_price = %intent.price,
                    "order accepted after retries"
                );
            }
        }
        self.retry_handler.clear_history(cid);

        if !cid.starts_with(self.ids.strategy()) {
            return;
        }

        if is_exit_order_id(cid) {
            info!(cid, "exit order accepted");
            return;
        }

        debug!(cid, "grid order accepted");
        if let Some(intent) = self.pending_submits.remove(cid) {
            // Only resting limits enter the diffable mirror; market closes
            // never rest.
            if !intent.meta.reduce_only {
                match crate::execution::types::LiveOrder::new(
                    cid,
                    intent.side,
                    intent.price,
                    intent.qty,
                    crate::core::types::OrderStatus::Open,
                ) {
                    Ok(live) => {
                        self.grid_orders_cache.insert(cid.to_string(), live);
                    }
                    Err(e) => warn!(cid, error = %e, "could not cache accepted order"),
                }
            }
        }
    }

    fn handle_canceled(&mut self, cid: &str) {
        if !cid.starts_with(self.ids.strategy()) {
            return;
        }
        debug!(cid, "order canceled");
        self.pending_submits.remove(cid);
        if !is_exit_order_id(cid) {
            self.grid_orders_cache.remove(cid);
        }
    }

    fn handle_expired(&mut self, cid: &str) {
        if !cid.starts_with(self.ids.strategy()) {
            return;
        }
        info!(cid, "order expired");
        self.pending_submits.remove(cid);
        if !is_exit_order_id(cid) {
            if self.grid_orders_cache.remove(cid).is_some() {
                info!(cid, "evicted expired order from grid cache");
            }
        }
        if self.pending_retries.lock().remove(cid).is_some() {
            self.retry_handler.clear_history(cid);
        }
    }

    fn handle_rejected(&mut self, cid: &str, reason: &str, ts_event: i64) {
        // Idempotency: the venue may replay the same rejection.
        let key = format!("{cid}_{ts_event}");
        if !self.processed_rejections.lock().insert(key) {
            return;
        }

        self.pending_submits.remove(cid);

        if is_exit_order_id(cid) {
            error!(cid, reason, "exit order rejected");
            // Release the fill key so the next event can reattempt TP/SL.
            if let Ok(parsed) = parse_client_order_id(cid) {
                let key = fill_key(parsed.side, parsed.level);
                if self.fills_with_exits.lock().remove(&key) {
                    info!(fill_key = %key, "released fill key for exit retry");
                }
            }
        } else {
            warn!(cid, reason, "grid order rejected");
            self.try_schedule_retry(cid, reason);
        }

        // Every rejection feeds the breaker, retryable or not.
        let now = self.clock.now_ns();
        if self.breaker.record_error(now) {
            self.cancel_all_strategy_orders();
        }
        self.shared
            .circuit_breaker_active
            .store(self.breaker.is_active(), Ordering::SeqCst);
    }

    /// Post-only retry path: price backs off one tick per attempt, the id
    /// gains a `-R{n}` suffix, and the attempt count is bounded.
    fn try_schedule_retry(&mut self, cid: &str, reason: &str) {
        if !self.retry_handler.enabled() {
            return;
        }
        let intent = match self.pending_retries.lock().get(cid).cloned() {
            Some(intent) => intent,
            None => return,
        };

        if self.retry_handler.is_non_retryable(reason) {
            debug!(
                cid,
                "post-only would trade (venue terminal code); grid recalculates next bar"
            );
            self.pending_retries.lock().remove(cid);
            self.retry_handler.clear_history(cid);
            return;
        }
        if !self.retry_handler.should_retry(reason) {
            warn!(cid, reason, "rejected for non-retryable reason");
            self.pending_retries.lock().remove(cid);
            self.retry_handler.clear_history(cid);
            return;
        }
        if intent.retry_count >= self.retry_handler.max_attempts() {
            warn!(
                cid,
                attempts = intent.retry_count,
                "retries exhausted, abandoning order"
            );
            self.pending_retries.lock().remove(cid);
            self.retry_handler.clear_history(cid);
            return;
        }

        let attempt = intent.retry_count + 1;
        let original = intent.original_price.unwrap_or(intent.price);
        let adjusted = self
            .retry_handler
            .adjust_price_for_retry(original, intent.side, attempt);
        self.retry_handler.record_attempt(
            cid,
            attempt,
            original,
            adjusted,
            reason,
            self.clock.now_ms(),
        );

        let new_cid = retry_order_id(cid, attempt);
        let mut retried = intent.clone();
        retried.client_order_id = new_cid.clone();
        retried.price = adjusted;
        retried.retry_count = attempt;
        retried.original_price = Some(original);

        self.pending_retries.lock().remove(cid);

        info!(
            old = cid,
            new = %new_cid,
            attempt,
            max = self.retry_handler.max_attempts(),
            %adjusted,
            "retrying post-only order"
        );

        let delay_ms = self.cfg.execution.retry_delay_ms;
        if delay_ms > 0 {
            let due = self.clock.now_ns() + (delay_ms as i64) * 1_000_000;
            self.deferred_retries.push((due, retried));
        } else {
            self.submit_create(retried);
        }
    }

    fn handle_denied(&mut self, cid: &str, reason: &str) {
        if is_exit_order_id(cid) {
            debug!(cid, reason, "exit order denied");
        } else {
            error!(cid, reason, "grid order denied");
        }

        self.pending_submits.remove(cid);
        if self.pending_retries.lock().remove(cid).is_some() {
            self.retry_handler.clear_history(cid);
            debug!(cid, "cleaned up denied order from retry tracking");
        }

        let now = self.clock.now_ns();
        if self.breaker.record_error(now) {
            self.cancel_all_strategy_orders();
        }
        self.shared
            .circuit_breaker_active
            .store(self.breaker.is_active(), Ordering::SeqCst);
    }

    /// Cancel-rejected on an already-terminal order leaves a ghost in the
    /// mirror; evict it so the diff stops fighting the venue.
    fn handle_cancel_rejected(&mut self, cid: &str, reason: &str) {
        if !cid.starts_with(self.ids.strategy()) {
            return;
        }
        warn!(cid, reason, "cancel rejected");

        let still_open = self
            .gateway
            .orders_open(cid)
            .iter()
            .any(|o| o.client_order_id == cid && o.is_open());
        if !still_open && !is_exit_order_id(cid) {
            if self.grid_orders_cache.remove(cid).is_some() {
                info!(cid, "evicted ghost order after cancel rejection");
            }
        }
    }

    fn handle_filled(
        &mut self,
        cid: &str,
        last_px: rust_decimal::Decimal,
        last_qty: rust_decimal::Decimal,
        liquidity: LiquiditySide,
        ts_event: i64,
    ) -> Result<()> {
        if self.shared.critical_error.load(Ordering::SeqCst) {
            warn!(cid, "in critical error state, ignoring fill");
            return Ok(());
        }

        info!(cid, px = %last_px, qty = %last_qty, "order filled");

        if self.pending_retries.lock().remove(cid).is_some() {
            self.retry_handler.clear_history(cid);
        }

        self.total_fills += 1;
        if liquidity == LiquiditySide::Maker {
            self.maker_fills += 1;
        }

        if !cid.starts_with(self.ids.strategy()) {
            return Ok(());
        }

        if is_exit_order_id(cid) {
            self.handle_exit_fill(cid, last_px, last_qty);
            return Ok(());
        }

        self.grid_orders_cache.remove(cid);
        self.pending_submits.remove(cid);

        let parsed = match parse_client_order_id(cid) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(cid, error = %e, "could not parse filled order id");
                return Ok(());
            }
        };
        self.handle_grid_fill(parsed.side, parsed.level, last_px, last_qty, ts_event)
    }
}
