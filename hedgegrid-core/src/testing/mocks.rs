//! Deterministic test doubles for the controller's collaborator seams.
//!
//! Every double is a cheap `Clone` over shared interior state so a test
//! can keep a handle after moving the double into the controller.

use crate::core::types::{InstrumentId, Position, Side};
use crate::engine::traits::{AccountBalance, Clock, OrderGateway, PositionCache};
use crate::execution::types::{LiveOrder, OrderIntent};
use crate::persistence::{StateStore, StrategyState};
use anyhow::Result;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Manually advanced clock.
#[derive(Clone)]
pub struct TestClock {
    now_ns: Arc<AtomicI64>,
}

impl TestClock {
    pub fn new(start_ns: i64) -> Self {
        Self {
            now_ns: Arc::new(AtomicI64::new(start_ns)),
        }
    }

    pub fn set_ns(&self, ns: i64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }

    pub fn advance_ns(&self, delta: i64) {
        self.now_ns.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ns(secs * 1_000_000_000);
    }
}

impl Clock for TestClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

struct GatewayInner {
    submitted: Mutex<Vec<OrderIntent>>,
    cancel_requests: Mutex<Vec<String>>,
    open_orders: Mutex<Vec<LiveOrder>>,
    positions: Mutex<Vec<Position>>,
    balance: Mutex<Option<AccountBalance>>,
}

/// Recording gateway: captures submits and cancels, serves scripted open
/// orders, positions, and balance.
#[derive(Clone)]
pub struct MockGateway {
    inner: Arc<GatewayInner>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                submitted: Mutex::new(Vec::new()),
                cancel_requests: Mutex::new(Vec::new()),
                open_orders: Mutex::new(Vec::new()),
                positions: Mutex::new(Vec::new()),
                balance: Mutex::new(None),
            }),
        }
    }

    pub fn set_balance(&self, total: Decimal, free: Decimal) {
        *self.inner.balance.lock() = Some(AccountBalance { total, free });
    }

    pub fn clear_balance(&self) {
        *self.inner.balance.lock() = None;
    }

    pub fn push_open_order(&self, order: LiveOrder) {
        self.inner.open_orders.lock().push(order);
    }

    pub fn remove_open_order(&self, client_order_id: &str) {
        self.inner
            .open_orders
            .lock()
            .retain(|o| o.client_order_id != client_order_id);
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.inner.positions.lock() = positions;
    }

    pub fn submitted(&self) -> Vec<OrderIntent> {
        self.inner.submitted.lock().clone()
    }

    pub fn drain_submitted(&self) -> Vec<OrderIntent> {
        std::mem::take(&mut *self.inner.submitted.lock())
    }

    pub fn cancel_requests(&self) -> Vec<String> {
        self.inner.cancel_requests.lock().clone()
    }

    pub fn drain_cancel_requests(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.cancel_requests.lock())
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderGateway for MockGateway {
    fn submit(&self, intent: &OrderIntent) -> Result<()> {
        self.inner.submitted.lock().push(intent.clone());
        Ok(())
    }

    fn cancel(&self, client_order_id: &str) -> Result<()> {
        self.inner
            .cancel_requests
            .lock()
            .push(client_order_id.to_string());
        Ok(())
    }

    fn orders_open(&self, prefix: &str) -> Vec<LiveOrder> {
        self.inner
            .open_orders
            .lock()
            .iter()
            .filter(|o| o.client_order_id.starts_with(prefix) && o.is_open())
            .cloned()
            .collect()
    }

    fn positions(&self) -> Vec<Position> {
        self.inner.positions.lock().clone()
    }

    fn account_balance(&self, _currency: &str) -> Option<AccountBalance> {
        *self.inner.balance.lock()
    }
}

/// In-memory hedge-mode position cache keyed by (instrument, side).
#[derive(Clone)]
pub struct MemoryPositionCache {
    inner: Arc<Mutex<HashMap<(String, Side), Position>>>,
}

impl MemoryPositionCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn set(&self, position: Position) {
        let key = (position.instrument_id.to_string(), position.side);
        self.inner.lock().insert(key, position);
    }

    pub fn clear(&self, instrument_id: &InstrumentId, side: Side) {
        self.inner
            .lock()
            .remove(&(instrument_id.to_string(), side));
    }
}

impl Default for MemoryPositionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionCache for MemoryPositionCache {
    fn position(&self, instrument_id: &InstrumentId, side: Side) -> Option<Position> {
        self.inner
            .lock()
            .get(&(instrument_id.to_string(), side))
            .cloned()
    }
}

/// State store over a shared in-memory slot.
#[derive(Clone)]
pub struct MemoryStateStore {
    slot: Arc<Mutex<Option<StrategyState>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_state(state: StrategyState) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(state))),
        }
    }

    pub fn state(&self) -> Option<StrategyState> {
        self.slot.lock().clone()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Option<StrategyState> {
        self.slot.lock().clone()
    }

    fn save(&self, state: &StrategyState) -> Result<(), crate::core::errors::PersistenceError> {
        *self.slot.lock() = Some(state.clone());
        Ok(())
    }
}
