//! Operator control surface.
//!
//! The trading thread owns the controller; operator threads (HTTP API,
//! metrics collector) interact only through [`OpsHandle`], a cloneable
//! handle over lock-protected shared state. One lock per structure; no
//! lock is ever held across a gateway call.

use crate::core::errors::DomainError;
use crate::core::types::Ladder;
use crate::monitoring::metrics::MetricsSnapshot;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Ladder state published each bar for the operator API (pre-shaping).
#[derive(Debug, Clone, Default)]
pub struct LadderSnapshot {
    pub long: Option<Ladder>,
    pub short: Option<Ladder>,
    pub center: Decimal,
    pub ts_ns: i64,
}

/// Operator-initiated mutations, applied by the trading thread at the top
/// of the next bar.
#[derive(Debug, Clone)]
pub struct OpsState {
    pub throttle: f64,
    pub flatten_requested: bool,
    pub kill_switch_engaged: bool,
}

impl Default for OpsState {
    fn default() -> Self {
        Self {
            throttle: 1.0,
            flatten_requested: false,
            kill_switch_engaged: false,
        }
    }
}

/// Shared state between the controller and operator handles.
pub(crate) struct SharedOps {
    pub(crate) ops: Mutex<OpsState>,
    pub(crate) ladders: Mutex<LadderSnapshot>,
    pub(crate) metrics: Mutex<MetricsSnapshot>,
    pub(crate) pause_trading: AtomicBool,
    pub(crate) critical_error: AtomicBool,
    pub(crate) circuit_breaker_active: AtomicBool,
    pub(crate) drawdown_triggered: AtomicBool,
}

impl SharedOps {
    pub(crate) fn new() -> Self {
        Self {
            ops: Mutex::new(OpsState::default()),
            ladders: Mutex::new(LadderSnapshot::default()),
            metrics: Mutex::new(MetricsSnapshot::default()),
            pause_trading: AtomicBool::new(false),
            critical_error: AtomicBool::new(false),
            circuit_breaker_active: AtomicBool::new(false),
            drawdown_triggered: AtomicBool::new(false),
        }
    }
}

/// Cloneable operator handle; the thin read/mutate surface of the engine.
#[derive(Clone)]
pub struct OpsHandle {
    shared: Arc<SharedOps>,
}

impl OpsHandle {
    pub(crate) fn new(shared: Arc<SharedOps>) -> Self {
        Self { shared }
    }

    /// Set the ladder-quantity throttle. 1.0 = full size, 0.0 = quote
    /// nothing. Applied on the next bar.
    pub fn set_throttle(&self, throttle: f64) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&throttle) || throttle.is_nan() {
            return Err(DomainError::ThrottleOutOfRange(throttle));
        }
        self.shared.ops.lock().throttle = throttle;
        info!(throttle, "operator throttle updated");
        Ok(())
    }

    pub fn throttle(&self) -> f64 {
        self.shared.ops.lock().throttle
    }

    /// Request cancel-everything + reduce-only market closes. Executed by
    /// the trading thread at the top of the next bar, after which trading
    /// stays paused until [`OpsHandle::resume`].
    pub fn request_flatten(&self) {
        warn!("operator flatten requested");
        self.shared.ops.lock().flatten_requested = true;
    }

    /// Pause trading without touching positions.
    pub fn engage_kill_switch(&self) {
        warn!("operator kill switch engaged");
        self.shared.ops.lock().kill_switch_engaged = true;
        self.shared.pause_trading.store(true, Ordering::SeqCst);
    }

    /// Clear the pause after an operator intervention. Refused while a
    /// critical error or drawdown trigger is latched.
    pub fn resume(&self) -> bool {
        if self.shared.critical_error.load(Ordering::SeqCst)
            || self.shared.drawdown_triggered.load(Ordering::SeqCst)
        {
            warn!("resume refused: critical error or drawdown latch active");
            return false;
        }
        self.shared.ops.lock().kill_switch_engaged = false;
        self.shared.pause_trading.store(false, Ordering::SeqCst);
        info!("trading resumed by operator");
        true
    }

    pub fn is_paused(&self) -> bool {
        self.shared.pause_trading.load(Ordering::SeqCst)
    }

    pub fn circuit_breaker_active(&self) -> bool {
        self.shared.circuit_breaker_active.load(Ordering::SeqCst)
    }

    pub fn drawdown_triggered(&self) -> bool {
        self.shared.drawdown_triggered.load(Ordering::SeqCst)
    }

    /// Latest ladder snapshot (pre-policy, as built around the center).
    pub fn ladders(&self) -> LadderSnapshot {
        self.shared.ladders.lock().clone()
    }

    /// Latest per-bar metrics snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> OpsHandle {
        OpsHandle::new(Arc::new(SharedOps::new()))
    }

    #[test]
    fn throttle_range_is_validated() {
        let ops = handle();
        assert!(ops.set_throttle(0.5).is_ok());
        assert_eq!(ops.throttle(), 0.5);
        assert!(ops.set_throttle(-0.1).is_err());
        assert!(ops.set_throttle(1.5).is_err());
        assert!(ops.set_throttle(f64::NAN).is_err());
    }

    #[test]
    fn kill_switch_pauses_and_resume_clears() {
        let ops = handle();
        ops.engage_kill_switch();
        assert!(ops.is_paused());
        assert!(ops.resume());
        assert!(!ops.is_paused());
    }

    #[test]
    fn resume_refused_after_drawdown_latch() {
        let shared = Arc::new(SharedOps::new());
        let ops = OpsHandle::new(shared.clone());
        shared.drawdown_triggered.store(true, Ordering::SeqCst);
        shared.pause_trading.store(true, Ordering::SeqCst);
        assert!(!ops.resume());
        assert!(ops.is_paused());
    }
}
