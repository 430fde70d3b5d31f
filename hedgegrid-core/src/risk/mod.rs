//! Risk management
//!
//! Three independent layers guard the order flow:
//!
//! 1. [`DrawdownGuard`] - peak-balance drawdown gate, checked on every bar
//!    before anything else; a breach flattens and pauses for the session.
//! 2. [`CircuitBreaker`] - rolling error window over rejections/denials;
//!    a trip cancels open orders and blocks trading for the cooldown.
//! 3. [`ExposureValidator`] - pre-submit cumulative position-size check;
//!    fail-safe, rejecting anything it cannot evaluate.

pub mod circuit_breaker;
pub mod drawdown;
pub mod pre_trade;

pub use circuit_breaker::CircuitBreaker;
pub use drawdown::{DrawdownGuard, DrawdownVerdict};
pub use pre_trade::{ExposureValidator, PreTradeRejection, PreTradeResult};
