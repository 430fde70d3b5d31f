//! Typed error taxonomy for the grid engine
//!
//! Domain validation failures are hard errors raised at construction time
//! and never reach the gateway. Everything gateway-facing is best-effort
//! and reported through `anyhow::Result` at the call site.

use rust_decimal::Decimal;
use thiserror::Error;

/// Violation of a domain invariant at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("qty must be positive, got {0}")]
    NonPositiveQty(Decimal),

    #[error("client_order_id is required")]
    EmptyClientOrderId,

    #[error("rung side {expected} does not match ladder side {actual}")]
    SideMismatch { expected: String, actual: String },

    #[error("{kind} price {price} is on the wrong side of entry {entry} for {side}")]
    InvalidExitPrice {
        kind: &'static str,
        price: Decimal,
        entry: Decimal,
        side: String,
    },

    #[error("invalid precision parameter: {0}")]
    InvalidPrecision(String),

    #[error("invalid tolerance: {0}")]
    InvalidTolerance(String),

    #[error("quantity must be non-negative, got {0}")]
    NegativeQty(Decimal),

    #[error("throttle must be within 0.0..=1.0, got {0}")]
    ThrottleOutOfRange(f64),

    #[error("strategy name is required")]
    EmptyStrategyName,
}

/// Failure to parse a client order id into its structured form.
///
/// Unparseable ids are not fatal anywhere in the engine: the diff treats
/// them as unmatched live orders and cancels them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IdError {
    #[error("malformed client_order_id: {0}")]
    Malformed(String),

    #[error("unknown side abbreviation: {0}")]
    BadSide(char),

    #[error("bad level segment: {0}")]
    BadLevel(String),

    #[error("bad timestamp segment: {0}")]
    BadTimestamp(String),

    #[error("bad counter segment: {0}")]
    BadCounter(String),
}

/// Persistence failures are non-fatal; the controller logs and continues.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("state io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}
