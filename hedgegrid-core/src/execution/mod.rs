//! Order execution primitives
//!
//! The path from a planned ladder to the wire:
//!
//! ```text
//! Ladders ──▶ PrecisionGuard ──▶ OrderDiff ──▶ OrderIntents ──▶ Gateway
//!                                                  │
//!                        post-only rejection ◀─────┘
//!                                │
//!                        PostOnlyRetryHandler (tick backoff, ≤ N attempts)
//! ```

pub mod order_diff;
pub mod precision;
pub mod retry;
pub mod types;

pub use order_diff::{OrderDiff, OrderMatcher};
pub use precision::{InstrumentPrecision, PrecisionGuard};
pub use retry::{PostOnlyRetryHandler, RetryAttempt};
pub use types::{
    CancelIntent, CreateIntent, DiffResult, LiveOrder, OrderEvent, OrderIntent, OrderKind,
    OrderMeta, ReplaceIntent,
};
