//! Hedgegrid Core - Perpetual-Futures Grid Trading Engine
//!
//! The deterministic control loop that turns a stream of market bars and
//! exchange events into a minimal set of order operations against a
//! hedge-mode futures venue.
//!
//! ## Architecture
//! - **Precision guards** clamp every planned rung to venue tick/step/
//!   notional rules before it can become an order.
//! - **Order diff** reconciles desired ladders against live orders and
//!   emits the minimal create/cancel/replace set.
//! - **Post-only retry** backs rejected maker orders off the spread one
//!   tick per attempt, bounded.
//! - **Exit manager** attaches TP/SL pairs on fills with OCO-like
//!   cancellation and orphan cleanup.
//! - **Risk** layers: drawdown gate, rolling-error circuit breaker,
//!   pre-submit exposure validation.
//! - **Controller** orchestrates all of it per bar and per event.
//!
//! ## Core Modules
//! - `core`: domain types, client-order-id grammar, error taxonomy
//! - `config`: typed strategy configuration (host loads the YAML)
//! - `execution`: precision, order diff, post-only retry, intents/events
//! - `engine`: controller, collaborator traits, operator surface
//! - `risk`: drawdown, circuit breaker, pre-trade validation
//! - `persistence`: atomic strategy-state files
//! - `monitoring`: per-bar metrics snapshot + prometheus gauges
//! - `testing`: deterministic doubles for the collaborator seams

pub mod config;
pub mod core;
pub mod engine;
pub mod execution;
pub mod monitoring;
pub mod persistence;
pub mod risk;
pub mod testing;
pub mod utils;

pub use crate::core::{
    Bar, EngineMode, InstrumentId, Ladder, LiquiditySide, MarkPriceUpdate, OrderStatus, Position,
    Regime, Rung, Side,
};
pub use config::HedgeGridConfig;
pub use engine::{Clock, Controller, LadderPlanner, OpsHandle, OrderGateway, PositionCache};
pub use execution::{
    DiffResult, InstrumentPrecision, LiveOrder, OrderDiff, OrderEvent, OrderIntent,
    PostOnlyRetryHandler, PrecisionGuard,
};
pub use monitoring::MetricsSnapshot;
pub use persistence::{FileStateStore, NullStateStore, StateStore, StrategyState};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::HedgeGridConfig;
    pub use crate::core::{
        Bar, EngineMode, InstrumentId, Ladder, MarkPriceUpdate, Position, Regime, Rung, Side,
    };
    pub use crate::engine::{
        Clock, Controller, LadderPlanner, OpsHandle, OrderGateway, PositionCache, SystemClock,
    };
    pub use crate::execution::{
        InstrumentPrecision, LiveOrder, OrderEvent, OrderIntent, PrecisionGuard,
    };
    pub use crate::monitoring::MetricsSnapshot;
    pub use crate::persistence::{FileStateStore, NullStateStore, StateStore};
}
