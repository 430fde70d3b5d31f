//! Core domain types, identifiers, and error taxonomy.

pub mod errors;
pub mod ids;
pub mod types;

pub use errors::{DomainError, IdError, PersistenceError};
pub use ids::{
    fill_key, format_exit_order_id, format_grid_order_id, is_exit_order_id, parse_client_order_id,
    retry_order_id, ExitKind, OrderIdGenerator, ParsedOrderId, MAX_CLIENT_ORDER_ID_LEN,
};
pub use types::{
    Bar, EngineMode, InstrumentId, Ladder, LiquiditySide, MarkPriceUpdate, OrderStatus, Position,
    Regime, Rung, Side,
};
