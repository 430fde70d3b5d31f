//! Typed strategy configuration.
//!
//! The YAML loader lives in the host; these structs are the contract it
//! deserializes into. Every field has a default so partial documents work.

pub mod types;

pub use types::{
    ExecutionSection, ExitSection, FundingSection, GridSection, HedgeGridConfig, PolicySection,
    PositionSection, RegimeSection, RiskSection,
};
