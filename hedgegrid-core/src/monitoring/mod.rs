//! Operational metrics snapshot and prometheus export.

pub mod metrics;

pub use metrics::{EngineMetrics, MetricsSnapshot};
