use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main strategy configuration.
///
/// Deserialized by the host's config loader (YAML); every section has full
/// defaults so partial files work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HedgeGridConfig {
    #[serde(default)]
    pub grid: GridSection,
    #[serde(default)]
    pub regime: RegimeSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub funding: FundingSection,
    #[serde(default)]
    pub exit: ExitSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub position: PositionSection,
    #[serde(default)]
    pub risk: RiskSection,
}

/// Grid geometry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSection {
    /// Spacing between adjacent rungs in basis points of the center price.
    #[serde(default = "default_grid_step_bps")]
    pub grid_step_bps: Decimal,

    /// Number of rungs per side.
    #[serde(default = "default_n_rungs")]
    pub n_rungs: u32,

    /// Base quantity per rung before regime bias.
    #[serde(default = "default_base_qty")]
    pub base_qty: Decimal,

    /// Mid deviation from the grid center that triggers a recenter.
    #[serde(default = "default_recenter_threshold_bps")]
    pub recenter_threshold_bps: Decimal,
}

/// Regime detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeSection {
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,

    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,

    #[serde(default = "default_adx_len")]
    pub adx_len: usize,

    #[serde(default = "default_atr_len")]
    pub atr_len: usize,

    /// EMA ratio dead-band in basis points; inside it the regime is SIDE.
    #[serde(default = "default_hysteresis_bps")]
    pub hysteresis_bps: f64,

    /// Minimum ADX for a trending classification.
    #[serde(default = "default_trending_adx")]
    pub trending_adx: f64,

    /// Quantity multiplier for the LONG ladder in an UP regime.
    #[serde(default = "default_up_bias")]
    pub up_bias: Decimal,

    /// Quantity multiplier for the SHORT ladder in a DOWN regime.
    #[serde(default = "default_down_bias")]
    pub down_bias: Decimal,

    /// Quantity multiplier for both ladders in a SIDE regime.
    #[serde(default = "default_side_bias")]
    pub side_bias: Decimal,
}

/// Regime-based rung thinning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    /// LONG rungs kept in a DOWN regime.
    #[serde(default = "default_keep_levels")]
    pub long_keep_levels: usize,

    /// SHORT rungs kept in an UP regime.
    #[serde(default = "default_keep_levels")]
    pub short_keep_levels: usize,
}

/// Funding exposure guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSection {
    /// Minutes before the funding timestamp during which the guard is armed.
    #[serde(default = "default_funding_window_minutes")]
    pub funding_window_minutes: i64,

    /// Projected 8h funding cost (bps) above which the paying side is pulled.
    #[serde(default = "default_funding_max_cost_bps")]
    pub funding_max_cost_bps: f64,
}

/// TP/SL placement in grid steps from the fill price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSection {
    #[serde(default = "default_tp_steps")]
    pub tp_steps: u32,

    #[serde(default = "default_sl_steps")]
    pub sl_steps: u32,
}

/// Order execution and reconciliation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSection {
    /// Maximum post-only retry attempts per order.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before a retry is resubmitted (0 = immediate).
    #[serde(default)]
    pub retry_delay_ms: u64,

    #[serde(default = "default_true")]
    pub use_post_only_retries: bool,

    /// Diff price tolerance in basis points.
    #[serde(default = "default_price_tolerance_bps")]
    pub order_diff_price_tolerance_bps: Decimal,

    /// Diff quantity tolerance as a fraction (0.01 = 1%).
    #[serde(default = "default_qty_tolerance_pct")]
    pub order_diff_qty_tolerance_pct: Decimal,

    /// Minimum spacing between drawdown balance queries.
    #[serde(default = "default_balance_check_interval")]
    pub balance_check_interval_seconds: u64,

    /// Exit prices are kept at least this far (bps of mid) from the mid
    /// so a fresh TP/SL cannot trigger on the same tick it is placed.
    #[serde(default = "default_tp_sl_buffer_bps")]
    pub tp_sl_adjustment_buffer_bps: Decimal,

    /// Bars older than this are not acted upon (live mode only; 0 disables).
    #[serde(default = "default_max_bar_staleness")]
    pub max_bar_staleness_seconds: u64,

    /// Optimization hosts reuse engine instances and want quiet logs.
    #[serde(default)]
    pub optimization_mode: bool,
}

/// Per-side position sizing cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSection {
    /// Maximum per-side exposure as a fraction of total balance.
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: Decimal,
}

/// Risk gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSection {
    /// Drawdown from peak (percent) that halts the strategy.
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,

    /// Rejections/denials within the window that trip the breaker.
    #[serde(default = "default_max_errors")]
    pub max_errors_per_minute: usize,

    #[serde(default = "default_breaker_window")]
    pub circuit_breaker_window_seconds: u64,

    #[serde(default = "default_breaker_cooldown")]
    pub circuit_breaker_cooldown_seconds: u64,

    #[serde(default = "default_true")]
    pub enable_drawdown_protection: bool,

    #[serde(default = "default_true")]
    pub enable_circuit_breaker: bool,

    #[serde(default = "default_true")]
    pub enable_position_validation: bool,
}

// Default value functions

fn default_grid_step_bps() -> Decimal {
    dec!(25)
}

fn default_n_rungs() -> u32 {
    5
}

fn default_base_qty() -> Decimal {
    dec!(0.01)
}

fn default_recenter_threshold_bps() -> Decimal {
    dec!(100)
}

fn default_ema_fast() -> usize {
    12
}

fn default_ema_slow() -> usize {
    48
}

fn default_adx_len() -> usize {
    14
}

fn default_atr_len() -> usize {
    14
}

fn default_hysteresis_bps() -> f64 {
    5.0
}

fn default_trending_adx() -> f64 {
    25.0
}

fn default_up_bias() -> Decimal {
    dec!(1.5)
}

fn default_down_bias() -> Decimal {
    dec!(1.5)
}

fn default_side_bias() -> Decimal {
    dec!(1.0)
}

fn default_keep_levels() -> usize {
    2
}

fn default_funding_window_minutes() -> i64 {
    30
}

fn default_funding_max_cost_bps() -> f64 {
    1.0
}

fn default_tp_steps() -> u32 {
    1
}

fn default_sl_steps() -> u32 {
    3
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_price_tolerance_bps() -> Decimal {
    dec!(1)
}

fn default_qty_tolerance_pct() -> Decimal {
    dec!(0.01)
}

fn default_balance_check_interval() -> u64 {
    60
}

fn default_tp_sl_buffer_bps() -> Decimal {
    dec!(5)
}

fn default_max_bar_staleness() -> u64 {
    120
}

fn default_max_position_pct() -> Decimal {
    dec!(0.95)
}

fn default_max_drawdown_pct() -> f64 {
    20.0
}

fn default_max_errors() -> usize {
    10
}

fn default_breaker_window() -> u64 {
    60
}

fn default_breaker_cooldown() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            grid_step_bps: default_grid_step_bps(),
            n_rungs: default_n_rungs(),
            base_qty: default_base_qty(),
            recenter_threshold_bps: default_recenter_threshold_bps(),
        }
    }
}

impl Default for RegimeSection {
    fn default() -> Self {
        Self {
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            adx_len: default_adx_len(),
            atr_len: default_atr_len(),
            hysteresis_bps: default_hysteresis_bps(),
            trending_adx: default_trending_adx(),
            up_bias: default_up_bias(),
            down_bias: default_down_bias(),
            side_bias: default_side_bias(),
        }
    }
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            long_keep_levels: default_keep_levels(),
            short_keep_levels: default_keep_levels(),
        }
    }
}

impl Default for FundingSection {
    fn default() -> Self {
        Self {
            funding_window_minutes: default_funding_window_minutes(),
            funding_max_cost_bps: default_funding_max_cost_bps(),
        }
    }
}

impl Default for ExitSection {
    fn default() -> Self {
        Self {
            tp_steps: default_tp_steps(),
            sl_steps: default_sl_steps(),
        }
    }
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: 0,
            use_post_only_retries: true,
            order_diff_price_tolerance_bps: default_price_tolerance_bps(),
            order_diff_qty_tolerance_pct: default_qty_tolerance_pct(),
            balance_check_interval_seconds: default_balance_check_interval(),
            tp_sl_adjustment_buffer_bps: default_tp_sl_buffer_bps(),
            max_bar_staleness_seconds: default_max_bar_staleness(),
            optimization_mode: false,
        }
    }
}

impl Default for PositionSection {
    fn default() -> Self {
        Self {
            max_position_pct: default_max_position_pct(),
        }
    }
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            max_drawdown_pct: default_max_drawdown_pct(),
            max_errors_per_minute: default_max_errors(),
            circuit_breaker_window_seconds: default_breaker_window(),
            circuit_breaker_cooldown_seconds: default_breaker_cooldown(),
            enable_drawdown_protection: true,
            enable_circuit_breaker: true,
            enable_position_validation: true,
        }
    }
}
