//! Prometheus gauges fed from the per-bar metrics snapshot.
//!
//! The controller publishes a [`MetricsSnapshot`] once per bar; a collector
//! thread reads it through the ops handle and pushes it into the gauges
//! here. HTTP exposition is the host's concern.

use prometheus::{Gauge, IntGauge, Opts, Registry};

/// Point-in-time operational metrics, published once per bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub account_balance: f64,
    pub long_inventory: f64,
    pub short_inventory: f64,
    pub net_inventory: f64,
    pub active_rungs_long: usize,
    pub active_rungs_short: usize,
    pub open_orders: usize,
    pub total_fills: u64,
    pub maker_fills: u64,
    pub maker_ratio: f64,
    pub funding_rate: f64,
    pub realized_pnl: f64,
    /// Fills whose TP/SL attachment was abandoned after cache-lag retries.
    pub unprotected_fills: u64,
    pub uptime_seconds: f64,
    pub last_bar_ts_ns: i64,
    pub throttle: f64,
    pub pause_trading: bool,
    pub circuit_breaker_active: bool,
    pub drawdown_triggered: bool,
}

impl MetricsSnapshot {
    pub fn maker_ratio_of(total: u64, maker: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            maker as f64 / total as f64
        }
    }
}

/// Prometheus metric family for one engine instance.
pub struct EngineMetrics {
    registry: Registry,

    account_balance: Gauge,
    long_inventory: Gauge,
    short_inventory: Gauge,
    net_inventory: Gauge,
    active_rungs_long: IntGauge,
    active_rungs_short: IntGauge,
    open_orders: IntGauge,
    total_fills: IntGauge,
    maker_ratio: Gauge,
    funding_rate: Gauge,
    realized_pnl: Gauge,
    unprotected_fills: IntGauge,
    uptime_seconds: Gauge,
    throttle: Gauge,
    pause_trading: IntGauge,
    circuit_breaker_active: IntGauge,
    drawdown_triggered: IntGauge,
}

macro_rules! register_gauge {
    ($registry:expr, $ty:ty, $name:expr, $help:expr) => {{
        let gauge = <$ty>::with_opts(Opts::new($name, $help))?;
        $registry.register(Box::new(gauge.clone()))?;
        gauge
    }};
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        Ok(Self {
            account_balance: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_account_balance",
                "Total account balance in settlement currency"
            ),
            long_inventory: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_long_inventory",
                "Long position notional"
            ),
            short_inventory: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_short_inventory",
                "Short position notional"
            ),
            net_inventory: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_net_inventory",
                "Long minus short notional"
            ),
            active_rungs_long: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_active_rungs_long",
                "Resting LONG grid orders"
            ),
            active_rungs_short: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_active_rungs_short",
                "Resting SHORT grid orders"
            ),
            open_orders: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_open_orders",
                "Total resting grid orders"
            ),
            total_fills: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_total_fills",
                "Fills observed this session"
            ),
            maker_ratio: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_maker_ratio",
                "Fraction of fills executed as maker"
            ),
            funding_rate: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_funding_rate",
                "Latest funding rate"
            ),
            realized_pnl: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_realized_pnl",
                "Realized PnL accumulated from exit fills"
            ),
            unprotected_fills: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_unprotected_fills",
                "Fills left without TP/SL after cache-lag retries"
            ),
            uptime_seconds: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_uptime_seconds",
                "Seconds since engine start"
            ),
            throttle: register_gauge!(
                registry,
                Gauge,
                "hedgegrid_throttle",
                "Operator throttle multiplier"
            ),
            pause_trading: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_pause_trading",
                "1 when trading is paused"
            ),
            circuit_breaker_active: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_circuit_breaker_active",
                "1 while the circuit breaker cooldown runs"
            ),
            drawdown_triggered: register_gauge!(
                registry,
                IntGauge,
                "hedgegrid_drawdown_triggered",
                "1 once drawdown protection has fired"
            ),
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn update(&self, snap: &MetricsSnapshot) {
        self.account_balance.set(snap.account_balance);
        self.long_inventory.set(snap.long_inventory);
        self.short_inventory.set(snap.short_inventory);
        self.net_inventory.set(snap.net_inventory);
        self.active_rungs_long.set(snap.active_rungs_long as i64);
        self.active_rungs_short.set(snap.active_rungs_short as i64);
        self.open_orders.set(snap.open_orders as i64);
        self.total_fills.set(snap.total_fills as i64);
        self.maker_ratio.set(snap.maker_ratio);
        self.funding_rate.set(snap.funding_rate);
        self.realized_pnl.set(snap.realized_pnl);
        self.unprotected_fills.set(snap.unprotected_fills as i64);
        self.uptime_seconds.set(snap.uptime_seconds);
        self.throttle.set(snap.throttle);
        self.pause_trading.set(snap.pause_trading as i64);
        self.circuit_breaker_active
            .set(snap.circuit_breaker_active as i64);
        self.drawdown_triggered.set(snap.drawdown_triggered as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maker_ratio_handles_zero_fills() {
        assert_eq!(MetricsSnapshot::maker_ratio_of(0, 0), 0.0);
        assert_eq!(MetricsSnapshot::maker_ratio_of(4, 3), 0.75);
    }

    #[test]
    fn update_reflects_snapshot_in_gauges() {
        let metrics = EngineMetrics::new().unwrap();
        let snap = MetricsSnapshot {
            account_balance: 10_000.0,
            open_orders: 7,
            circuit_breaker_active: true,
            ..Default::default()
        };
        metrics.update(&snap);

        let families = metrics.registry().gather();
        let balance = families
            .iter()
            .find(|f| f.get_name() == "hedgegrid_account_balance")
            .unwrap();
        assert_eq!(balance.get_metric()[0].get_gauge().get_value(), 10_000.0);
        let breaker = families
            .iter()
            .find(|f| f.get_name() == "hedgegrid_circuit_breaker_active")
            .unwrap();
        assert_eq!(breaker.get_metric()[0].get_gauge().get_value(), 1.0);
    }
}
