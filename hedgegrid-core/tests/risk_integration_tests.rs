//! Risk-path scenarios through the controller: drawdown latch, circuit
//! breaker lifecycle, pre-trade exposure rejection, post-only retry, and
//! the operator flatten protocol.

use hedgegrid_core::config::HedgeGridConfig;
use hedgegrid_core::core::{Bar, EngineMode, InstrumentId, OrderStatus, Position, Side};
use hedgegrid_core::engine::Controller;
use hedgegrid_core::Clock;
use hedgegrid_core::execution::{
    CreateIntent, InstrumentPrecision, LiveOrder, OrderEvent, OrderIntent, OrderKind,
};
use hedgegrid_core::testing::{MemoryPositionCache, MemoryStateStore, MockGateway, TestClock};
use hedgegrid_strategies::GridPlanner;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const START_NS: i64 = 1_700_000_000_000_000_000;

fn test_cfg() -> HedgeGridConfig {
    let mut cfg = HedgeGridConfig::default();
    cfg.regime.ema_fast = 2;
    cfg.regime.ema_slow = 3;
    cfg.regime.adx_len = 2;
    cfg.regime.atr_len = 2;
    cfg.grid.n_rungs = 2;
    cfg.grid.base_qty = dec!(0.5);
    cfg.grid.grid_step_bps = dec!(25);
    cfg.execution.balance_check_interval_seconds = 0;
    cfg.risk.max_errors_per_minute = 3;
    cfg.risk.circuit_breaker_window_seconds = 60;
    cfg.risk.circuit_breaker_cooldown_seconds = 300;
    cfg
}

fn precision() -> InstrumentPrecision {
    InstrumentPrecision::new(dec!(0.01), dec!(0.001), dec!(5), dec!(0.001), dec!(1000)).unwrap()
}

fn instrument() -> InstrumentId {
    InstrumentId::new("BTCUSDT-PERP.BINANCE")
}

fn bar(close: Decimal, ts_ns: i64) -> Bar {
    Bar {
        open: close,
        high: close + dec!(0.5),
        low: close - dec!(0.5),
        close,
        volume: dec!(10),
        ts_event: ts_ns,
        ts_init: ts_ns,
    }
}

struct Rig {
    controller: Controller<GridPlanner, MockGateway, MemoryPositionCache>,
    gateway: MockGateway,
    positions: MemoryPositionCache,
    clock: TestClock,
}

fn rig(cfg: HedgeGridConfig) -> Rig {
    let gateway = MockGateway::new();
    gateway.set_balance(dec!(1000000), dec!(1000000));
    let positions = MemoryPositionCache::new();
    let clock = TestClock::new(START_NS);

    let planner = GridPlanner::new(&cfg);
    let mut controller = Controller::new(
        cfg,
        instrument(),
        "HG1",
        precision(),
        EngineMode::Backtest,
        "USDT",
        planner,
        gateway.clone(),
        positions.clone(),
        Box::new(clock.clone()),
        Box::new(MemoryStateStore::new()),
    )
    .unwrap();
    let warmup: Vec<Bar> = (0..12)
        .map(|i| bar(dec!(100), START_NS - (12 - i) * 60_000_000_000))
        .collect();
    controller.start(&warmup);

    Rig {
        controller,
        gateway,
        positions,
        clock,
    }
}

fn step_bar(rig: &mut Rig, close: Decimal) {
    rig.clock.advance_secs(60);
    let b = bar(close, rig.clock.now_ns());
    rig.controller.on_bar(&b);
}

fn submitted_creates(gateway: &MockGateway) -> Vec<CreateIntent> {
    gateway
        .submitted()
        .into_iter()
        .filter_map(|intent| match intent {
            OrderIntent::Create(c) => Some(c),
            _ => None,
        })
        .collect()
}

#[test]
fn drawdown_breach_flattens_and_latches_pause() {
    let mut rig = rig(test_cfg());
    rig.positions
        .set(Position::new(instrument(), Side::Long, dec!(1), dec!(100)).unwrap());
    rig.gateway.push_open_order(
        LiveOrder::new("HG1-L01-1-1", Side::Long, dec!(99.75), dec!(0.5), OrderStatus::Open)
            .unwrap(),
    );

    rig.gateway.set_balance(dec!(10000), dec!(10000));
    step_bar(&mut rig, dec!(100));
    rig.gateway.drain_submitted();
    rig.gateway.drain_cancel_requests();

    // 25% drawdown breaches the 20% limit.
    rig.gateway.set_balance(dec!(7500), dec!(7500));
    step_bar(&mut rig, dec!(100));

    // Open orders cancelled, LONG position closed at market.
    assert!(rig
        .gateway
        .cancel_requests()
        .contains(&"HG1-L01-1-1".to_string()));
    let closes: Vec<CreateIntent> = submitted_creates(&rig.gateway)
        .into_iter()
        .filter(|c| c.meta.kind == OrderKind::Market)
        .collect();
    assert_eq!(closes.len(), 1);
    assert!(closes[0].meta.reduce_only);
    assert_eq!(closes[0].qty, dec!(1));

    let ops = rig.controller.ops_handle();
    assert!(ops.drawdown_triggered());
    assert!(ops.is_paused());
    // Once triggered, the latch never auto-resets: resume is refused and
    // further bars are inert.
    assert!(!ops.resume());
    rig.gateway.drain_submitted();
    rig.gateway.set_balance(dec!(20000), dec!(20000));
    step_bar(&mut rig, dec!(100));
    assert!(rig.gateway.submitted().is_empty());
}

#[test]
fn drawdown_peak_survives_restart_through_the_state_store() {
    let cfg = test_cfg();
    let store = MemoryStateStore::with_state(hedgegrid_core::persistence::StrategyState {
        peak_balance: 10000.0,
        realized_pnl: 12.5,
        last_saved: "2026-08-01T00:00:00+00:00".to_string(),
        instrument_id: instrument().to_string(),
    });

    let gateway = MockGateway::new();
    gateway.set_balance(dec!(7500), dec!(7500));
    let positions = MemoryPositionCache::new();
    let clock = TestClock::new(START_NS);
    let planner = GridPlanner::new(&cfg);
    let mut controller = Controller::new(
        cfg,
        instrument(),
        "HG1",
        precision(),
        EngineMode::Backtest,
        "USDT",
        planner,
        gateway.clone(),
        positions,
        Box::new(clock.clone()),
        Box::new(store.clone()),
    )
    .unwrap();
    let warmup: Vec<Bar> = (0..12)
        .map(|i| bar(dec!(100), START_NS - (12 - i) * 60_000_000_000))
        .collect();
    controller.start(&warmup);
    assert_eq!(controller.realized_pnl(), 12.5);

    // First live balance observation seeds against the restored peak;
    // the second evaluates: 7500 against peak 10000 breaches 20%.
    clock.advance_secs(60);
    controller.on_bar(&bar(dec!(100), clock.now_ns()));
    clock.advance_secs(60);
    controller.on_bar(&bar(dec!(100), clock.now_ns()));

    assert!(controller.ops_handle().drawdown_triggered());
}

#[test]
fn repeated_rejections_trip_the_circuit_breaker() {
    let mut rig = rig(test_cfg());
    step_bar(&mut rig, dec!(100));
    rig.gateway.push_open_order(
        LiveOrder::new("HG1-L01-1-1", Side::Long, dec!(99.75), dec!(0.5), OrderStatus::Open)
            .unwrap(),
    );
    rig.gateway.drain_submitted();
    rig.gateway.drain_cancel_requests();

    for ts in 1..=3 {
        rig.controller.on_order_event(&OrderEvent::Rejected {
            client_order_id: format!("HG1-X{ts}"),
            reason: "insufficient margin".to_string(),
            ts_event: ts,
        });
    }

    let ops = rig.controller.ops_handle();
    assert!(ops.circuit_breaker_active());
    // Activation sweeps all open strategy orders.
    assert!(rig
        .gateway
        .cancel_requests()
        .contains(&"HG1-L01-1-1".to_string()));

    // While active, bars place nothing.
    step_bar(&mut rig, dec!(100));
    assert!(submitted_creates(&rig.gateway).is_empty());

    // After the cooldown the next bar resumes trading.
    rig.clock.advance_secs(301);
    step_bar(&mut rig, dec!(100));
    assert!(!rig.controller.ops_handle().circuit_breaker_active());
    assert!(!submitted_creates(&rig.gateway).is_empty());
}

#[test]
fn duplicate_rejection_events_count_once() {
    let mut rig = rig(test_cfg());
    step_bar(&mut rig, dec!(100));
    rig.gateway.drain_submitted();

    // The same (cid, ts) pair replayed three times is one error.
    for _ in 0..3 {
        rig.controller.on_order_event(&OrderEvent::Rejected {
            client_order_id: "HG1-X1".to_string(),
            reason: "insufficient margin".to_string(),
            ts_event: 7,
        });
    }
    assert!(!rig.controller.ops_handle().circuit_breaker_active());
}

#[test]
fn denials_feed_the_breaker_too() {
    let mut rig = rig(test_cfg());
    step_bar(&mut rig, dec!(100));

    for i in 0..3 {
        rig.controller.on_order_event(&OrderEvent::Denied {
            client_order_id: format!("HG1-D{i}"),
            reason: "risk engine veto".to_string(),
        });
    }
    assert!(rig.controller.ops_handle().circuit_breaker_active());
}

#[test]
fn post_only_rejection_retries_one_tick_away() {
    let mut rig = rig(test_cfg());
    step_bar(&mut rig, dec!(100));
    let l01 = submitted_creates(&rig.gateway)
        .into_iter()
        .find(|c| c.client_order_id.contains("-L01-"))
        .unwrap();
    rig.gateway.drain_submitted();

    rig.controller.on_order_event(&OrderEvent::Rejected {
        client_order_id: l01.client_order_id.clone(),
        reason: "post-only order would immediately match".to_string(),
        ts_event: 1,
    });

    let retries = submitted_creates(&rig.gateway);
    assert_eq!(retries.len(), 1);
    let retry = &retries[0];
    assert!(retry.client_order_id.ends_with("-R1"));
    assert_eq!(retry.price, l01.price - dec!(0.01));
    assert_eq!(retry.retry_count, 1);
    assert_eq!(retry.original_price, Some(l01.price));
}

#[test]
fn retries_are_bounded_and_back_off_progressively() {
    let mut cfg = test_cfg();
    cfg.execution.retry_attempts = 2;
    let mut rig = rig(cfg);
    step_bar(&mut rig, dec!(100));
    let l01 = submitted_creates(&rig.gateway)
        .into_iter()
        .find(|c| c.client_order_id.contains("-L01-"))
        .unwrap();
    rig.gateway.drain_submitted();

    let mut cid = l01.client_order_id.clone();
    for ts in 1..=3 {
        rig.controller.on_order_event(&OrderEvent::Rejected {
            client_order_id: cid.clone(),
            reason: "would take liquidity".to_string(),
            ts_event: ts,
        });
        let retries = submitted_creates(&rig.gateway);
        if let Some(last) = retries.last() {
            cid = last.client_order_id.clone();
        }
    }

    let retries = submitted_creates(&rig.gateway);
    // Two attempts allowed, the third rejection abandons.
    assert_eq!(retries.len(), 2);
    assert!(retries[0].client_order_id.ends_with("-R1"));
    assert!(retries[1].client_order_id.ends_with("-R2"));
    assert_eq!(retries[0].price, l01.price - dec!(0.01));
    assert_eq!(retries[1].price, l01.price - dec!(0.02));
}

#[test]
fn venue_terminal_code_is_never_retried() {
    let mut rig = rig(test_cfg());
    step_bar(&mut rig, dec!(100));
    let l01 = submitted_creates(&rig.gateway)
        .into_iter()
        .find(|c| c.client_order_id.contains("-L01-"))
        .unwrap();
    rig.gateway.drain_submitted();

    rig.controller.on_order_event(&OrderEvent::Rejected {
        client_order_id: l01.client_order_id,
        reason: "-5022 post-only order would trade".to_string(),
        ts_event: 1,
    });
    assert!(submitted_creates(&rig.gateway).is_empty());
}

#[test]
fn exposure_cap_rejects_creates_before_submission() {
    let mut cfg = test_cfg();
    cfg.position.max_position_pct = dec!(0.0001);
    let mut rig = rig(cfg);
    rig.gateway.set_balance(dec!(100), dec!(100));

    step_bar(&mut rig, dec!(100));
    assert!(submitted_creates(&rig.gateway).is_empty());
}

#[test]
fn missing_account_data_rejects_fail_safe() {
    let mut rig = rig(test_cfg());
    rig.gateway.clear_balance();
    step_bar(&mut rig, dec!(100));
    assert!(submitted_creates(&rig.gateway).is_empty());
}

#[test]
fn operator_flatten_cancels_closes_and_pauses() {
    let mut rig = rig(test_cfg());
    rig.positions
        .set(Position::new(instrument(), Side::Short, dec!(2), dec!(101)).unwrap());
    rig.gateway.push_open_order(
        LiveOrder::new("HG1-S01-1-1", Side::Short, dec!(100.25), dec!(0.5), OrderStatus::Open)
            .unwrap(),
    );
    step_bar(&mut rig, dec!(100));
    rig.gateway.drain_submitted();
    rig.gateway.drain_cancel_requests();

    rig.controller.ops_handle().request_flatten();
    step_bar(&mut rig, dec!(100));

    assert!(rig
        .gateway
        .cancel_requests()
        .contains(&"HG1-S01-1-1".to_string()));
    let closes: Vec<CreateIntent> = submitted_creates(&rig.gateway)
        .into_iter()
        .filter(|c| c.meta.kind == OrderKind::Market)
        .collect();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].side, Side::Short);
    assert_eq!(closes[0].qty, dec!(2));
    assert!(rig.controller.ops_handle().is_paused());
}

#[test]
fn kill_switch_pauses_without_touching_positions() {
    let mut rig = rig(test_cfg());
    rig.positions
        .set(Position::new(instrument(), Side::Long, dec!(1), dec!(100)).unwrap());
    step_bar(&mut rig, dec!(100));
    rig.gateway.drain_submitted();

    rig.controller.ops_handle().engage_kill_switch();
    step_bar(&mut rig, dec!(100));

    assert!(rig.gateway.submitted().is_empty());
    assert!(rig.controller.ops_handle().is_paused());

    // Resume clears the pause and the next bar trades again.
    assert!(rig.controller.ops_handle().resume());
    // Live orders were never placed (creates from bar 1 were not
    // accepted), so the grid is re-quoted.
    step_bar(&mut rig, dec!(100));
    assert!(!rig.gateway.submitted().is_empty());
}

#[test]
fn bar_staleness_skips_order_placement_in_live_mode() {
    let cfg = test_cfg();
    let gateway = MockGateway::new();
    gateway.set_balance(dec!(1000000), dec!(1000000));
    let clock = TestClock::new(START_NS);
    let planner = GridPlanner::new(&cfg);
    let mut controller = Controller::new(
        cfg,
        instrument(),
        "HG1",
        precision(),
        EngineMode::Live,
        "USDT",
        planner,
        gateway.clone(),
        MemoryPositionCache::new(),
        Box::new(clock.clone()),
        Box::new(MemoryStateStore::new()),
    )
    .unwrap();
    let warmup: Vec<Bar> = (0..12)
        .map(|i| bar(dec!(100), START_NS - (12 - i) * 60_000_000_000))
        .collect();
    controller.start(&warmup);

    // Bar stamped 10 minutes in the past (staleness limit is 120s).
    let stale = bar(dec!(100), clock.now_ns() - 600_000_000_000);
    controller.on_bar(&stale);
    assert!(gateway.submitted().is_empty());

    // A fresh bar trades normally.
    clock.advance_secs(60);
    controller.on_bar(&bar(dec!(100), clock.now_ns()));
    assert!(!gateway.submitted().is_empty());
}
