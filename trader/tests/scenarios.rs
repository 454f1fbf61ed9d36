//! Cross-crate scenario tests (S1, S2, S3, S6). S4 (backpressure drop) and S5 (breaker
//! trips) are unit-tested in `flowtrader-core` against the bus and breaker directly.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use flowtrader_core::{
    audit::{AuditLogger, AuditSink, DEFAULT_AUDIT_BUFFER},
    breaker::CircuitBreakerManager,
    bus::EventBus,
    clock::{Clock, SystemClock},
    config::BreakerConfig,
    event::{Action, Event, EventKind, MarketDataEvent, SignalEvent},
};
use flowtrader_data::{
    wire::{BarMessage, Timeframe},
    DataError, LiveStreamDriver, MarketDataProvider, ReconnectPolicy,
};
use flowtrader_execution::{
    repo::{AuditRepo, InMemoryRepo, OrdersRepo, PortfolioRepo},
    ExecutionConfig, ExecutionEngine, SignalConverter,
};
use flowtrader_risk::{OrderRequest, RiskLimits, RiskManager};
use flowtrader_strategy::{
    OpeningRangeBreakoutConfig, OpeningRangeBreakoutStrategy, Strategy, StrategyRuntime,
    VwapBounceConfig, VwapBounceStrategy,
};
use flowtrader_trader::dispatch::run_converter;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use smol_str::SmolStr;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn bar(symbol: &str, close: Decimal, volume: Decimal, ts: DateTime<Utc>) -> MarketDataEvent {
    MarketDataEvent {
        symbol: SmolStr::new(symbol),
        open: close,
        high: close,
        low: close,
        close,
        volume,
        data_timestamp: ts,
    }
}

struct Harness {
    bus: Arc<EventBus>,
    engine: Arc<ExecutionEngine>,
    repo: Arc<InMemoryRepo>,
    risk: Arc<RiskManager>,
    cancel: CancellationToken,
    _handles: Vec<tokio::task::JoinHandle<()>>,
}

/// Wires core + risk + execution into one running harness: engine's own bus-driving
/// task, the limit matcher, and the converter dispatch loop (spec §5).
fn spin_up(risk_limits: RiskLimits, min_confidence: f64) -> Harness {
    let bus = Arc::new(EventBus::new(256));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let breaker = Arc::new(CircuitBreakerManager::with_default_params(
        clock.clone(),
        BreakerConfig::default().into(),
    ));
    let repo = Arc::new(InMemoryRepo::default());
    let (audit_logger, audit_handle) =
        AuditLogger::spawn(repo.clone() as Arc<dyn AuditSink>, DEFAULT_AUDIT_BUFFER);
    let risk = Arc::new(RiskManager::new(risk_limits, clock.clone()));
    let converter = Arc::new(SignalConverter::new(min_confidence, risk.clone(), audit_logger));
    let engine = Arc::new(ExecutionEngine::new(
        bus.clone(),
        risk.clone(),
        breaker,
        repo.clone() as Arc<dyn OrdersRepo>,
        repo.clone() as Arc<dyn PortfolioRepo>,
        repo.clone() as Arc<dyn AuditRepo>,
        clock,
        ExecutionConfig::default(),
    ));

    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    {
        let engine = engine.clone();
        let cancel = cancel.child_token();
        handles.push(tokio::spawn(async move {
            let _ = engine.run(cancel).await;
        }));
    }
    {
        let engine = engine.clone();
        let cancel = cancel.child_token();
        handles.push(tokio::spawn(async move {
            engine.run_limit_matcher(cancel).await;
        }));
    }
    {
        let bus = bus.clone();
        let cancel = cancel.child_token();
        handles.push(tokio::spawn(async move {
            let _ = run_converter(bus, converter, cancel).await;
        }));
    }
    // audit drain task has no cancellation signal of its own; drop the handle.
    drop(audit_handle);

    Harness {
        bus,
        engine,
        repo,
        risk,
        cancel,
        _handles: handles,
    }
}

/// **S1 — VWAP bounce entry.** Twenty flat 100 bars warm EMA(20)/VWAP, then a bounce bar
/// trips a BUY signal; the converter turns it into a market order and the engine fills it
/// against the cached price, opening a long position.
#[tokio::test]
async fn s1_vwap_bounce_entry_fills_as_market_buy() {
    let harness = spin_up(RiskLimits::default(), 0.5);

    let strategy: Arc<dyn Strategy> = Arc::new(VwapBounceStrategy::new(
        "vwap_bounce_1",
        vec![SmolStr::new("AAPL")],
        VwapBounceConfig {
            ema_period: 20,
            ..VwapBounceConfig::default()
        },
    ));
    let runtime = Arc::new(StrategyRuntime::new(harness.bus.clone(), strategy));
    let strategy_cancel = harness.cancel.child_token();
    let strategy_task = {
        let runtime = runtime.clone();
        tokio::spawn(async move { let _ = runtime.run(strategy_cancel).await; })
    };
    tokio::task::yield_now().await;

    let mut filled = harness.bus.subscribe(EventKind::OrderFilled).unwrap();

    for i in 0..20 {
        let ts = Utc.with_ymd_and_hms(2026, 7, 30, 9, i, 0).unwrap();
        harness.engine.update_price(&SmolStr::new("AAPL"), dec!(100), ts);
        harness
            .bus
            .publish(Event::market_data(ts, bar("AAPL", dec!(100), dec!(1000), ts)));
        tokio::task::yield_now().await;
    }
    let ts = Utc.with_ymd_and_hms(2026, 7, 30, 9, 20, 0).unwrap();
    harness.engine.update_price(&SmolStr::new("AAPL"), dec!(100.2), ts);
    harness
        .bus
        .publish(Event::market_data(ts, bar("AAPL", dec!(100.2), dec!(1000), ts)));

    let event = tokio::time::timeout(Duration::from_millis(500), filled.recv())
        .await
        .expect("order filled before timeout")
        .expect("bus still open");
    let fill = event.as_order_filled().unwrap();
    assert_eq!(fill.action, Action::Buy);
    assert_eq!(fill.filled_qty, dec!(100));
    assert!(fill.fill_price > Decimal::ZERO);

    let position = harness
        .repo
        .get_position(&SmolStr::new("AAPL"))
        .await
        .unwrap()
        .expect("position opened");
    assert_eq!(position.quantity, dec!(100));

    harness.cancel.cancel();
    let _ = strategy_task.await;
}

/// **S2 — ORB-15 breakout.** The first 15 one-minute bars set the opening range at
/// high=101/low=99; a 09:46 bar closing above it triggers a BUY with a stop at
/// `max(99, entry - 2*ATR)`, and a later bar trading through that stop triggers the
/// offsetting SELL.
#[tokio::test]
async fn s2_orb_breakout_then_stop_loss_exit() {
    let harness = spin_up(RiskLimits::default(), 0.5);

    let strategy: Arc<dyn Strategy> = Arc::new(OpeningRangeBreakoutStrategy::new(
        "orb_1",
        vec![SmolStr::new("AAPL")],
        OpeningRangeBreakoutConfig {
            range_minutes: 15,
            atr_period: 5,
            ..OpeningRangeBreakoutConfig::default()
        },
    ));
    let runtime = Arc::new(StrategyRuntime::new(harness.bus.clone(), strategy));
    let strategy_cancel = harness.cancel.child_token();
    let strategy_task = {
        let runtime = runtime.clone();
        tokio::spawn(async move { let _ = runtime.run(strategy_cancel).await; })
    };
    tokio::task::yield_now().await;

    let mut signals = harness.bus.subscribe(EventKind::Signal).unwrap();

    // the strategy's default tz is US/Eastern; 2026-07-30 is within EDT (UTC-4), so
    // 09:30 ET (session open) is 13:30 UTC.
    for i in 0..15u32 {
        let ts = Utc.with_ymd_and_hms(2026, 7, 30, 13, 30 + i, 0).unwrap();
        let (high, low) = if i == 0 { (dec!(101), dec!(99)) } else { (dec!(100.5), dec!(99.5)) };
        harness.engine.update_price(&SmolStr::new("AAPL"), dec!(100), ts);
        harness.bus.publish(Event::market_data(
            ts,
            MarketDataEvent {
                symbol: SmolStr::new("AAPL"),
                open: dec!(100),
                high,
                low,
                close: dec!(100),
                volume: dec!(1000),
                data_timestamp: ts,
            },
        ));
        tokio::task::yield_now().await;
    }

    let breakout_ts = Utc.with_ymd_and_hms(2026, 7, 30, 13, 46, 0).unwrap();
    harness.engine.update_price(&SmolStr::new("AAPL"), dec!(101.5), breakout_ts);
    harness
        .bus
        .publish(Event::market_data(breakout_ts, bar("AAPL", dec!(101.5), dec!(1000), breakout_ts)));

    let buy = tokio::time::timeout(Duration::from_millis(500), signals.recv())
        .await
        .expect("buy signal before timeout")
        .expect("bus still open");
    assert_eq!(buy.as_signal().unwrap().action, Action::Buy);

    let stop_ts = Utc.with_ymd_and_hms(2026, 7, 30, 13, 47, 0).unwrap();
    harness.engine.update_price(&SmolStr::new("AAPL"), dec!(98.5), stop_ts);
    harness
        .bus
        .publish(Event::market_data(stop_ts, bar("AAPL", dec!(98.5), dec!(1000), stop_ts)));

    let sell = tokio::time::timeout(Duration::from_millis(500), signals.recv())
        .await
        .expect("sell signal before timeout")
        .expect("bus still open");
    assert_eq!(sell.as_signal().unwrap().action, Action::Sell);

    harness.cancel.cancel();
    let _ = strategy_task.await;
}

/// **S3 — Risk rejection on oversized notional.** A signal whose notional exceeds
/// `max_position_notional` is dropped by the converter: no order reaches the bus, and
/// the rejection is audited.
#[tokio::test]
async fn s3_oversized_notional_is_rejected_without_order() {
    let harness = spin_up(
        RiskLimits {
            max_position_notional: dec!(1000),
            ..RiskLimits::default()
        },
        0.5,
    );

    let mut orders = harness.bus.subscribe(EventKind::Order).unwrap();

    harness.bus.publish(Event::signal(
        Utc::now(),
        SignalEvent {
            strategy_id: SmolStr::new("manual"),
            symbol: SmolStr::new("AAPL"),
            action: Action::Buy,
            confidence: 0.9,
            price: dec!(50),
            quantity: dec!(100),
            reason: "oversized test order".to_string(),
        },
    ));

    let no_order = tokio::time::timeout(Duration::from_millis(200), orders.recv()).await;
    assert!(no_order.is_err(), "rejected signal must not produce an order event");

    let rejected = harness
        .repo
        .audit_events()
        .into_iter()
        .any(|e| e.event_type == flowtrader_core::audit::AuditEventCategory::OrderRejected);
    assert!(rejected, "rejection must be audited");

    // direct risk-manager check mirrors the scenario's notional math (qty=100, price=50).
    let validation = harness.risk.validate_order(&OrderRequest {
        symbol: SmolStr::new("AAPL"),
        action: Action::Buy,
        quantity: dec!(100),
        price: dec!(50),
    });
    assert!(!validation.approved);

    harness.cancel.cancel();
}

/// A provider that drops the connection once mid-stream, so [`LiveStreamDriver`] must
/// reconnect and resubscribe before resuming bars.
#[derive(Debug, Default)]
struct FlakyProvider {
    log: Mutex<Vec<String>>,
    next_bar_calls: AtomicUsize,
}

impl FlakyProvider {
    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl MarketDataProvider for FlakyProvider {
    async fn connect(&self) -> Result<(), DataError> {
        self.log.lock().push("connect".to_string());
        Ok(())
    }

    async fn disconnect(&self) {
        self.log.lock().push("disconnect".to_string());
    }

    async fn subscribe(&self, symbols: &[SmolStr]) -> Result<(), DataError> {
        let names = symbols.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
        self.log.lock().push(format!("subscribe:{names}"));
        Ok(())
    }

    async fn unsubscribe(&self, _symbols: &[SmolStr]) -> Result<(), DataError> {
        Ok(())
    }

    async fn get_historical_bars(
        &self,
        _symbol: &SmolStr,
        _timeframe: Timeframe,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<BarMessage>, DataError> {
        Ok(vec![])
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn next_bar(&self) -> Result<Option<BarMessage>, DataError> {
        let call = self.next_bar_calls.fetch_add(1, Ordering::SeqCst);
        // drop the connection exactly once, on the second bar request.
        if call == 1 {
            self.log.lock().push("transient-error".to_string());
            return Err(DataError::Transient("connection reset".to_string()));
        }
        self.log.lock().push(format!("bar:{call}"));
        Ok(Some(BarMessage {
            symbol: SmolStr::new("AAPL"),
            ts: Utc::now(),
            open: dec!(100),
            high: dec!(100),
            low: dec!(100),
            close: dec!(100),
            volume: dec!(1),
            vwap: None,
            trade_count: None,
        }))
    }
}

/// **S6 — Reconnect resubscribes.** After the provider drops mid-session, the driver
/// reconnects and resubscribes the full symbol set before any further bars are published.
#[tokio::test]
async fn s6_reconnect_resubscribes_before_resuming_bars() {
    let bus = Arc::new(EventBus::new(64));
    let provider = Arc::new(FlakyProvider::default());
    let driver = LiveStreamDriver::new(bus, ReconnectPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts: 5,
    });

    let symbols = vec![SmolStr::new("AAPL"), SmolStr::new("MSFT"), SmolStr::new("GOOG")];
    let cancel = CancellationToken::new();
    let driver_cancel = cancel.clone();
    let provider_for_driver = provider.clone() as Arc<dyn MarketDataProvider>;
    let handle = tokio::spawn(async move {
        driver.run(provider_for_driver, "flaky", symbols, driver_cancel).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let _ = handle.await;

    let log = provider.log();
    let subscribe_indices: Vec<usize> = log
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.starts_with("subscribe:"))
        .map(|(i, _)| i)
        .collect();
    assert!(
        subscribe_indices.len() >= 2,
        "expected at least two subscribe calls (initial + post-reconnect), got {log:?}"
    );
    for entry in &log {
        assert!(entry.contains("AAPL") || !entry.starts_with("subscribe:"));
    }

    let transient_idx = log.iter().position(|e| e == "transient-error").expect("a transient error occurred");
    let resubscribe_idx = subscribe_indices[1];
    assert!(
        resubscribe_idx > transient_idx,
        "resubscribe must happen after the transient disconnect, got {log:?}"
    );
    let next_bar_after_resubscribe = log[resubscribe_idx + 1..]
        .iter()
        .position(|e| e.starts_with("bar:"));
    assert!(
        next_bar_after_resubscribe.is_some(),
        "bars should resume after the resubscribe, got {log:?}"
    );
}
