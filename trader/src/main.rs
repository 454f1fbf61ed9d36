//! Wires every component into one running process: backfills history, then streams
//! simulated live bars through the strategies, converter, and execution engine until
//! interrupted (spec §5: "cooperative parallel tasks... communicating exclusively through
//! bus channels").

use flowtrader_core::{
    audit::{AuditLogger, AuditSink, DEFAULT_AUDIT_BUFFER},
    breaker::CircuitBreakerManager,
    bus::EventBus,
    clock::{Clock, SystemClock},
    logging::init_logging,
};
use flowtrader_trader::{dispatch, Config};
use flowtrader_data::{
    BackfillManager, LiveStreamDriver, MarketDataProvider, ReconnectPolicy, SimulatedProvider,
};
use flowtrader_execution::{
    repo::{AuditRepo, InMemoryRepo, OrdersRepo, PortfolioRepo},
    ExecutionEngine, SignalConverter,
};
use flowtrader_risk::RiskManager;
use flowtrader_strategy::{
    OpeningRangeBreakoutStrategy, Strategy, StrategyRuntime, VwapBounceStrategy,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let config = Config::default();

    let bus = Arc::new(EventBus::new(config.bus.buffer_size));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let breaker = Arc::new(CircuitBreakerManager::with_default_params(
        clock.clone(),
        config.database_breaker.into(),
    ));

    let repo = Arc::new(InMemoryRepo::default());
    let (audit_logger, audit_task) =
        AuditLogger::spawn(repo.clone() as Arc<dyn AuditSink>, DEFAULT_AUDIT_BUFFER);

    let risk = Arc::new(RiskManager::new(config.risk.clone(), clock.clone()));
    let converter = Arc::new(SignalConverter::new(config.min_confidence, risk.clone(), audit_logger));

    let engine = Arc::new(ExecutionEngine::new(
        bus.clone(),
        risk.clone(),
        breaker,
        repo.clone() as Arc<dyn OrdersRepo>,
        repo.clone() as Arc<dyn PortfolioRepo>,
        repo as Arc<dyn AuditRepo>,
        clock.clone(),
        config.execution,
    ));

    let provider: Arc<dyn MarketDataProvider> = Arc::new(SimulatedProvider::new(
        config.simulated_starting_price,
        config.simulated_volatility,
    ));

    let backfill = BackfillManager::new(bus.clone(), clock);
    backfill
        .run(provider.as_ref(), &config.symbols, &config.backfill)
        .await?;

    provider.connect().await?;
    provider.subscribe(&config.symbols).await?;

    let vwap_bounce: Arc<dyn Strategy> = Arc::new(VwapBounceStrategy::new(
        "vwap_bounce_1",
        config.symbols.clone(),
        config.vwap_bounce,
    ));
    let orb: Arc<dyn Strategy> = Arc::new(OpeningRangeBreakoutStrategy::new(
        "orb_1",
        config.symbols.clone(),
        config.opening_range_breakout,
    ));

    let cancel = CancellationToken::new();
    tracing::info!(symbols = ?config.symbols, "flowtrader engine starting");

    let engine_run = tokio::spawn(engine.clone().run(cancel.child_token()));
    let engine_matcher = {
        let engine = engine.clone();
        let cancel = cancel.child_token();
        tokio::spawn(async move {
            engine.run_limit_matcher(cancel).await;
        })
    };
    let converter_task = tokio::spawn(dispatch::run_converter(
        bus.clone(),
        converter,
        cancel.child_token(),
    ));
    let driver_task = {
        let driver = LiveStreamDriver::new(bus.clone(), ReconnectPolicy::default());
        let cancel = cancel.child_token();
        let symbols = config.symbols.clone();
        tokio::spawn(async move {
            driver.run(provider, "simulated-provider", symbols, cancel).await;
        })
    };
    let vwap_task = {
        let runtime = StrategyRuntime::new(bus.clone(), vwap_bounce);
        let cancel = cancel.child_token();
        tokio::spawn(async move { runtime.run(cancel).await })
    };
    let orb_task = {
        let runtime = StrategyRuntime::new(bus.clone(), orb);
        let cancel = cancel.child_token();
        tokio::spawn(async move { runtime.run(cancel).await })
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, stopping engine tasks");
    cancel.cancel();
    // audit drain has no cancellation signal of its own; it ends when the process exits.
    let _ = audit_task;

    let _ = engine_run.await;
    let _ = engine_matcher.await;
    let _ = converter_task.await;
    let _ = driver_task.await;
    let _ = vwap_task.await;
    let _ = orb_task.await;
    Ok(())
}
