//! # Strategy Runtime (C7 base)
//!
//! [`Strategy`] is the per-strategy contract; [`StrategyRuntime`] is the shared dispatch
//! loop every concrete strategy runs under: subscribe to `MarketData` and `OrderFilled`,
//! filter by [`Strategy::symbols`], and dispatch (spec §4.7).

use async_trait::async_trait;
use chrono::Utc;
use flowtrader_core::{
    bus::EventBus,
    error::EngineError,
    event::{Event, EventKind, MarketDataEvent, OrderFilledEvent, SignalEvent, Symbol},
};
use smol_str::SmolStr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;

/// Per-strategy contract (spec §4.7). `on_order_filled` defaults to a no-op: strategies
/// that don't need fill reconciliation (e.g. opening range breakout, which manages its
/// position purely from bar data) don't have to override it.
#[async_trait]
pub trait Strategy: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn symbols(&self) -> &[Symbol];

    async fn on_market_data(&self, event: &MarketDataEvent, ctx: &StrategyContext);

    async fn on_order_filled(&self, _event: &OrderFilledEvent, _ctx: &StrategyContext) {}
}

/// Handle a running strategy uses to publish signals. Publishing is a no-op while the
/// strategy isn't running (spec §4.7: "publishSignal... drops signals when not running").
#[derive(Debug, Clone)]
pub struct StrategyContext {
    bus: Arc<EventBus>,
    strategy_id: SmolStr,
    running: Arc<AtomicBool>,
}

impl StrategyContext {
    pub fn strategy_id(&self) -> &SmolStr {
        &self.strategy_id
    }

    pub fn publish_signal(&self, mut signal: SignalEvent) {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }
        signal.strategy_id = self.strategy_id.clone();
        self.bus.publish(Event::signal(Utc::now(), signal));
    }

    #[cfg(test)]
    pub fn for_test(bus: Arc<EventBus>, strategy_id: &str, running: Arc<AtomicBool>) -> Self {
        Self {
            bus,
            strategy_id: SmolStr::new(strategy_id),
            running,
        }
    }
}

/// Runs one [`Strategy`] until cancelled: subscribes, dispatches filtered events, and
/// tracks the running flag [`StrategyContext::publish_signal`] checks.
#[derive(Debug)]
pub struct StrategyRuntime {
    bus: Arc<EventBus>,
    strategy: Arc<dyn Strategy>,
    running: Arc<AtomicBool>,
}

impl StrategyRuntime {
    pub fn new(bus: Arc<EventBus>, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            bus,
            strategy,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    fn context(&self) -> StrategyContext {
        StrategyContext {
            bus: self.bus.clone(),
            strategy_id: SmolStr::new(self.strategy.id()),
            running: self.running.clone(),
        }
    }

    /// Subscribes and dispatches until `cancel` fires or the bus closes. Events for
    /// symbols outside [`Strategy::symbols`] are ignored silently (spec §4.7).
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), EngineError> {
        self.running.store(true, Ordering::Relaxed);
        let mut market_data = self.bus.subscribe(EventKind::MarketData)?;
        let mut order_filled = self.bus.subscribe(EventKind::OrderFilled)?;
        let ctx = self.context();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = market_data.recv() => {
                    let Some(event) = maybe else { break };
                    if let Some(data) = event.as_market_data() {
                        if self.strategy.symbols().iter().any(|s| s == &data.symbol) {
                            self.strategy.on_market_data(data, &ctx).await;
                        }
                    }
                }
                maybe = order_filled.recv() => {
                    let Some(event) = maybe else { break };
                    if let Some(fill) = event.as_order_filled() {
                        if self.strategy.symbols().iter().any(|s| s == &fill.symbol) {
                            self.strategy.on_order_filled(fill, &ctx).await;
                        }
                    }
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }
}
