//! # Execution Engine (C10)
//!
//! Owns the [`MarketPrice`] cache, the `PendingOrder` map, and (through a repository) the
//! position store. Handles `Order` events published by the converter, matches them against
//! cached prices, and publishes `OrderFilled` events on the bus.

use crate::{
    error::ExecutionError,
    repo::{AuditRepo, OrdersRepo, PortfolioRepo},
    state::{MarketPrice, PendingOrder, Position, Trade},
};
use chrono::{DateTime, Utc};
use flowtrader_core::{
    audit::{AuditEvent, AuditEventCategory, AuditStatus},
    breaker::{BreakerError, CircuitBreakerManager},
    bus::EventBus,
    clock::Clock,
    event::{Action, Event, EventKind, OrderEvent, OrderFilledEvent, OrderStatus, OrderType, Symbol},
};
use flowtrader_risk::{OrderRequest, RiskManager};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tunables governing matching and commissions (spec §4.10, commission resolved as an
/// Open Question in SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// When true, market fills carry the demo slippage described in spec §4.10.
    pub demo_mode: bool,
    /// Symmetric spread applied when synthesizing `MarketPrice` from a trade price, e.g.
    /// `0.001` for 10 bps.
    pub spread_fraction: Decimal,
    /// Demo-mode slippage applied to market fills, e.g. `0.0005` for 5 bps.
    pub demo_slippage_fraction: Decimal,
    /// How often the limit-order matcher polls cached prices.
    pub limit_poll_interval: Duration,
    pub commission_per_share: Decimal,
    pub commission_minimum: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            demo_mode: true,
            spread_fraction: Decimal::new(1, 3),
            demo_slippage_fraction: Decimal::new(5, 4),
            limit_poll_interval: Duration::from_secs(1),
            commission_per_share: Decimal::new(1, 2),
            commission_minimum: Decimal::ONE,
        }
    }
}

#[derive(Debug, Default)]
struct ExecutionMetrics {
    total_executions: AtomicU64,
    total_rejections: AtomicU64,
    total_volume: Mutex<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionMetricsSnapshot {
    pub total_executions: u64,
    pub total_rejections: u64,
    pub total_volume: Decimal,
    pub pending_orders_count: usize,
}

/// Matches, fills, and books orders. One instance is shared across the order-handling
/// call site and the limit-matcher task.
pub struct ExecutionEngine {
    bus: Arc<EventBus>,
    risk: Arc<RiskManager>,
    breaker: Arc<CircuitBreakerManager>,
    orders_repo: Arc<dyn OrdersRepo>,
    portfolio_repo: Arc<dyn PortfolioRepo>,
    audit: Arc<dyn AuditRepo>,
    clock: Arc<dyn Clock>,
    config: ExecutionConfig,
    prices: RwLock<HashMap<Symbol, MarketPrice>>,
    pending: Mutex<HashMap<Uuid, PendingOrder>>,
    metrics: ExecutionMetrics,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.config)
            .field("pending_orders", &self.pending.lock().len())
            .finish()
    }
}

impl ExecutionEngine {
    pub fn new(
        bus: Arc<EventBus>,
        risk: Arc<RiskManager>,
        breaker: Arc<CircuitBreakerManager>,
        orders_repo: Arc<dyn OrdersRepo>,
        portfolio_repo: Arc<dyn PortfolioRepo>,
        audit: Arc<dyn AuditRepo>,
        clock: Arc<dyn Clock>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            bus,
            risk,
            breaker,
            orders_repo,
            portfolio_repo,
            audit,
            clock,
            config,
            prices: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            metrics: ExecutionMetrics::default(),
        }
    }

    /// Refreshes the `MarketPrice` cache for `symbol` from the latest trade price.
    pub fn update_price(&self, symbol: &Symbol, last: Decimal, ts: DateTime<Utc>) {
        let price = MarketPrice::from_last(last, self.config.spread_fraction, ts);
        self.prices.write().insert(symbol.clone(), price);
    }

    pub fn price_of(&self, symbol: &Symbol) -> Option<MarketPrice> {
        self.prices.read().get(symbol).copied()
    }

    pub fn metrics(&self) -> ExecutionMetricsSnapshot {
        ExecutionMetricsSnapshot {
            total_executions: self.metrics.total_executions.load(Ordering::Relaxed),
            total_rejections: self.metrics.total_rejections.load(Ordering::Relaxed),
            total_volume: *self.metrics.total_volume.lock(),
            pending_orders_count: self.pending.lock().len(),
        }
    }

    /// Handles a freshly-converted `Order` event (spec §4.10 points 1-4).
    pub async fn handle_order(&self, order: &OrderEvent) -> Result<(), ExecutionError> {
        if order.action == Action::Hold {
            return Err(ExecutionError::InvalidAction);
        }
        if order.quantity <= Decimal::ZERO {
            return Err(ExecutionError::InvalidQuantity);
        }

        let req = OrderRequest {
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: order.quantity,
            price: order.price,
        };
        let revalidation = self.risk.validate_order(&req);
        if !revalidation.approved {
            self.metrics.total_rejections.fetch_add(1, Ordering::Relaxed);
            self.write_order_status(order.order_id, OrderStatus::Rejected).await;
            self.audit
                .write(AuditEvent::new(
                    AuditEventCategory::OrderRejected,
                    order.symbol.as_str(),
                    "revalidate",
                    AuditStatus::Failure,
                    json!({ "order_id": order.order_id.to_string(), "rejections": revalidation.rejections }),
                    self.clock.now(),
                ))
                .await;
            return Ok(());
        }

        let pending = PendingOrder {
            order_id: order.order_id,
            strategy_id: order.strategy_id.clone(),
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: order.quantity,
            order_type: order.order_type,
            limit_price: (order.order_type != OrderType::Market).then_some(order.price),
            filled_qty: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            status: OrderStatus::Submitted,
            submitted_at: self.clock.now(),
        };
        self.persist_order(&pending).await;
        self.pending.lock().insert(pending.order_id, pending);

        if order.order_type == OrderType::Market {
            self.try_fill(order.order_id).await;
        }
        Ok(())
    }

    /// Subscribes to `MarketData` (refreshing the price cache) and `Order` (handling each
    /// one) until cancelled. Runs as its own task alongside [`Self::run_limit_matcher`]
    /// (spec §4.10: "market-data consumer goroutine in the execution engine").
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), flowtrader_core::EngineError> {
        let mut market_data = self.bus.subscribe(EventKind::MarketData)?;
        let mut orders = self.bus.subscribe(EventKind::Order)?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = market_data.recv() => {
                    let Some(event) = maybe else { break };
                    if let Some(data) = event.as_market_data() {
                        self.update_price(&data.symbol, data.close, event.ts);
                    }
                }
                maybe = orders.recv() => {
                    let Some(event) = maybe else { break };
                    if let Some(order) = event.as_order() {
                        if let Err(err) = self.handle_order(order).await {
                            tracing::warn!(?err, order_id = %order.order_id, "order handling failed");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs the 1 s (configurable) limit-matcher loop until cancelled.
    pub async fn run_limit_matcher(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.limit_poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let order_ids: Vec<Uuid> = self
                        .pending
                        .lock()
                        .values()
                        .filter(|o| o.order_type == OrderType::Limit)
                        .map(|o| o.order_id)
                        .collect();
                    for id in order_ids {
                        self.try_fill(id).await;
                    }
                }
            }
        }
    }

    /// Attempts to match a pending order against the cached price, filling it if the
    /// matching rule (spec §4.10) is satisfied.
    async fn try_fill(&self, order_id: Uuid) {
        let Some(order) = self.pending.lock().get(&order_id).cloned() else {
            return;
        };
        let Some(price) = self.price_of(&order.symbol) else {
            return;
        };

        let Some(fill_price) = self.matched_price(&order, &price) else {
            return;
        };

        let fill_qty = order.remaining();
        if fill_qty <= Decimal::ZERO {
            return;
        }

        self.apply_fill(order_id, fill_qty, fill_price).await;
    }

    fn matched_price(&self, order: &PendingOrder, price: &MarketPrice) -> Option<Decimal> {
        match (order.order_type, order.action) {
            (OrderType::Market, Action::Buy) => Some(self.with_slippage(price.ask, true)),
            (OrderType::Market, Action::Sell) => Some(self.with_slippage(price.bid, false)),
            (OrderType::Limit, Action::Buy) => {
                let limit = order.limit_price?;
                (price.ask <= limit).then_some(limit)
            }
            (OrderType::Limit, Action::Sell) => {
                let limit = order.limit_price?;
                (price.bid >= limit).then_some(limit)
            }
            _ => None,
        }
    }

    fn with_slippage(&self, price: Decimal, buying: bool) -> Decimal {
        if !self.config.demo_mode {
            return price;
        }
        let adjustment = price * self.config.demo_slippage_fraction;
        if buying {
            price + adjustment
        } else {
            price - adjustment
        }
    }

    /// Applies a fill: updates the pending order, persists, updates the position, and
    /// publishes `OrderFilled` (spec §4.10 points 1-6).
    async fn apply_fill(&self, order_id: Uuid, fill_qty: Decimal, fill_price: Decimal) {
        let now = self.clock.now();
        let commission = self.commission(fill_qty);

        let (order, is_complete) = {
            let mut pending = self.pending.lock();
            let Some(order) = pending.get_mut(&order_id) else {
                return;
            };
            order.apply_fill(fill_qty, fill_price);
            let complete = order.filled_qty >= order.quantity;
            (order.clone(), complete)
        };

        match self
            .breaker
            .execute("db", || self.orders_repo.fill_order(order_id, fill_qty, fill_price))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%err, "failed to persist order fill"),
            Err(BreakerError::Open) => tracing::warn!("db breaker open, order fill not persisted"),
            Err(BreakerError::Inner(err)) => tracing::warn!(%err, "failed to persist order fill"),
        }

        let trade = Trade {
            id: Uuid::new_v4(),
            order_id,
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: fill_qty,
            price: fill_price,
            commission,
            executed_at: now,
        };
        match self.breaker.execute("db", || self.orders_repo.create_trade(&trade)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%err, "failed to persist trade"),
            Err(BreakerError::Open) => tracing::warn!("db breaker open, trade not persisted"),
            Err(BreakerError::Inner(err)) => tracing::warn!(%err, "failed to persist trade"),
        }

        let existing = self
            .portfolio_repo
            .get_position(&order.symbol)
            .await
            .unwrap_or(None);
        let (position, realized_pnl) =
            Position::apply_fill(existing, &order.symbol, order.action, fill_qty, fill_price, now);
        if let Err(err) = self.portfolio_repo.upsert_position(&position).await {
            tracing::warn!(%err, "failed to persist position");
        }
        if !realized_pnl.is_zero() {
            self.risk.record_realized_pnl(realized_pnl);
        }

        self.metrics.total_executions.fetch_add(1, Ordering::Relaxed);
        *self.metrics.total_volume.lock() += fill_qty * fill_price;

        self.bus.publish(Event::order_filled(
            now,
            OrderFilledEvent {
                order_id,
                strategy_id: order.strategy_id.clone(),
                symbol: order.symbol.clone(),
                action: order.action,
                requested_qty: order.quantity,
                filled_qty: order.filled_qty,
                fill_price,
                commission,
                fill_time: now,
            },
        ));

        self.audit
            .write(AuditEvent::new(
                AuditEventCategory::TradeExecuted,
                order.symbol.as_str(),
                "fill",
                AuditStatus::Success,
                json!({
                    "order_id": order_id.to_string(),
                    "quantity": fill_qty.to_string(),
                    "price": fill_price.to_string(),
                }),
                now,
            ))
            .await;
        self.audit
            .write(AuditEvent::new(
                AuditEventCategory::OrderFilled,
                order.symbol.as_str(),
                "fill",
                AuditStatus::Success,
                json!({ "order_id": order_id.to_string(), "filled_qty": order.filled_qty.to_string() }),
                now,
            ))
            .await;
        self.audit
            .write(AuditEvent::new(
                AuditEventCategory::PositionChanged,
                order.symbol.as_str(),
                "upsert",
                AuditStatus::Success,
                json!({ "quantity": position.quantity.to_string(), "side": format!("{:?}", position.side) }),
                now,
            ))
            .await;

        if is_complete {
            self.pending.lock().remove(&order_id);
        }
    }

    fn commission(&self, quantity: Decimal) -> Decimal {
        (quantity * self.config.commission_per_share).max(self.config.commission_minimum)
    }

    async fn write_order_status(&self, order_id: Uuid, status: OrderStatus) {
        match self
            .breaker
            .execute("db", || self.orders_repo.update_order_status(order_id, status))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%err, "failed to persist order status"),
            Err(BreakerError::Open) => tracing::warn!("db breaker open, order status not persisted"),
            Err(BreakerError::Inner(err)) => tracing::warn!(%err, "failed to persist order status"),
        }
    }

    async fn persist_order(&self, order: &PendingOrder) {
        match self.breaker.execute("db", || self.orders_repo.upsert_order(order)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%err, "failed to persist order"),
            Err(BreakerError::Open) => tracing::warn!("db breaker open, order not persisted"),
            Err(BreakerError::Inner(err)) => tracing::warn!(%err, "failed to persist order"),
        }
    }

    pub fn event_kind_filter() -> EventKind {
        EventKind::Order
    }
}
