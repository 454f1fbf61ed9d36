//! # Signal-to-Order Converter (C8)
//!
//! Subscribes to [`SignalEvent`]s and turns approved ones into [`OrderEvent`]s. Risk
//! validation and audit logging happen here, before an order ever reaches the engine.

use crate::error::ExecutionError;
use chrono::{DateTime, Utc};
use flowtrader_core::{
    audit::{AuditEvent, AuditEventCategory, AuditLogger, AuditStatus},
    event::{Action, OrderEvent, OrderStatus, OrderType, SignalEvent},
};
use flowtrader_risk::{OrderRequest, RiskManager};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use uuid::Uuid;

/// Converts signals into orders, gating on confidence and risk approval (spec §4.8).
#[derive(Debug)]
pub struct SignalConverter {
    min_confidence: f64,
    risk: Arc<RiskManager>,
    audit: AuditLogger,
    enabled: AtomicBool,
}

impl SignalConverter {
    pub fn new(min_confidence: f64, risk: Arc<RiskManager>, audit: AuditLogger) -> Self {
        Self {
            min_confidence,
            risk,
            audit,
            enabled: AtomicBool::new(true),
        }
    }

    /// Runtime-toggleable manual-trading-mode switch; while disabled every signal is
    /// dropped without risk evaluation.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Converts one signal into an order event, or `None` if it was dropped (HOLD,
    /// below-confidence, or risk-rejected). Errors are reserved for malformed input that
    /// should never reach this point given a well-behaved strategy.
    pub fn convert(
        &self,
        signal: &SignalEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<OrderEvent>, ExecutionError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        if signal.action == Action::Hold {
            return Ok(None);
        }
        if signal.confidence < self.min_confidence {
            return Ok(None);
        }
        if signal.quantity <= Decimal::ZERO {
            return Err(ExecutionError::InvalidQuantity);
        }

        let order_type = if signal.price > Decimal::ZERO {
            OrderType::Limit
        } else {
            OrderType::Market
        };

        let req = OrderRequest {
            symbol: signal.symbol.clone(),
            action: signal.action,
            quantity: signal.quantity,
            price: signal.price,
        };

        let validation = self.risk.validate_order(&req);
        if !validation.approved {
            self.audit.log_event(AuditEvent::new(
                AuditEventCategory::OrderRejected,
                signal.symbol.as_str(),
                "validate_order",
                AuditStatus::Failure,
                json!({
                    "strategy_id": signal.strategy_id.as_str(),
                    "rejections": validation.rejections,
                }),
                now,
            ));
            return Ok(None);
        }
        self.risk.record_order(&req);

        let order = OrderEvent {
            order_id: Uuid::new_v4(),
            strategy_id: signal.strategy_id.clone(),
            symbol: signal.symbol.clone(),
            action: signal.action,
            quantity: signal.quantity,
            price: signal.price,
            order_type,
            status: OrderStatus::Pending,
        };

        self.audit.log_event(AuditEvent::new(
            AuditEventCategory::OrderCreated,
            order.symbol.as_str(),
            "create",
            AuditStatus::Success,
            json!({
                "order_id": order.order_id.to_string(),
                "strategy_id": order.strategy_id.as_str(),
                "action": format!("{:?}", order.action),
                "quantity": order.quantity.to_string(),
            }),
            now,
        ));

        Ok(Some(order))
    }
}
