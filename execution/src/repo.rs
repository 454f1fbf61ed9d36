//! # Repository contract (consumed, not implemented by the core)
//!
//! Spec §6 names these as external collaborators: persistent storage bindings live
//! outside this crate's scope. [`InMemoryRepo`] is an in-workspace stand-in used for
//! local runs, paper trading, and tests, playing the same role the teacher's repository
//! trait objects play against a real database.

use crate::{
    error::RepoError,
    state::{PendingOrder, Position, Trade},
};
use async_trait::async_trait;
use flowtrader_core::{
    audit::{AuditEvent, AuditSink},
    event::{OrderStatus, Symbol},
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait OrdersRepo: Send + Sync + std::fmt::Debug {
    async fn upsert_order(&self, order: &PendingOrder) -> Result<(), RepoError>;
    async fn update_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(), RepoError>;
    async fn fill_order(&self, order_id: Uuid, filled_qty: Decimal, price: Decimal) -> Result<(), RepoError>;
    async fn create_trade(&self, trade: &Trade) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PortfolioRepo: Send + Sync + std::fmt::Debug {
    async fn get_position(&self, symbol: &Symbol) -> Result<Option<Position>, RepoError>;
    async fn upsert_position(&self, position: &Position) -> Result<(), RepoError>;
    async fn list_positions(&self) -> Result<Vec<Position>, RepoError>;
}

/// Marker trait tying the audit repository into the shared [`AuditSink`] contract, so a
/// single implementation can serve both the engine's `auditRepo.write` calls and the
/// core [`flowtrader_core::audit::AuditLogger`]'s background drain.
pub trait AuditRepo: AuditSink {}
impl<T: AuditSink> AuditRepo for T {}

/// In-memory stand-in for the orders/portfolio/audit repositories.
#[derive(Debug, Default)]
pub struct InMemoryRepo {
    orders: Mutex<HashMap<Uuid, PendingOrder>>,
    trades: Mutex<Vec<Trade>>,
    positions: Mutex<HashMap<Symbol, Position>>,
    audit: Mutex<Vec<AuditEvent>>,
}

impl InMemoryRepo {
    pub fn trades(&self) -> Vec<Trade> {
        self.trades.lock().clone()
    }

    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit.lock().clone()
    }
}

#[async_trait]
impl OrdersRepo for InMemoryRepo {
    async fn upsert_order(&self, order: &PendingOrder) -> Result<(), RepoError> {
        self.orders.lock().insert(order.order_id, order.clone());
        Ok(())
    }

    async fn update_order_status(&self, order_id: Uuid, status: OrderStatus) -> Result<(), RepoError> {
        match self.orders.lock().get_mut(&order_id) {
            Some(order) => {
                order.status = status;
                Ok(())
            }
            None => Err(RepoError(format!("unknown order {order_id}"))),
        }
    }

    async fn fill_order(&self, order_id: Uuid, filled_qty: Decimal, price: Decimal) -> Result<(), RepoError> {
        match self.orders.lock().get_mut(&order_id) {
            Some(order) => {
                order.apply_fill(filled_qty, price);
                Ok(())
            }
            None => Err(RepoError(format!("unknown order {order_id}"))),
        }
    }

    async fn create_trade(&self, trade: &Trade) -> Result<(), RepoError> {
        self.trades.lock().push(trade.clone());
        Ok(())
    }
}

#[async_trait]
impl PortfolioRepo for InMemoryRepo {
    async fn get_position(&self, symbol: &Symbol) -> Result<Option<Position>, RepoError> {
        Ok(self.positions.lock().get(symbol).cloned())
    }

    async fn upsert_position(&self, position: &Position) -> Result<(), RepoError> {
        self.positions
            .lock()
            .insert(position.symbol.clone(), position.clone());
        Ok(())
    }

    async fn list_positions(&self) -> Result<Vec<Position>, RepoError> {
        Ok(self.positions.lock().values().cloned().collect())
    }
}

#[async_trait]
impl AuditSink for InMemoryRepo {
    async fn write(&self, event: AuditEvent) {
        self.audit.lock().push(event);
    }
}
