//! # Audit Logger (C3)
//!
//! Structured event-category logging to a repository. Persistence is best-effort: no
//! circuit breaker guards it, and it must never block the hot path. Implemented as a
//! bounded channel draining into an [`AuditSink`] on a background task, so
//! [`AuditLogger::log_event`] is a synchronous, non-blocking `try_send`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};

/// Event-category enumeration (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventCategory {
    OrderCreated,
    OrderRejected,
    OrderFilled,
    TradeExecuted,
    PositionChanged,
    StrategyStateChanged,
    SystemStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventCategory,
    pub resource: String,
    pub action: String,
    pub status: AuditStatus,
    pub details: Value,
    pub ts: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventCategory,
        resource: impl Into<String>,
        action: impl Into<String>,
        status: AuditStatus,
        details: Value,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            resource: resource.into(),
            action: action.into(),
            status,
            details,
            ts,
        }
    }
}

/// Destination for audit events. Implementors model the out-of-scope persistence
/// binding; `InMemoryAuditSink` and `NullAuditSink` are in-workspace stand-ins.
#[async_trait]
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    async fn write(&self, event: AuditEvent);
}

#[derive(Debug, Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn write(&self, _event: AuditEvent) {}
}

#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: parking_lot::Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn write(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn events_of(&self, category: AuditEventCategory) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == category)
            .cloned()
            .collect()
    }
}

/// Default depth for the audit logger's internal buffer, separate from the bus's
/// buffer — audit volume tracks order/trade volume, not market-data tick volume.
pub const DEFAULT_AUDIT_BUFFER: usize = 1024;

/// Front-end used throughout the engine to record audit events without ever blocking.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditLogger {
    /// Spawns the background drain task and returns the logger handle plus its join
    /// handle (for orderly shutdown).
    pub fn spawn(sink: Arc<dyn AuditSink>, buffer: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(buffer);
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.write(event).await;
            }
        });
        (Self { tx }, handle)
    }

    /// Records an audit event. Never blocks: a full buffer drops the event and logs a
    /// warning, matching the "best-effort" policy in spec §4.3.
    pub fn log_event(&self, event: AuditEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::warn!("audit buffer full, dropping audit event");
        }
    }
}
