//! # Event Model
//!
//! Defines the sealed [`Event`] type that flows across the [`crate::bus::EventBus`]:
//! every variant the engine produces or consumes is a member of [`EventPayload`], and
//! every [`Event`] carries a wall-clock construction timestamp alongside its payload.
//!
//! Events are immutable once constructed: builders take owned fields, there are no
//! setters, and `Event` itself only implements `Clone` (for per-subscriber fan-out), not
//! `Clone + mut` access.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;

/// Ticker-like identifier for a tradeable instrument.
pub type Symbol = SmolStr;

/// Side of a signal or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// How an order should be matched against the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

/// Lifecycle state of an order. `Filled`, `Cancelled`, and `Rejected` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Submitted,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Lifecycle status reported by a [`SystemStatusEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentStatus {
    Starting,
    Running,
    Stopped,
    Error,
}

/// A single OHLCV bar for `symbol`, carrying its own `data_timestamp` distinct from the
/// enclosing [`Event::ts`] (which is wall-clock construction time; see module docs on
/// backfill replay for why the two differ).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataEvent {
    pub symbol: Symbol,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub data_timestamp: DateTime<Utc>,
}

/// A trading signal emitted by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub strategy_id: SmolStr,
    pub symbol: Symbol,
    pub action: Action,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// `0` means "no limit", i.e. market order.
    pub price: Decimal,
    pub quantity: Decimal,
    pub reason: String,
}

/// An order as tracked on the bus (not to be confused with the execution engine's
/// internal `PendingOrder`, which carries fill progress).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub strategy_id: SmolStr,
    pub symbol: Symbol,
    pub action: Action,
    pub quantity: Decimal,
    pub price: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
}

/// Settlement of all or part of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFilledEvent {
    pub order_id: Uuid,
    pub strategy_id: SmolStr,
    pub symbol: Symbol,
    pub action: Action,
    pub requested_qty: Decimal,
    pub filled_qty: Decimal,
    pub fill_price: Decimal,
    pub commission: Decimal,
    pub fill_time: DateTime<Utc>,
}

/// Component lifecycle / degradation signal, the sole runtime indicator that something
/// degraded (spec §7: dashboards render these as toasts or banners).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatusEvent {
    pub component: String,
    pub status: ComponentStatus,
    pub message: String,
}

/// The discriminant used for bus subscription routing. Kept separate from `EventPayload`
/// so subscribers can express "give me all `MarketData` events" without constructing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MarketData,
    Signal,
    Order,
    OrderFilled,
    SystemStatus,
}

/// Sealed payload carried by every [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    MarketData(MarketDataEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    OrderFilled(OrderFilledEvent),
    SystemStatus(SystemStatusEvent),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::MarketData(_) => EventKind::MarketData,
            EventPayload::Signal(_) => EventKind::Signal,
            EventPayload::Order(_) => EventKind::Order,
            EventPayload::OrderFilled(_) => EventKind::OrderFilled,
            EventPayload::SystemStatus(_) => EventKind::SystemStatus,
        }
    }
}

/// An immutable, timestamped event on the bus: tag (via [`EventPayload`]'s discriminant)
/// + timestamp + payload, per the data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(ts: DateTime<Utc>, payload: EventPayload) -> Self {
        Self { ts, payload }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn market_data(ts: DateTime<Utc>, data: MarketDataEvent) -> Self {
        Self::new(ts, EventPayload::MarketData(data))
    }

    pub fn signal(ts: DateTime<Utc>, data: SignalEvent) -> Self {
        Self::new(ts, EventPayload::Signal(data))
    }

    pub fn order(ts: DateTime<Utc>, data: OrderEvent) -> Self {
        Self::new(ts, EventPayload::Order(data))
    }

    pub fn order_filled(ts: DateTime<Utc>, data: OrderFilledEvent) -> Self {
        Self::new(ts, EventPayload::OrderFilled(data))
    }

    pub fn system_status(ts: DateTime<Utc>, data: SystemStatusEvent) -> Self {
        Self::new(ts, EventPayload::SystemStatus(data))
    }

    /// Extracts the `MarketData` payload, if this event is one.
    pub fn as_market_data(&self) -> Option<&MarketDataEvent> {
        match &self.payload {
            EventPayload::MarketData(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&SignalEvent> {
        match &self.payload {
            EventPayload::Signal(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_order(&self) -> Option<&OrderEvent> {
        match &self.payload {
            EventPayload::Order(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_order_filled(&self) -> Option<&OrderFilledEvent> {
        match &self.payload {
            EventPayload::OrderFilled(e) => Some(e),
            _ => None,
        }
    }
}
