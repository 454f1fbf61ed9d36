use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A fixed-interval OHLCV sample, the common input to every [`crate::BarIndicator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub ts: DateTime<Utc>,
}
