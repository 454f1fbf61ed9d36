//! Wire-shape types a real vendor adapter would deserialize into (spec §6). Nothing here
//! owns a transport; these are plain data.

use chrono::{DateTime, Utc};
use flowtrader_core::event::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar timeframe. `Display` renders the vendor-style shorthand (`"1m"`, `"1d"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    OneDay,
}

impl Timeframe {
    pub fn duration(self) -> chrono::Duration {
        match self {
            Timeframe::OneMinute => chrono::Duration::minutes(1),
            Timeframe::FiveMinutes => chrono::Duration::minutes(5),
            Timeframe::FifteenMinutes => chrono::Duration::minutes(15),
            Timeframe::OneHour => chrono::Duration::hours(1),
            Timeframe::OneDay => chrono::Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        };
        f.write_str(s)
    }
}

/// A single bar as delivered by the upstream wire protocol: `{symbol, ts, open, high,
/// low, close, volume, vwap?, tradeCount?}` (spec §6). Returned both from the live
/// stream and from `getHistoricalBars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarMessage {
    pub symbol: Symbol,
    pub ts: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub vwap: Option<Decimal>,
    pub trade_count: Option<u64>,
}
