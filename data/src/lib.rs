#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

//! # Flowtrader Data
//!
//! The market-data boundary: [`provider::MarketDataProvider`] (C4) is the vendor-agnostic
//! contract, [`provider::LiveStreamDriver`] drives it with reconnect-with-backoff, and
//! [`backfill::BackfillManager`] (C5) replays history onto the bus. [`simulated`] and
//! [`historical_csv`] are concrete, in-workspace providers.

pub mod backfill;
pub mod error;
pub mod historical_csv;
pub mod provider;
pub mod simulated;
pub mod wire;

pub use backfill::{BackfillConfig, BackfillManager};
pub use error::DataError;
pub use historical_csv::HistoricalCsvProvider;
pub use provider::{LiveStreamDriver, MarketDataProvider, ReconnectPolicy};
pub use simulated::SimulatedProvider;
