#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

//! # Flowtrader Strategy
//!
//! [`runtime`] is the shared per-strategy dispatch loop (C7); [`vwap_bounce`] and [`orb`]
//! are the two concrete strategies built on it (spec §4.7).

pub mod orb;
pub mod runtime;
pub mod vwap_bounce;

pub use orb::{OpeningRangeBreakoutConfig, OpeningRangeBreakoutStrategy};
pub use runtime::{Strategy, StrategyContext, StrategyRuntime};
pub use vwap_bounce::{VwapBounceConfig, VwapBounceStrategy};
