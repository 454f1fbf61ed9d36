#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

//! # Indicators Library (C6)
//!
//! Pure state machines: identical bar sequences yield identical outputs, independent of
//! wall-clock time or process restarts. Two update shapes are used depending on what the
//! indicator needs:
//!
//! - [`PriceIndicator::update`] for indicators driven by a single price ([`Ema`]).
//! - [`BarIndicator::update_ohlcv`] for indicators driven by a full OHLCV bar ([`Atr`],
//!   [`Vwap`], [`RollingHighLow`]).

mod atr;
mod bar;
mod ema;
mod rolling;
mod vwap;

pub use atr::Atr;
pub use bar::Bar;
pub use ema::Ema;
pub use rolling::RollingHighLow;
pub use vwap::Vwap;

use rust_decimal::Decimal;

/// Shared read surface for every indicator.
pub trait Indicator {
    /// Current indicator value. Meaningless (but well-defined, usually zero) before
    /// [`Indicator::is_ready`] returns `true`.
    fn value(&self) -> Decimal;

    /// Becomes `true` once the warm-up period has elapsed and remains `true` thereafter.
    fn is_ready(&self) -> bool;

    /// Clears all accumulated state, returning the indicator to its freshly-constructed
    /// state.
    fn reset(&mut self);
}

/// Indicators updated one price at a time.
pub trait PriceIndicator: Indicator {
    fn update(&mut self, price: Decimal);
}

/// Indicators updated one OHLCV bar at a time.
pub trait BarIndicator: Indicator {
    fn update_ohlcv(&mut self, bar: &Bar);
}
