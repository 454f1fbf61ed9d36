#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

//! # Flowtrader Trader
//!
//! Top-level wiring: [`config::Config`] aggregates every component's config fragment,
//! and [`dispatch::run_converter`] is the small subscribe/convert/publish task that
//! drives the signal-to-order converter. The binary in `main.rs` wires all of this
//! together with `core`, `data`, `strategy`, `risk`, and `execution`.

pub mod config;
pub mod dispatch;

pub use config::Config;
