#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Flowtrader Core
//!
//! The event-driven concurrency substrate the rest of the trading engine is built on:
//!
//! - [`bus`]: the typed, bounded, fan-out event bus (C1).
//! - [`breaker`]: named circuit breakers guarding downstream I/O (C2).
//! - [`audit`]: structured, best-effort audit logging (C3).
//! - [`event`]: the sealed event model shared by every producer and consumer.
//! - [`clock`]: an injectable time source so breaker/backoff/rollover logic is testable.
//! - [`shutdown`]: cooperative shutdown traits used by every long-lived task.
//!
//! Nothing in this crate talks to a network, a database, or a filesystem: those are the
//! out-of-scope collaborators described in spec §6, consumed here only via traits.

pub mod audit;
pub mod breaker;
pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod shutdown;

pub use bus::EventBus;
pub use clock::Clock;
pub use error::EngineError;
pub use event::{Event, EventKind, EventPayload};
