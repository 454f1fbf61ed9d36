//! # Market Data Provider (C4)
//!
//! [`MarketDataProvider`] is the vendor-agnostic contract; [`LiveStreamDriver`] wraps any
//! implementation with the reconnect-with-backoff policy from spec §4.4 and publishes the
//! resulting bars onto the bus as `MarketData` events.

use crate::{error::DataError, wire::BarMessage, wire::Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowtrader_core::{
    bus::EventBus,
    event::{ComponentStatus, Event, MarketDataEvent, Symbol, SystemStatusEvent},
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Exponential backoff parameters for reconnection (spec §4.4), named after the
/// reconnection-policy shape used elsewhere in the ecosystem.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.min(32);
        let scaled = self.initial_delay.saturating_mul(1u32.checked_shl(doublings).unwrap_or(u32::MAX));
        scaled.min(self.max_delay)
    }
}

/// Vendor-agnostic market data provider contract (spec §4.4).
#[async_trait]
pub trait MarketDataProvider: Send + Sync + std::fmt::Debug {
    async fn connect(&self) -> Result<(), DataError>;
    async fn disconnect(&self);
    async fn subscribe(&self, symbols: &[Symbol]) -> Result<(), DataError>;
    async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<(), DataError>;
    async fn get_historical_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarMessage>, DataError>;
    fn is_connected(&self) -> bool;

    /// Pulls the next bar from the live stream. `Ok(None)` means the stream has no bar
    /// ready right now but remains healthy (callers should call again); providers that
    /// don't support live streaming (e.g. a historical-only source) always return this.
    async fn next_bar(&self) -> Result<Option<BarMessage>, DataError>;
}

/// Drives a [`MarketDataProvider`]'s live stream with reconnect-with-backoff, resubscribing
/// every previously-subscribed symbol after each reconnect, and publishing `MarketData` /
/// `SystemStatus` events onto the bus (spec §4.4).
pub struct LiveStreamDriver {
    bus: Arc<EventBus>,
    policy: ReconnectPolicy,
}

impl LiveStreamDriver {
    pub fn new(bus: Arc<EventBus>, policy: ReconnectPolicy) -> Self {
        Self { bus, policy }
    }

    fn status(&self, component: &str, status: ComponentStatus, message: impl Into<String>) {
        self.bus.publish(Event::system_status(
            Utc::now(),
            SystemStatusEvent {
                component: component.to_string(),
                status,
                message: message.into(),
            },
        ));
    }

    /// Runs until `cancel` fires or a `Fatal`/`AuthFailed` error ends the stream. Exits
    /// cleanly in both cases; callers observe the outcome via `SystemStatus` events.
    pub async fn run(
        &self,
        provider: Arc<dyn MarketDataProvider>,
        component: &str,
        symbols: Vec<Symbol>,
        cancel: CancellationToken,
    ) {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return;
            }

            match provider.connect().await {
                Ok(()) => {}
                Err(DataError::AuthFailed) => {
                    self.status(component, ComponentStatus::Error, "authentication failed");
                    return;
                }
                Err(err) => {
                    attempt += 1;
                    if attempt > self.policy.max_attempts {
                        self.status(component, ComponentStatus::Error, "reconnect attempts exhausted");
                        return;
                    }
                    self.status(component, ComponentStatus::Starting, format!("connect failed: {err}"));
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.policy.delay_for(attempt)) => {}
                    }
                    continue;
                }
            }

            if let Err(err) = provider.subscribe(&symbols).await {
                self.status(component, ComponentStatus::Error, format!("subscribe failed: {err}"));
                return;
            }
            attempt = 0;
            self.status(component, ComponentStatus::Running, "connected and subscribed");

            loop {
                if cancel.is_cancelled() {
                    provider.disconnect().await;
                    self.status(component, ComponentStatus::Stopped, "cancelled");
                    return;
                }
                match provider.next_bar().await {
                    Ok(Some(bar)) => {
                        self.bus.publish(Event::market_data(
                            Utc::now(),
                            MarketDataEvent {
                                symbol: bar.symbol,
                                open: bar.open,
                                high: bar.high,
                                low: bar.low,
                                close: bar.close,
                                volume: bar.volume,
                                data_timestamp: bar.ts,
                            },
                        ));
                    }
                    Ok(None) => {}
                    Err(DataError::Transient(msg)) => {
                        self.status(component, ComponentStatus::Starting, format!("disconnected: {msg}"));
                        provider.disconnect().await;
                        break;
                    }
                    Err(err) => {
                        self.status(component, ComponentStatus::Error, format!("fatal: {err}"));
                        provider.disconnect().await;
                        return;
                    }
                }
            }
        }
    }
}
