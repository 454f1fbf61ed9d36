//! A deterministic, in-memory [`MarketDataProvider`] so the engine is runnable and
//! testable without a live vendor connection (SPEC_FULL.md §4.4 supplement).

use crate::{
    error::DataError,
    provider::MarketDataProvider,
    wire::{BarMessage, Timeframe},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowtrader_core::event::Symbol;
use indexmap::IndexSet;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rust_decimal::Decimal;
use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

struct Walk {
    rng: StdRng,
    last_close: Decimal,
}

fn seed_for(symbol: &Symbol) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    symbol.hash(&mut hasher);
    hasher.finish()
}

/// Generates a pseudo-random walk of bars per subscribed symbol, one per `next_bar` call,
/// round-robin across the subscription set.
#[derive(Debug)]
pub struct SimulatedProvider {
    connected: AtomicBool,
    symbols: Mutex<IndexSet<Symbol>>,
    cursor: AtomicUsize,
    walks: Mutex<HashMap<Symbol, Walk>>,
    starting_price: Decimal,
    volatility: Decimal,
}

impl std::fmt::Debug for Walk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walk").field("last_close", &self.last_close).finish()
    }
}

impl SimulatedProvider {
    pub fn new(starting_price: Decimal, volatility: Decimal) -> Self {
        Self {
            connected: AtomicBool::new(false),
            symbols: Mutex::new(IndexSet::new()),
            cursor: AtomicUsize::new(0),
            walks: Mutex::new(HashMap::new()),
            starting_price,
            volatility,
        }
    }

    fn step(&self, symbol: &Symbol, ts: DateTime<Utc>) -> BarMessage {
        let mut walks = self.walks.lock();
        let walk = walks.entry(symbol.clone()).or_insert_with(|| Walk {
            rng: StdRng::seed_from_u64(seed_for(symbol)),
            last_close: self.starting_price,
        });

        let drift: f64 = walk.rng.random_range(-1.0..1.0);
        let volatility_f64 = decimal_to_f64(self.volatility);
        let last_close_f64 = decimal_to_f64(walk.last_close);
        let delta = drift * volatility_f64 * last_close_f64;
        let new_close_f64 = (last_close_f64 + delta).max(0.01);
        let new_close = f64_to_decimal(new_close_f64);

        let high = new_close.max(walk.last_close) * Decimal::new(10005, 4);
        let low = new_close.min(walk.last_close) * Decimal::new(9995, 4);
        let open = walk.last_close;
        let volume = Decimal::from(100u32 + (walk.rng.random_range(0..900) as u32));

        let bar = BarMessage {
            symbol: symbol.clone(),
            ts,
            open,
            high,
            low,
            close: new_close,
            volume,
            vwap: None,
            trade_count: None,
        };
        walk.last_close = new_close;
        bar
    }
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}

fn f64_to_decimal(v: f64) -> Decimal {
    Decimal::try_from(v).unwrap_or(Decimal::ZERO)
}

#[async_trait]
impl MarketDataProvider for SimulatedProvider {
    async fn connect(&self) -> Result<(), DataError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn subscribe(&self, symbols: &[Symbol]) -> Result<(), DataError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DataError::NotConnected);
        }
        let mut set = self.symbols.lock();
        for symbol in symbols {
            set.insert(symbol.clone());
        }
        Ok(())
    }

    async fn unsubscribe(&self, symbols: &[Symbol]) -> Result<(), DataError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DataError::NotConnected);
        }
        let mut set = self.symbols.lock();
        for symbol in symbols {
            set.shift_remove(symbol);
        }
        Ok(())
    }

    async fn get_historical_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarMessage>, DataError> {
        let step = timeframe.duration();
        if step <= chrono::Duration::zero() || start >= end {
            return Ok(Vec::new());
        }
        let mut bars = Vec::new();
        let mut ts = start;
        while ts <= end {
            bars.push(self.step(symbol, ts));
            ts += step;
        }
        Ok(bars)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn next_bar(&self) -> Result<Option<BarMessage>, DataError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DataError::NotConnected);
        }
        let symbols = self.symbols.lock();
        if symbols.is_empty() {
            return Ok(None);
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % symbols.len();
        let symbol = symbols[idx].clone();
        drop(symbols);
        Ok(Some(self.step(&symbol, Utc::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    #[tokio::test]
    async fn subscribe_before_connect_fails() {
        let provider = SimulatedProvider::new(dec!(100), dec!(0.01));
        let err = provider
            .subscribe(&[SmolStr::new("AAPL")])
            .await
            .unwrap_err();
        assert_eq!(err, DataError::NotConnected);
    }

    #[tokio::test]
    async fn same_seed_produces_identical_walk() {
        let a = SimulatedProvider::new(dec!(100), dec!(0.02));
        let b = SimulatedProvider::new(dec!(100), dec!(0.02));
        a.connect().await.unwrap();
        b.connect().await.unwrap();
        a.subscribe(&[SmolStr::new("AAPL")]).await.unwrap();
        b.subscribe(&[SmolStr::new("AAPL")]).await.unwrap();

        let ts = Utc::now();
        let bar_a = a.step(&SmolStr::new("AAPL"), ts);
        let bar_b = b.step(&SmolStr::new("AAPL"), ts);
        assert_eq!(bar_a.close, bar_b.close);
    }

    #[tokio::test]
    async fn historical_bars_are_timestamp_ascending() {
        let provider = SimulatedProvider::new(dec!(100), dec!(0.01));
        let start = Utc::now();
        let end = start + chrono::Duration::hours(1);
        let bars = provider
            .get_historical_bars(&SmolStr::new("AAPL"), Timeframe::FiveMinutes, start, end)
            .await
            .unwrap();
        assert!(bars.len() >= 12);
        for pair in bars.windows(2) {
            assert!(pair[0].ts < pair[1].ts);
        }
    }
}
