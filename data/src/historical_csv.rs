//! Reads historical bars from a CSV fixture for backfill and replay tests when a richer
//! historical fixture than [`crate::simulated::SimulatedProvider`]'s random walk is wanted
//! (SPEC_FULL.md §4.4 supplement). Expected columns: `ts,open,high,low,close,volume`.

use crate::{
    error::DataError,
    provider::MarketDataProvider,
    wire::{BarMessage, Timeframe},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowtrader_core::event::Symbol;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Deserialize)]
struct CsvRow {
    ts: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

/// A [`MarketDataProvider`] backed by a single CSV file, all bars attributed to one
/// `symbol`. Has no live stream: `next_bar` always returns `Ok(None)`.
#[derive(Debug)]
pub struct HistoricalCsvProvider {
    path: PathBuf,
    symbol: Symbol,
    connected: AtomicBool,
}

impl HistoricalCsvProvider {
    pub fn new(path: impl AsRef<Path>, symbol: Symbol) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            symbol,
            connected: AtomicBool::new(false),
        }
    }

    fn read_all(&self) -> Result<Vec<BarMessage>, DataError> {
        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|err| DataError::Csv(err.to_string()))?;
        let mut bars = Vec::new();
        for result in reader.deserialize() {
            let row: CsvRow = result.map_err(|err| DataError::Csv(err.to_string()))?;
            bars.push(BarMessage {
                symbol: self.symbol.clone(),
                ts: row.ts,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                vwap: None,
                trade_count: None,
            });
        }
        bars.sort_by_key(|bar| bar.ts);
        Ok(bars)
    }
}

#[async_trait]
impl MarketDataProvider for HistoricalCsvProvider {
    async fn connect(&self) -> Result<(), DataError> {
        if !self.path.exists() {
            return Err(DataError::Transient(format!(
                "csv fixture not found: {}",
                self.path.display()
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn subscribe(&self, _symbols: &[Symbol]) -> Result<(), DataError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DataError::NotConnected);
        }
        Ok(())
    }

    async fn unsubscribe(&self, _symbols: &[Symbol]) -> Result<(), DataError> {
        Ok(())
    }

    async fn get_historical_bars(
        &self,
        _symbol: &Symbol,
        _timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BarMessage>, DataError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DataError::NotConnected);
        }
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|bar| bar.ts >= start && bar.ts <= end)
            .collect())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn next_bar(&self) -> Result<Option<BarMessage>, DataError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol_str::SmolStr;
    use std::io::Write;

    fn fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    #[tokio::test]
    async fn reads_and_sorts_rows_by_timestamp() {
        let file = fixture(
            "ts,open,high,low,close,volume\n\
             2026-01-02T00:00:00Z,101,102,100,101.5,1000\n\
             2026-01-01T00:00:00Z,100,101,99,100.5,900\n",
        );
        let provider = HistoricalCsvProvider::new(file.path(), SmolStr::new("AAPL"));
        provider.connect().await.unwrap();

        let bars = provider
            .get_historical_bars(
                &SmolStr::new("AAPL"),
                Timeframe::OneDay,
                DateTime::<Utc>::MIN_UTC,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].ts < bars[1].ts);
    }

    #[tokio::test]
    async fn missing_file_fails_to_connect() {
        let provider = HistoricalCsvProvider::new("/nonexistent/path.csv", SmolStr::new("AAPL"));
        assert!(provider.connect().await.is_err());
    }
}
