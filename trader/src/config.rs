//! Top-level engine configuration: aggregates every component's config fragment into one
//! `serde`-deserializable struct, mirroring the teacher's `SystemConfig` shape (SPEC_FULL.md
//! §3). Parsing this out of a file or environment is the caller's job, not the engine's.

use flowtrader_core::config::{BreakerConfig, BusConfig};
use flowtrader_data::BackfillConfig;
use flowtrader_execution::ExecutionConfig;
use flowtrader_risk::RiskLimits;
use flowtrader_strategy::{OpeningRangeBreakoutConfig, VwapBounceConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bus: BusConfig,
    pub database_breaker: BreakerConfig,
    pub risk: RiskLimits,
    pub execution: ExecutionConfig,
    pub backfill: BackfillConfig,
    pub vwap_bounce: VwapBounceConfig,
    pub opening_range_breakout: OpeningRangeBreakoutConfig,
    /// Signals below this confidence are dropped by the converter (spec §4.8).
    pub min_confidence: f64,
    /// Symbols traded by every strategy in this process.
    pub symbols: Vec<SmolStr>,
    /// Per-symbol starting price and volatility fed to `SimulatedProvider` in demo runs.
    pub simulated_starting_price: Decimal,
    pub simulated_volatility: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            database_breaker: BreakerConfig::default(),
            risk: RiskLimits::default(),
            execution: ExecutionConfig::default(),
            backfill: BackfillConfig::default(),
            vwap_bounce: VwapBounceConfig::default(),
            opening_range_breakout: OpeningRangeBreakoutConfig::default(),
            min_confidence: 0.6,
            symbols: vec![SmolStr::new("AAPL"), SmolStr::new("MSFT")],
            simulated_starting_price: Decimal::from(100),
            simulated_volatility: Decimal::new(1, 2),
        }
    }
}
