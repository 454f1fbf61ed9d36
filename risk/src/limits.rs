use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configured thresholds the [`crate::RiskManager`] validates against (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_notional: Decimal,
    pub max_orders_per_day: u32,
    pub max_daily_dollar_volume: Decimal,
    pub max_symbol_concentration: Decimal,
    pub max_daily_loss: Decimal,
    pub portfolio_equity: Decimal,
    /// Timezone used for the daily ledger rollover boundary (resolves the UTC-vs-local
    /// ambiguity noted in spec §9 in favor of one configured zone).
    #[serde(with = "tz_serde")]
    pub day_boundary_tz: Tz,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_notional: Decimal::from(100_000),
            max_orders_per_day: 200,
            max_daily_dollar_volume: Decimal::from(1_000_000),
            max_symbol_concentration: Decimal::new(25, 2), // 0.25
            max_daily_loss: Decimal::from(10_000),
            portfolio_equity: Decimal::from(500_000),
            day_boundary_tz: chrono_tz::US::Eastern,
        }
    }
}

/// Fraction of a threshold at which a warning (but not a rejection) fires.
pub const WARNING_THRESHOLD_RATIO: Decimal = Decimal::from_parts(8, 0, 0, false, 1); // 0.8

mod tz_serde {
    use chrono_tz::Tz;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tz, D::Error> {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s).map_err(serde::de::Error::custom)
    }
}
