use chrono::NaiveDate;
use chrono_tz::Tz;
use flowtrader_core::Clock;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Process-wide daily counters, reset at the configured day boundary (spec §3, §4.9).
#[derive(Debug, Clone)]
pub struct RiskLedger {
    pub orders_count: u32,
    pub dollar_volume: Decimal,
    pub realized_loss_today: Decimal,
    current_day: Option<NaiveDate>,
}

impl Default for RiskLedger {
    fn default() -> Self {
        Self {
            orders_count: 0,
            dollar_volume: Decimal::ZERO,
            realized_loss_today: Decimal::ZERO,
            current_day: None,
        }
    }
}

impl RiskLedger {
    /// Rolls the ledger over if `clock.now()`, converted into `tz`, has advanced to a new
    /// calendar day since the last call. Invariant 8: no order issued before the boundary
    /// contributes to the next day's counts.
    pub fn roll_if_needed(&mut self, clock: &Arc<dyn Clock>, tz: Tz) {
        let today = clock.now().with_timezone(&tz).date_naive();
        if self.current_day != Some(today) {
            self.orders_count = 0;
            self.dollar_volume = Decimal::ZERO;
            self.realized_loss_today = Decimal::ZERO;
            self.current_day = Some(today);
        }
    }

    pub fn record_order(&mut self, notional: Decimal) {
        self.orders_count += 1;
        self.dollar_volume += notional;
    }

    /// `pnl` is negative for a loss; only losses accumulate into `realized_loss_today`.
    pub fn record_realized_pnl(&mut self, pnl: Decimal) {
        if pnl < Decimal::ZERO {
            self.realized_loss_today += -pnl;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use flowtrader_core::clock::TestClock;
    use rust_decimal_macros::dec;

    #[test]
    fn rolls_over_at_day_boundary() {
        let test_clock = Arc::new(TestClock::new(
            Utc.with_ymd_and_hms(2026, 7, 30, 23, 0, 0).unwrap(),
        ));
        let clock: Arc<dyn Clock> = test_clock.clone();
        let mut ledger = RiskLedger::default();
        ledger.roll_if_needed(&clock, chrono_tz::UTC);
        ledger.record_order(dec!(1000));
        assert_eq!(ledger.orders_count, 1);

        test_clock.advance(std::time::Duration::from_secs(3600 * 2));

        ledger.roll_if_needed(&clock, chrono_tz::UTC);
        assert_eq!(ledger.orders_count, 0);
        assert_eq!(ledger.dollar_volume, Decimal::ZERO);
    }
}
