use crate::{Bar, BarIndicator, Indicator};
use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;

/// Session-cumulative volume-weighted average price. Resets automatically whenever a
/// bar's timestamp, converted into `tz`, falls on a new trading day.
#[derive(Debug, Clone)]
pub struct Vwap {
    tz: Tz,
    current_date: Option<NaiveDate>,
    cumulative_pv: Decimal,
    cumulative_volume: Decimal,
    value: Option<Decimal>,
}

impl Vwap {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            current_date: None,
            cumulative_pv: Decimal::ZERO,
            cumulative_volume: Decimal::ZERO,
            value: None,
        }
    }

    pub fn is_price_above_vwap(&self, price: Decimal) -> bool {
        self.is_ready() && price > self.value()
    }

    /// Signed percentage distance of `price` from the current VWAP.
    pub fn price_distance_from_vwap(&self, price: Decimal) -> Decimal {
        if !self.is_ready() || self.value().is_zero() {
            return Decimal::ZERO;
        }
        (price - self.value()) / self.value() * Decimal::from(100)
    }
}

impl Indicator for Vwap {
    fn value(&self) -> Decimal {
        self.value.unwrap_or(Decimal::ZERO)
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.cumulative_pv = Decimal::ZERO;
        self.cumulative_volume = Decimal::ZERO;
        self.value = None;
    }
}

impl BarIndicator for Vwap {
    fn update_ohlcv(&mut self, bar: &Bar) {
        let date = bar.ts.with_timezone(&self.tz).date_naive();
        if self.current_date != Some(date) {
            self.reset();
            self.current_date = Some(date);
        }

        let typical = (bar.high + bar.low + bar.close) / Decimal::from(3);
        self.cumulative_pv += typical * bar.volume;
        self.cumulative_volume += bar.volume;
        if !self.cumulative_volume.is_zero() {
            self.value = Some(self.cumulative_pv / self.cumulative_volume);
        }
    }
}
