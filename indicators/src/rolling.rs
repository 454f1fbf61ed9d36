use crate::{Bar, BarIndicator, Indicator};
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Rolling high/low envelope over the trailing `period` bars.
#[derive(Debug, Clone)]
pub struct RollingHighLow {
    period: usize,
    window: VecDeque<(Decimal, Decimal)>,
}

impl RollingHighLow {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "rolling period must be positive");
        Self {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn high(&self) -> Decimal {
        self.window
            .iter()
            .map(|(h, _)| *h)
            .fold(Decimal::MIN, Decimal::max)
    }

    pub fn low(&self) -> Decimal {
        self.window
            .iter()
            .map(|(_, l)| *l)
            .fold(Decimal::MAX, Decimal::min)
    }
}

impl Indicator for RollingHighLow {
    /// Reports the rolling high as the representative "value"; use [`RollingHighLow::low`]
    /// for the other bound.
    fn value(&self) -> Decimal {
        if self.window.is_empty() {
            Decimal::ZERO
        } else {
            self.high()
        }
    }

    fn is_ready(&self) -> bool {
        self.window.len() >= self.period
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

impl BarIndicator for RollingHighLow {
    fn update_ohlcv(&mut self, bar: &Bar) {
        self.window.push_back((bar.high, bar.low));
        if self.window.len() > self.period {
            self.window.pop_front();
        }
    }
}
