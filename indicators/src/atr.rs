use crate::{Bar, BarIndicator, Indicator};
use rust_decimal::Decimal;

/// Average True Range using Wilder smoothing: warms up on the simple average of the
/// first `period` true-range samples, then `atr_t = (atr_{t-1} * (period - 1) + tr_t) /
/// period`.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<Decimal>,
    seed: Vec<Decimal>,
    value: Option<Decimal>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ATR period must be positive");
        Self {
            period,
            prev_close: None,
            seed: Vec::with_capacity(period),
            value: None,
        }
    }

    /// `k * ATR`, a common stop-loss offset used by breakout strategies.
    pub fn stop_loss_distance(&self, k: Decimal) -> Decimal {
        k * self.value()
    }

    fn true_range(&self, bar: &Bar) -> Decimal {
        match self.prev_close {
            Some(prev) => {
                let hl = bar.high - bar.low;
                let hc = (bar.high - prev).abs();
                let lc = (bar.low - prev).abs();
                hl.max(hc).max(lc)
            }
            None => bar.high - bar.low,
        }
    }
}

impl Indicator for Atr {
    fn value(&self) -> Decimal {
        self.value.unwrap_or(Decimal::ZERO)
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.seed.clear();
        self.value = None;
    }
}

impl BarIndicator for Atr {
    fn update_ohlcv(&mut self, bar: &Bar) {
        let tr = self.true_range(bar);
        self.prev_close = Some(bar.close);

        match self.value {
            Some(prev_atr) => {
                let period = Decimal::from(self.period as u64);
                self.value = Some((prev_atr * (period - Decimal::ONE) + tr) / period);
            }
            None => {
                self.seed.push(tr);
                if self.seed.len() == self.period {
                    let sum: Decimal = self.seed.iter().copied().sum();
                    self.value = Some(sum / Decimal::from(self.period as u64));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bar(high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            open: close,
            high,
            low,
            close,
            volume: dec!(1000),
            ts: Utc::now(),
        }
    }

    #[test]
    fn deterministic_for_same_sequence() {
        let bars = [
            bar(dec!(102), dec!(98), dec!(100)),
            bar(dec!(105), dec!(101), dec!(104)),
            bar(dec!(106), dec!(103), dec!(105)),
            bar(dec!(108), dec!(104), dec!(107)),
        ];

        let mut a = Atr::new(3);
        let mut b = Atr::new(3);
        for bar in bars {
            a.update_ohlcv(&bar);
            b.update_ohlcv(&bar);
        }
        assert!(a.is_ready());
        assert_eq!(a.value(), b.value());
    }
}
