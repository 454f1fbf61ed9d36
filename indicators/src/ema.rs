use crate::{Indicator, PriceIndicator};
use rust_decimal::Decimal;

/// Exponential moving average. Seeds with the simple average of the first `period`
/// samples, then updates as `ema_t = alpha * price_t + (1 - alpha) * ema_{t-1}` with
/// `alpha = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: Decimal,
    seed: Vec<Decimal>,
    value: Option<Decimal>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "EMA period must be positive");
        let alpha = Decimal::from(2) / Decimal::from(period as u64 + 1);
        Self {
            period,
            alpha,
            seed: Vec::with_capacity(period),
            value: None,
        }
    }
}

impl Indicator for Ema {
    fn value(&self) -> Decimal {
        self.value.unwrap_or(Decimal::ZERO)
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.seed.clear();
        self.value = None;
    }
}

impl PriceIndicator for Ema {
    fn update(&mut self, price: Decimal) {
        match self.value {
            Some(prev) => {
                self.value = Some(self.alpha * price + (Decimal::ONE - self.alpha) * prev);
            }
            None => {
                self.seed.push(price);
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
    use rust_decimal_macros::dec;

    #[test]
    fn ready_after_period_samples_and_deterministic() {
        let mut a = Ema::new(3);
        let mut b = Ema::new(3);
        let prices = [dec!(10), dec!(11), dec!(12), dec!(13), dec!(14)];

        for p in prices {
            a.update(p);
            b.update(p);
        }

        assert!(a.is_ready());
        assert_eq!(a.value(), b.value());
    }

    #[test]
    fn seeds_with_simple_average() {
        let mut ema = Ema::new(3);
        ema.update(dec!(10));
        assert!(!ema.is_ready());
        ema.update(dec!(20));
        assert!(!ema.is_ready());
        ema.update(dec!(30));
        assert!(ema.is_ready());
        assert_eq!(ema.value(), dec!(20));
    }
}
