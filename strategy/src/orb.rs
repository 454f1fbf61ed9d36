//! Opening Range Breakout: marks the high/low of the first `range_minutes` after the
//! session open, then trades a single breakout through that range per symbol per day,
//! stopped at `max(range_low, entry - 2*ATR)` and force-closed at `exit_time` (spec §4.7).

use crate::runtime::{Strategy, StrategyContext};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use flowtrader_core::event::{Action, MarketDataEvent, Symbol};
use flowtrader_indicators::{Atr, Bar, BarIndicator, Indicator};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpeningRangeBreakoutConfig {
    pub range_minutes: u32,
    pub atr_period: usize,
    pub atr_stop_multiplier: Decimal,
    pub quantity: Decimal,
    pub exit_time: NaiveTime,
    /// Whether a break below the opening range is tradeable as a short. Default `false`
    /// (see design decision in the grounding ledger).
    pub short_enabled: bool,
    pub tz: Tz,
}

impl Default for OpeningRangeBreakoutConfig {
    fn default() -> Self {
        Self {
            range_minutes: 15,
            atr_period: 14,
            atr_stop_multiplier: Decimal::from(2),
            quantity: Decimal::from(100),
            exit_time: NaiveTime::from_hms_opt(15, 55, 0).unwrap(),
            short_enabled: false,
            tz: chrono_tz::US::Eastern,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpeningRange {
    high: Decimal,
    low: Decimal,
    complete: bool,
}

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    action: Action,
    entry_price: Decimal,
    stop_price: Decimal,
}

struct SymbolState {
    session_date: Option<NaiveDate>,
    range: Option<OpeningRange>,
    atr: Atr,
    position: Option<OpenPosition>,
    traded_today: bool,
}

impl SymbolState {
    fn new(config: &OpeningRangeBreakoutConfig) -> Self {
        Self {
            session_date: None,
            range: None,
            atr: Atr::new(config.atr_period),
            position: None,
            traded_today: false,
        }
    }

    fn reset_for_new_day(&mut self, config: &OpeningRangeBreakoutConfig) {
        self.range = None;
        self.atr = Atr::new(config.atr_period);
        self.position = None;
        self.traded_today = false;
    }
}

#[derive(Debug)]
pub struct OpeningRangeBreakoutStrategy {
    id: String,
    symbols: Vec<Symbol>,
    config: OpeningRangeBreakoutConfig,
    state: Mutex<HashMap<Symbol, SymbolState>>,
}

impl OpeningRangeBreakoutStrategy {
    pub fn new(
        id: impl Into<String>,
        symbols: Vec<Symbol>,
        config: OpeningRangeBreakoutConfig,
    ) -> Self {
        Self {
            id: id.into(),
            symbols,
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn range_end(&self, session_open: NaiveTime) -> NaiveTime {
        session_open + chrono::Duration::minutes(self.config.range_minutes as i64)
    }
}

#[async_trait]
impl Strategy for OpeningRangeBreakoutStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "opening_range_breakout"
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    async fn on_market_data(&self, event: &MarketDataEvent, ctx: &StrategyContext) {
        let local_ts = event.data_timestamp.with_timezone(&self.config.tz);
        let local_date = local_ts.date_naive();
        let local_time = local_ts.time();

        let bar = Bar {
            open: event.open,
            high: event.high,
            low: event.low,
            close: event.close,
            volume: event.volume,
            ts: event.data_timestamp,
        };

        let mut states = self.state.lock();
        let state = states
            .entry(event.symbol.clone())
            .or_insert_with(|| SymbolState::new(&self.config));

        if state.session_date != Some(local_date) {
            state.session_date = Some(local_date);
            state.reset_for_new_day(&self.config);
        }

        // force-close any open position at or after the exit time, regardless of range state.
        if local_time >= self.config.exit_time {
            if let Some(position) = state.position.take() {
                ctx.publish_signal(flowtrader_core::event::SignalEvent {
                    strategy_id: ctx.strategy_id().clone(),
                    symbol: event.symbol.clone(),
                    action: opposite(position.action),
                    confidence: 0.80,
                    price: Decimal::ZERO,
                    quantity: self.config.quantity,
                    reason: "forced exit at session close window".to_string(),
                });
            }
            return;
        }

        let range_end = self.range_end(market_open_time(&self.config));

        if local_time < range_end {
            let range = state.range.get_or_insert(OpeningRange {
                high: bar.high,
                low: bar.low,
                complete: false,
            });
            range.high = range.high.max(bar.high);
            range.low = range.low.min(bar.low);
            state.atr.update_ohlcv(&bar);
            return;
        }

        if let Some(range) = state.range.as_mut() {
            range.complete = true;
        }
        state.atr.update_ohlcv(&bar);

        if let Some(position) = state.position {
            let stop_hit = match position.action {
                Action::Buy => bar.close <= position.stop_price,
                Action::Sell => bar.close >= position.stop_price,
                Action::Hold => false,
            };
            if stop_hit {
                ctx.publish_signal(flowtrader_core::event::SignalEvent {
                    strategy_id: ctx.strategy_id().clone(),
                    symbol: event.symbol.clone(),
                    action: opposite(position.action),
                    confidence: 0.80,
                    price: Decimal::ZERO,
                    quantity: self.config.quantity,
                    reason: "stop loss".to_string(),
                });
                state.position = None;
            }
            return;
        }

        if state.traded_today || !state.atr.is_ready() {
            return;
        }
        let Some(range) = state.range.filter(|r| r.complete) else {
            return;
        };

        if bar.close > range.high {
            let breakout_pct = (bar.close - range.high) / range.high * Decimal::from(100);
            let confidence = if breakout_pct > Decimal::new(5, 1) { 0.85 } else { 0.80 };
            let stop = range.low.max(bar.close - state.atr.stop_loss_distance(self.config.atr_stop_multiplier));
            ctx.publish_signal(flowtrader_core::event::SignalEvent {
                strategy_id: ctx.strategy_id().clone(),
                symbol: event.symbol.clone(),
                action: Action::Buy,
                confidence,
                price: Decimal::ZERO,
                quantity: self.config.quantity,
                reason: "breakout above opening range high".to_string(),
            });
            state.position = Some(OpenPosition {
                action: Action::Buy,
                entry_price: bar.close,
                stop_price: stop,
            });
            state.traded_today = true;
        } else if self.config.short_enabled && bar.close < range.low {
            let breakdown_pct = (range.low - bar.close) / range.low * Decimal::from(100);
            let confidence = if breakdown_pct > Decimal::new(5, 1) { 0.85 } else { 0.80 };
            let stop = range.high.min(bar.close + state.atr.stop_loss_distance(self.config.atr_stop_multiplier));
            ctx.publish_signal(flowtrader_core::event::SignalEvent {
                strategy_id: ctx.strategy_id().clone(),
                symbol: event.symbol.clone(),
                action: Action::Sell,
                confidence,
                price: Decimal::ZERO,
                quantity: self.config.quantity,
                reason: "breakdown below opening range low".to_string(),
            });
            state.position = Some(OpenPosition {
                action: Action::Sell,
                entry_price: bar.close,
                stop_price: stop,
            });
            state.traded_today = true;
        }
    }

    // position state is set optimistically in `on_market_data` on breakout and cleared on
    // stop/forced exit; fills need no reconciliation here.
}

fn opposite(action: Action) -> Action {
    match action {
        Action::Buy => Action::Sell,
        Action::Sell => Action::Buy,
        Action::Hold => Action::Hold,
    }
}

/// Market open is fixed at 09:30 local exchange time; the opening range is measured from
/// here regardless of when the first bar for the day actually arrives.
fn market_open_time(_config: &OpeningRangeBreakoutConfig) -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;
    use std::time::Duration;

    fn bar_event(open: Decimal, high: Decimal, low: Decimal, close: Decimal, hour: u32, min: u32) -> MarketDataEvent {
        MarketDataEvent {
            symbol: SmolStr::new("AAPL"),
            open,
            high,
            low,
            close,
            volume: dec!(1000),
            data_timestamp: Utc.with_ymd_and_hms(2026, 7, 30, hour, min, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn breaks_out_above_opening_range_after_it_completes() {
        let strategy = OpeningRangeBreakoutStrategy::new(
            "orb_1",
            vec![SmolStr::new("AAPL")],
            OpeningRangeBreakoutConfig {
                range_minutes: 15,
                atr_period: 2,
                tz: chrono_tz::UTC,
                ..OpeningRangeBreakoutConfig::default()
            },
        );

        let bus = std::sync::Arc::new(flowtrader_core::bus::EventBus::new(64));
        let mut signals = bus
            .subscribe(flowtrader_core::event::EventKind::Signal)
            .unwrap();
        let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
        let ctx = crate::runtime::StrategyContext::for_test(bus.clone(), "orb_1", running);

        strategy
            .on_market_data(&bar_event(dec!(100), dec!(101), dec!(99), dec!(100), 9, 30), &ctx)
            .await;
        strategy
            .on_market_data(&bar_event(dec!(100), dec!(102), dec!(99), dec!(101), 9, 40), &ctx)
            .await;
        strategy
            .on_market_data(&bar_event(dec!(101), dec!(103), dec!(99), dec!(103), 9, 50), &ctx)
            .await;
        strategy
            .on_market_data(&bar_event(dec!(103), dec!(106), dec!(102), dec!(105), 10, 0), &ctx)
            .await;

        let signal = tokio::time::timeout(Duration::from_millis(50), signals.recv())
            .await
            .expect("signal expected")
            .expect("bus open");
        assert_eq!(signal.as_signal().unwrap().action, Action::Buy);
    }

    #[test]
    fn short_side_is_disabled_by_default() {
        let config = OpeningRangeBreakoutConfig::default();
        assert!(!config.short_enabled);
    }
}
