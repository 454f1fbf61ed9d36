//! VWAP Bounce (day-trade, long-only default): enters on a shallow pullback to VWAP in an
//! EMA-confirmed uptrend, exits on target profit, trend break, runaway extension, or stop
//! (spec §4.7).

use crate::runtime::{Strategy, StrategyContext};
use async_trait::async_trait;
use chrono_tz::Tz;
use flowtrader_core::event::{Action, MarketDataEvent, OrderFilledEvent, SignalEvent, Symbol};
use flowtrader_indicators::{Bar, BarIndicator, Ema, Indicator, PriceIndicator, Vwap};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VwapBounceConfig {
    pub ema_period: usize,
    /// Max `|distance from VWAP|`, in percent, still considered a "bounce" (default 0.3).
    pub bounce_tolerance_pct: Decimal,
    /// Take-profit threshold, in percent (default 1.0).
    pub target_profit_pct: Decimal,
    /// Stop-loss threshold, in percent, stored positive (default 0.5).
    pub stop_loss_pct: Decimal,
    pub quantity: Decimal,
    pub tz: Tz,
}

impl Default for VwapBounceConfig {
    fn default() -> Self {
        Self {
            ema_period: 20,
            bounce_tolerance_pct: Decimal::new(3, 1),
            target_profit_pct: Decimal::new(10, 1),
            stop_loss_pct: Decimal::new(5, 1),
            quantity: Decimal::from(100),
            tz: chrono_tz::US::Eastern,
        }
    }
}

struct SymbolState {
    vwap: Vwap,
    ema: Ema,
    has_position: bool,
    entry_price: Decimal,
}

impl SymbolState {
    fn new(config: &VwapBounceConfig) -> Self {
        Self {
            vwap: Vwap::new(config.tz),
            ema: Ema::new(config.ema_period),
            has_position: false,
            entry_price: Decimal::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct VwapBounceStrategy {
    id: String,
    symbols: Vec<Symbol>,
    config: VwapBounceConfig,
    state: Mutex<HashMap<Symbol, SymbolState>>,
}

impl VwapBounceStrategy {
    pub fn new(id: impl Into<String>, symbols: Vec<Symbol>, config: VwapBounceConfig) -> Self {
        Self {
            id: id.into(),
            symbols,
            config,
            state: Mutex::new(HashMap::new()),
        }
    }
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[async_trait]
impl Strategy for VwapBounceStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "vwap_bounce"
    }

    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    async fn on_market_data(&self, event: &MarketDataEvent, ctx: &StrategyContext) {
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

        state.vwap.update_ohlcv(&bar);
        state.ema.update(bar.close);

        if !state.vwap.is_ready() || !state.ema.is_ready() {
            return;
        }

        let vwap_value = state.vwap.value();
        let distance_pct = state.vwap.price_distance_from_vwap(bar.close);

        if !state.has_position {
            let uptrend = bar.close > vwap_value && state.ema.value() > vwap_value;
            if uptrend && distance_pct.abs() <= self.config.bounce_tolerance_pct {
                let headroom = self.config.bounce_tolerance_pct - distance_pct.abs();
                let confidence =
                    (0.75 + to_f64(headroom / self.config.bounce_tolerance_pct) * 0.15).min(0.90);
                ctx.publish_signal(SignalEvent {
                    strategy_id: ctx.strategy_id().clone(),
                    symbol: event.symbol.clone(),
                    action: Action::Buy,
                    confidence,
                    price: Decimal::ZERO,
                    quantity: self.config.quantity,
                    reason: format!("bounce off vwap, distance {distance_pct}%"),
                });
                state.has_position = true;
                state.entry_price = bar.close;
            }
            return;
        }

        let profit_pct = if state.entry_price.is_zero() {
            Decimal::ZERO
        } else {
            (bar.close - state.entry_price) / state.entry_price * Decimal::from(100)
        };

        let (should_exit, confidence, reason): (bool, f64, &str) =
            if profit_pct >= self.config.target_profit_pct {
                (true, 0.85, "target profit reached")
            } else if bar.close < vwap_value {
                (true, 0.80, "trend break below vwap")
            } else if distance_pct > self.config.target_profit_pct * Decimal::from(2) {
                (true, 0.90, "runaway extension take-profit")
            } else if profit_pct <= -self.config.stop_loss_pct {
                (true, 0.85, "stop loss")
            } else {
                (false, 0.0, "")
            };

        if should_exit {
            ctx.publish_signal(SignalEvent {
                strategy_id: ctx.strategy_id().clone(),
                symbol: event.symbol.clone(),
                action: Action::Sell,
                confidence,
                price: Decimal::ZERO,
                quantity: self.config.quantity,
                reason: reason.to_string(),
            });
            state.has_position = false;
        }
    }

    async fn on_order_filled(&self, event: &OrderFilledEvent, _ctx: &StrategyContext) {
        let mut states = self.state.lock();
        let Some(state) = states.get_mut(&event.symbol) else {
            return;
        };
        match event.action {
            Action::Buy => {
                state.has_position = true;
                state.entry_price = event.fill_price;
            }
            Action::Sell => state.has_position = false,
            Action::Hold => {}
        }
    }
}
