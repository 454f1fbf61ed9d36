//! Execution-engine-owned state: the [`MarketPrice`] cache, [`PendingOrder`] map, and
//! [`Position`] store (spec §3, §5). Mutation is funnelled through the engine's own task;
//! the types themselves are plain data so repositories and readers can share them freely.

use chrono::{DateTime, Utc};
use flowtrader_core::event::{Action, OrderStatus, OrderType, Symbol};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use uuid::Uuid;

/// Per-symbol top-of-book snapshot, synthesized from the latest `MarketData.close` with
/// a symmetric spread (spec §3). Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketPrice {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub ts: DateTime<Utc>,
}

impl MarketPrice {
    /// Derives a `MarketPrice` from a trade price, synthesizing a symmetric spread of
    /// `spread_fraction` (e.g. `0.001` for 0.1%) around it.
    pub fn from_last(last: Decimal, spread_fraction: Decimal, ts: DateTime<Utc>) -> Self {
        let half_spread = last * spread_fraction / Decimal::from(2);
        Self {
            bid: last - half_spread,
            ask: last + half_spread,
            last,
            ts,
        }
    }
}

/// An order as tracked by the execution engine, including fill progress.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub order_id: Uuid,
    pub strategy_id: SmolStr,
    pub symbol: Symbol,
    pub action: Action,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub filled_qty: Decimal,
    pub avg_fill_price: Decimal,
    pub status: OrderStatus,
    pub submitted_at: DateTime<Utc>,
}

impl PendingOrder {
    pub fn remaining(&self) -> Decimal {
        self.quantity - self.filled_qty
    }

    /// Folds a new fill into this order's progress, updating `filled_qty`,
    /// `avg_fill_price` (quantity-weighted), and `status`.
    pub fn apply_fill(&mut self, fill_qty: Decimal, fill_price: Decimal) {
        let new_filled = self.filled_qty + fill_qty;
        self.avg_fill_price = if new_filled.is_zero() {
            Decimal::ZERO
        } else {
            (self.avg_fill_price * self.filled_qty + fill_price * fill_qty) / new_filled
        };
        self.filled_qty = new_filled;
        self.status = if self.filled_qty >= self.quantity {
            OrderStatus::Filled
        } else if self.filled_qty > Decimal::ZERO {
            OrderStatus::Partial
        } else {
            self.status
        };
    }
}

/// Net signed holding of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

/// A symbol's net position, mutated only through [`Position::apply_fill`].
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub side: Side,
    pub opened_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// `1` for positive, `-1` for negative, `0` for zero — `Decimal` has no built-in signum.
fn sign(value: Decimal) -> Decimal {
    if value > Decimal::ZERO {
        Decimal::ONE
    } else if value < Decimal::ZERO {
        -Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Applies a `trade_qty` (always positive) fill in `action`'s direction to `existing`
    /// (`None` if flat), returning the updated position and the realized PnL from any
    /// closed portion (spec §4.10 point 3; zero unless the fill closes or flips a side).
    pub fn apply_fill(
        existing: Option<Position>,
        symbol: &Symbol,
        action: Action,
        trade_qty: Decimal,
        trade_price: Decimal,
        now: DateTime<Utc>,
    ) -> (Position, Decimal) {
        let delta = match action {
            Action::Buy => trade_qty,
            Action::Sell => -trade_qty,
            Action::Hold => Decimal::ZERO,
        };

        let Some(mut pos) = existing.filter(|p| !p.quantity.is_zero()) else {
            let side = if delta >= Decimal::ZERO {
                Side::Long
            } else {
                Side::Short
            };
            return (
                Position {
                    symbol: symbol.clone(),
                    quantity: delta,
                    average_price: trade_price,
                    current_price: trade_price,
                    side,
                    opened_at: now,
                    last_updated: now,
                },
                Decimal::ZERO,
            );
        };

        let same_direction = sign(pos.quantity) == sign(delta);
        pos.current_price = trade_price;
        pos.last_updated = now;

        if same_direction {
            let old_abs = pos.quantity.abs();
            let new_qty = pos.quantity + delta;
            pos.average_price =
                (pos.average_price * old_abs + trade_price * trade_qty) / new_qty.abs();
            pos.quantity = new_qty;
            return (pos, Decimal::ZERO);
        }

        // Closing or flipping trade.
        let old_abs = pos.quantity.abs();
        let closing_qty = trade_qty.min(old_abs);
        let direction_sign = sign(pos.quantity);
        let realized = (trade_price - pos.average_price) * closing_qty * direction_sign;
        let residual_qty = trade_qty - closing_qty;

        if residual_qty > Decimal::ZERO {
            let new_side = if delta > Decimal::ZERO {
                Side::Long
            } else {
                Side::Short
            };
            pos.quantity = if delta > Decimal::ZERO {
                residual_qty
            } else {
                -residual_qty
            };
            pos.average_price = trade_price;
            pos.side = new_side;
            pos.opened_at = now;
        } else {
            pos.quantity += delta;
            if pos.quantity.is_zero() {
                pos.average_price = Decimal::ZERO;
            }
        }

        (pos, realized)
    }
}

/// A settled fill, persisted one-per-partial-or-full-fill (spec §3 relationships).
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: Uuid,
    pub order_id: Uuid,
    pub symbol: Symbol,
    pub action: Action,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    fn symbol() -> Symbol {
        SmolStr::new("AAPL")
    }

    #[test]
    fn round_trip_buy_then_matching_sell_nets_flat_with_zero_pnl() {
        let now = Utc::now();
        let (pos, pnl0) =
            Position::apply_fill(None, &symbol(), Action::Buy, dec!(100), dec!(50), now);
        assert_eq!(pnl0, Decimal::ZERO);
        assert_eq!(pos.quantity, dec!(100));
        assert_eq!(pos.side, Side::Long);

        let (pos2, pnl1) = Position::apply_fill(
            Some(pos),
            &symbol(),
            Action::Sell,
            dec!(100),
            dec!(50),
            now,
        );
        assert_eq!(pnl1, Decimal::ZERO);
        assert!(pos2.is_flat());
    }

    #[test]
    fn flip_opens_residual_in_new_direction() {
        let now = Utc::now();
        let (pos, _) = Position::apply_fill(None, &symbol(), Action::Buy, dec!(100), dec!(50), now);
        let (flipped, realized) = Position::apply_fill(
            Some(pos),
            &symbol(),
            Action::Sell,
            dec!(150),
            dec!(60),
            now,
        );
        // closes 100 long at a 10/share gain, then opens 50 short at 60.
        assert_eq!(realized, dec!(1000));
        assert_eq!(flipped.quantity, dec!(-50));
        assert_eq!(flipped.side, Side::Short);
        assert_eq!(flipped.average_price, dec!(60));
    }

    #[test]
    fn pending_order_fill_progress() {
        let mut order = PendingOrder {
            order_id: Uuid::new_v4(),
            strategy_id: SmolStr::new("vwap_bounce"),
            symbol: symbol(),
            action: Action::Buy,
            quantity: dec!(100),
            order_type: OrderType::Market,
            limit_price: None,
            filled_qty: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            status: OrderStatus::Submitted,
            submitted_at: Utc::now(),
        };
        order.apply_fill(dec!(100), dec!(50));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_fill_price, dec!(50));
        assert_eq!(order.remaining(), Decimal::ZERO);
    }
}
