//! # Risk Manager (C9)
//!
//! Pre-trade validation against the configured [`RiskLimits`], plus daily tracking via
//! [`RiskLedger`]. Validations run in a fixed order and all accumulate messages; any hard
//! rejection flips `approved` to `false` (spec §4.9).

use crate::{ledger::RiskLedger, limits::RiskLimits};
use flowtrader_core::{event::Action, event::Symbol, Clock};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A candidate order, pre-submission, as seen by the risk manager.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub action: Action,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl OrderRequest {
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub approved: bool,
    pub rejections: Vec<String>,
    pub warnings: Vec<String>,
    /// Max threshold ratio observed across all checks, in `[0, +inf)`.
    pub risk_score: f64,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            approved: true,
            rejections: Vec::new(),
            warnings: Vec::new(),
            risk_score: 0.0,
        }
    }

    fn evaluate(&mut self, ratio: Decimal, rejection: Option<String>, warning: String) {
        let ratio_f64 = decimal_to_f64(ratio);
        if ratio_f64 > self.risk_score {
            self.risk_score = ratio_f64;
        }
        if let Some(message) = rejection {
            self.approved = false;
            self.rejections.push(message);
        } else if ratio >= crate::limits::WARNING_THRESHOLD_RATIO {
            self.warnings.push(warning);
        }
    }
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(f64::MAX)
}

pub struct RiskManager {
    limits: RiskLimits,
    ledger: Mutex<RiskLedger>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("limits", &self.limits)
            .finish()
    }
}

impl RiskManager {
    pub fn new(limits: RiskLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            ledger: Mutex::new(RiskLedger::default()),
            clock,
        }
    }

    fn rolled_ledger(&self) -> parking_lot::MutexGuard<'_, RiskLedger> {
        let mut ledger = self.ledger.lock();
        ledger.roll_if_needed(&self.clock, self.limits.day_boundary_tz);
        ledger
    }

    /// Validates `req` against every configured limit. All checks run regardless of
    /// earlier failures so every applicable message is surfaced.
    pub fn validate_order(&self, req: &OrderRequest) -> ValidationResult {
        let ledger = self.rolled_ledger();
        let mut result = ValidationResult::new();
        let notional = req.notional();
        let limits = &self.limits;

        // 1. Position size.
        let position_ratio = safe_ratio(notional, limits.max_position_notional);
        result.evaluate(
            position_ratio,
            (notional > limits.max_position_notional).then(|| {
                format!(
                    "position notional {notional} exceeds max_position_notional {}",
                    limits.max_position_notional
                )
            }),
            format!("position notional {notional} nearing max_position_notional"),
        );

        // 2. Daily order count.
        let projected_orders = ledger.orders_count + 1;
        let order_count_ratio = safe_ratio(
            Decimal::from(projected_orders),
            Decimal::from(limits.max_orders_per_day),
        );
        result.evaluate(
            order_count_ratio,
            (projected_orders > limits.max_orders_per_day).then(|| {
                format!(
                    "order count {projected_orders} would exceed max_orders_per_day {}",
                    limits.max_orders_per_day
                )
            }),
            format!("order count {projected_orders} nearing max_orders_per_day"),
        );

        // 3. Daily dollar volume.
        let projected_volume = ledger.dollar_volume + notional;
        let volume_ratio = safe_ratio(projected_volume, limits.max_daily_dollar_volume);
        result.evaluate(
            volume_ratio,
            (projected_volume > limits.max_daily_dollar_volume).then(|| {
                format!(
                    "dollar volume {projected_volume} would exceed max_daily_dollar_volume {}",
                    limits.max_daily_dollar_volume
                )
            }),
            format!("dollar volume {projected_volume} nearing max_daily_dollar_volume"),
        );

        // 4. Single-name concentration.
        let concentration = safe_ratio(notional, limits.portfolio_equity);
        result.evaluate(
            concentration,
            (concentration > limits.max_symbol_concentration).then(|| {
                format!(
                    "symbol concentration {concentration} exceeds max_symbol_concentration {}",
                    limits.max_symbol_concentration
                )
            }),
            format!("symbol concentration {concentration} nearing max_symbol_concentration"),
        );

        // 5. Realized daily loss.
        let loss_ratio = safe_ratio(ledger.realized_loss_today, limits.max_daily_loss);
        result.evaluate(
            loss_ratio,
            (ledger.realized_loss_today >= limits.max_daily_loss).then(|| {
                format!(
                    "realized daily loss {} has reached max_daily_loss {}",
                    ledger.realized_loss_today, limits.max_daily_loss
                )
            }),
            format!(
                "realized daily loss {} nearing max_daily_loss",
                ledger.realized_loss_today
            ),
        );

        result
    }

    /// Commits `req` to the daily ledger. Callers should only invoke this after a
    /// successful [`RiskManager::validate_order`].
    pub fn record_order(&self, req: &OrderRequest) {
        let mut ledger = self.rolled_ledger();
        ledger.record_order(req.notional());
    }

    /// Feeds a realized PnL (negative for a loss) from a closed or closing trade into the
    /// daily ledger, so subsequent `validate_order` calls see it.
    pub fn record_realized_pnl(&self, pnl: Decimal) {
        let mut ledger = self.rolled_ledger();
        ledger.record_realized_pnl(pnl);
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }
}

fn safe_ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}
