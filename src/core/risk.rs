//! Protective exit sweep: stop-loss / take-profit evaluation.
//!
//! Runs once per cycle, strictly before the oracle is consulted. Exits
//! settle through the same [`Ledger::close_position`] path used by
//! oracle-driven closes.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::info;

use crate::types::{Side, TradeRecord};

use super::ledger::Ledger;

/// Reason a protective exit fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
        }
    }
}

/// Sweep all open positions against current prices and close any whose
/// stop-loss or profit-target has been breached.
///
/// Per side:
/// - long: stop at `price <= stop_loss`, target at `price >= profit_target`
/// - short: stop at `price >= stop_loss`, target at `price <= profit_target`
///
/// The stop-loss check precedes the take-profit check — when both thresholds
/// are breached in the same tick the conservative exit wins. Positions exit
/// at the threshold price, not the observed price. Symbols missing from
/// `prices` fall back to the entry price, which can never trigger either
/// threshold — a data gap never forces an exit.
pub fn check_protective_exits(
    ledger: &mut Ledger,
    prices: &BTreeMap<String, Decimal>,
) -> Vec<TradeRecord> {
    let mut closed = Vec::new();

    // Collect first: closing mutates the position map.
    let symbols: Vec<String> = ledger.positions().keys().cloned().collect();

    for symbol in symbols {
        let Some(pos) = ledger.position(&symbol) else {
            continue;
        };

        let current_price = prices.get(&symbol).copied().unwrap_or(pos.entry_price);
        let (stop_loss, profit_target, side) = (pos.stop_loss, pos.profit_target, pos.side);

        let triggered = match side {
            Side::Long if current_price <= stop_loss => {
                Some((stop_loss, ExitReason::StopLoss))
            }
            Side::Long if current_price >= profit_target => {
                Some((profit_target, ExitReason::TakeProfit))
            }
            Side::Short if current_price >= stop_loss => {
                Some((stop_loss, ExitReason::StopLoss))
            }
            Side::Short if current_price <= profit_target => {
                Some((profit_target, ExitReason::TakeProfit))
            }
            _ => None,
        };

        if let Some((exit_price, reason)) = triggered {
            info!(
                symbol = %symbol,
                side = side.as_str(),
                current_price = %current_price,
                exit_price = %exit_price,
                reason = reason.as_str(),
                "protective exit triggered"
            );
            if let Some(record) = ledger.close_position(&symbol, exit_price, reason.as_str()) {
                closed.push(record);
            }
        }
    }

    closed
}
