//! Applies a validated decision batch to the ledger.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::RiskConfig;
use crate::types::{Position, RawDecision, RejectionReason, TradeRecord, ValidatedAction};

use super::ledger::Ledger;
use super::validator;

/// What happened to one cycle's decision batch.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub executed: Vec<TradeRecord>,
    pub rejections: Vec<(String, RejectionReason)>,
}

/// Validate and apply each decision in symbol order.
///
/// Decisions for symbols outside the configured universe are dropped before
/// validation. Each decision is validated against the book as mutated by the
/// decisions before it, so a position cap is enforced across the batch, not
/// just against the state at cycle start. A rejection skips that symbol only.
pub fn apply_decisions(
    decisions: &BTreeMap<String, RawDecision>,
    ledger: &mut Ledger,
    prices: &BTreeMap<String, Decimal>,
    risk: &RiskConfig,
    universe: &[String],
) -> CycleOutcome {
    let mut outcome = CycleOutcome::default();

    for (symbol, decision) in decisions {
        if !universe.iter().any(|s| s == symbol) {
            debug!(symbol = %symbol, "dropping decision for symbol outside universe");
            continue;
        }

        let current_price = prices.get(symbol).copied();
        match validator::validate(symbol, decision, ledger, risk, current_price) {
            Ok(ValidatedAction::Hold) => {}
            Ok(ValidatedAction::Entry {
                side,
                quantity,
                price,
                stop_loss,
                profit_target,
                leverage,
            }) => {
                let notional = quantity * price;
                let position = Position {
                    symbol: symbol.clone(),
                    side,
                    quantity,
                    entry_price: price,
                    stop_loss,
                    profit_target,
                    leverage,
                    margin: notional / leverage,
                    fees_paid: notional * ledger.taker_fee_rate(),
                    opened_at: Utc::now(),
                };
                let reason = decision.reasoning.clone().unwrap_or_default();
                info!(
                    symbol = %symbol,
                    side = side.as_str(),
                    quantity = %quantity,
                    price = %price,
                    leverage = %leverage,
                    "opening position"
                );
                if ledger.open_position(position, &reason) {
                    if let Some(record) = ledger.trade_history().last().cloned() {
                        outcome.executed.push(record);
                    }
                }
            }
            Ok(ValidatedAction::Close) => {
                // Missing price falls back to the entry price, same as the
                // risk sweep.
                let exit_price = current_price.unwrap_or_else(|| {
                    ledger
                        .position(symbol)
                        .map(|p| p.entry_price)
                        .unwrap_or(Decimal::ZERO)
                });
                let reason = decision
                    .reasoning
                    .clone()
                    .unwrap_or_else(|| "oracle_close".to_string());
                info!(symbol = %symbol, exit_price = %exit_price, "closing position");
                if let Some(record) = ledger.close_position(symbol, exit_price, &reason) {
                    outcome.executed.push(record);
                }
            }
            Err(reason) => {
                warn!(symbol = %symbol, reason = %reason, "decision rejected");
                outcome.rejections.push((symbol.clone(), reason));
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeAction;
    use rust_decimal_macros::dec;

    fn risk_config(max_positions: usize) -> RiskConfig {
        RiskConfig {
            max_positions,
            stop_loss_pct: dec!(5),
            take_profit_pct: dec!(10),
            leverage: dec!(1),
            risk_per_trade_pct: dec!(1),
            taker_fee_rate: dec!(0.000275),
        }
    }

    fn entry_decision(quantity: Option<f64>) -> RawDecision {
        RawDecision {
            action: Some("entry".to_string()),
            side: Some("long".to_string()),
            quantity,
            ..Default::default()
        }
    }

    fn universe() -> Vec<String> {
        vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()]
    }

    #[test]
    fn test_entry_opens_position_and_records_trade() {
        let mut ledger = Ledger::new(dec!(10000), dec!(0.000275));
        let decisions: BTreeMap<String, RawDecision> =
            [("BTC".to_string(), entry_decision(Some(1.0)))].into();
        let prices: BTreeMap<String, Decimal> = [("BTC".to_string(), dec!(100))].into();

        let outcome = apply_decisions(
            &decisions,
            &mut ledger,
            &prices,
            &risk_config(3),
            &universe(),
        );

        assert_eq!(outcome.executed.len(), 1);
        assert_eq!(outcome.executed[0].action, TradeAction::Open);
        assert!(outcome.rejections.is_empty());

        let pos = ledger.position("BTC").unwrap();
        assert_eq!(pos.margin, dec!(100));
        assert_eq!(pos.fees_paid, dec!(0.0275));
        assert_eq!(ledger.balance(), dec!(9899.9725));
    }

    #[test]
    fn test_one_malformed_decision_does_not_block_the_rest() {
        let mut ledger = Ledger::new(dec!(10000), dec!(0.000275));
        let decisions: BTreeMap<String, RawDecision> = [
            ("BTC".to_string(), entry_decision(Some(1.0))),
            ("ETH".to_string(), RawDecision::default()),
            ("SOL".to_string(), entry_decision(Some(2.0))),
        ]
        .into();
        let prices: BTreeMap<String, Decimal> = [
            ("BTC".to_string(), dec!(100)),
            ("ETH".to_string(), dec!(50)),
            ("SOL".to_string(), dec!(20)),
        ]
        .into();

        let outcome = apply_decisions(
            &decisions,
            &mut ledger,
            &prices,
            &risk_config(3),
            &universe(),
        );

        assert_eq!(outcome.executed.len(), 2);
        assert_eq!(
            outcome.rejections,
            vec![("ETH".to_string(), RejectionReason::MalformedDecision)]
        );
        assert!(ledger.has_position("BTC"));
        assert!(!ledger.has_position("ETH"));
        assert!(ledger.has_position("SOL"));
    }

    #[test]
    fn test_position_cap_enforced_across_batch() {
        let mut ledger = Ledger::new(dec!(10000), dec!(0.000275));
        let decisions: BTreeMap<String, RawDecision> = [
            ("BTC".to_string(), entry_decision(Some(1.0))),
            ("ETH".to_string(), entry_decision(Some(1.0))),
        ]
        .into();
        let prices: BTreeMap<String, Decimal> = [
            ("BTC".to_string(), dec!(100)),
            ("ETH".to_string(), dec!(50)),
        ]
        .into();

        let outcome = apply_decisions(
            &decisions,
            &mut ledger,
            &prices,
            &risk_config(1),
            &universe(),
        );

        // BTreeMap iteration order: BTC validates first and takes the slot.
        assert_eq!(outcome.executed.len(), 1);
        assert!(ledger.has_position("BTC"));
        assert_eq!(
            outcome.rejections,
            vec![("ETH".to_string(), RejectionReason::PositionCapExceeded)]
        );
    }

    #[test]
    fn test_unknown_symbol_dropped_without_rejection() {
        let mut ledger = Ledger::new(dec!(10000), dec!(0.000275));
        let decisions: BTreeMap<String, RawDecision> =
            [("DOGE".to_string(), entry_decision(Some(1.0)))].into();
        let prices: BTreeMap<String, Decimal> = [("DOGE".to_string(), dec!(1))].into();

        let outcome = apply_decisions(
            &decisions,
            &mut ledger,
            &prices,
            &risk_config(3),
            &universe(),
        );

        assert!(outcome.executed.is_empty());
        assert!(outcome.rejections.is_empty());
        assert_eq!(ledger.open_position_count(), 0);
    }

    #[test]
    fn test_close_settles_at_current_price() {
        let mut ledger = Ledger::new(dec!(10000), dec!(0.000275));
        let open: BTreeMap<String, RawDecision> =
            [("BTC".to_string(), entry_decision(Some(1.0)))].into();
        let prices: BTreeMap<String, Decimal> = [("BTC".to_string(), dec!(100))].into();
        apply_decisions(&open, &mut ledger, &prices, &risk_config(3), &universe());

        let close: BTreeMap<String, RawDecision> = [(
            "BTC".to_string(),
            RawDecision {
                action: Some("close".to_string()),
                reasoning: Some("trend reversed".to_string()),
                ..Default::default()
            },
        )]
        .into();
        let prices: BTreeMap<String, Decimal> = [("BTC".to_string(), dec!(95))].into();

        let outcome = apply_decisions(&close, &mut ledger, &prices, &risk_config(3), &universe());

        assert_eq!(outcome.executed.len(), 1);
        let record = &outcome.executed[0];
        assert_eq!(record.action, TradeAction::Close);
        assert_eq!(record.exit_price, dec!(95));
        assert_eq!(record.reason, "trend reversed");
        assert_eq!(record.pnl, dec!(-5.053625));
        assert!(!ledger.has_position("BTC"));
        assert_eq!(ledger.balance(), dec!(9994.918875));
    }

    #[test]
    fn test_hold_touches_nothing() {
        let mut ledger = Ledger::new(dec!(10000), dec!(0.000275));
        let decisions: BTreeMap<String, RawDecision> = [(
            "BTC".to_string(),
            RawDecision {
                action: Some("hold".to_string()),
                ..Default::default()
            },
        )]
        .into();

        let outcome = apply_decisions(
            &decisions,
            &mut ledger,
            &BTreeMap::new(),
            &risk_config(3),
            &universe(),
        );

        assert!(outcome.executed.is_empty());
        assert!(outcome.rejections.is_empty());
        assert_eq!(ledger.balance(), dec!(10000));
    }
}
