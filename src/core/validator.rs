//! Decision validation gate.
//!
//! Every oracle-proposed decision passes through [`validate`] before it is
//! allowed anywhere near the ledger. The oracle is untrusted input: fields
//! may be absent, non-numeric, or incoherent, and the book may have moved
//! since the prompt was built.

use rust_decimal::Decimal;

use crate::config::RiskConfig;
use crate::types::{RawDecision, RejectionReason, Side, ValidatedAction};

use super::ledger::Ledger;

/// Validate one decision against the current book and risk limits.
///
/// Rules apply in order:
/// 1. `action` must be one of `hold` / `entry` / `close`.
/// 2. `entry` on a symbol that is already open is rejected.
/// 3. `entry` past the open-position cap is rejected.
/// 4. `entry` requires a positive quantity and a positive resolvable price.
/// 5. `close` on a symbol with no open position is rejected.
///
/// Missing leverage falls back to the configured default, and missing
/// stop-loss / profit-target are derived from the configured percentages
/// around the current price. Quantity is never defaulted: an entry without a
/// positive quantity is rejected.
pub fn validate(
    symbol: &str,
    decision: &RawDecision,
    ledger: &Ledger,
    risk: &RiskConfig,
    current_price: Option<Decimal>,
) -> Result<ValidatedAction, RejectionReason> {
    let action = decision
        .action
        .as_deref()
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .ok_or(RejectionReason::MalformedDecision)?;

    match action.as_str() {
        "hold" => Ok(ValidatedAction::Hold),
        "entry" => validate_entry(symbol, decision, ledger, risk, current_price),
        "close" => {
            if !ledger.has_position(symbol) {
                return Err(RejectionReason::NoSuchPosition);
            }
            Ok(ValidatedAction::Close)
        }
        _ => Err(RejectionReason::MalformedDecision),
    }
}

fn validate_entry(
    symbol: &str,
    decision: &RawDecision,
    ledger: &Ledger,
    risk: &RiskConfig,
    current_price: Option<Decimal>,
) -> Result<ValidatedAction, RejectionReason> {
    if ledger.has_position(symbol) {
        return Err(RejectionReason::DuplicatePosition);
    }
    if ledger.open_position_count() >= risk.max_positions {
        return Err(RejectionReason::PositionCapExceeded);
    }

    let quantity = decision
        .quantity
        .and_then(to_decimal)
        .filter(|q| *q > Decimal::ZERO)
        .ok_or(RejectionReason::InvalidQuantityOrPrice)?;
    let price = current_price
        .filter(|p| *p > Decimal::ZERO)
        .ok_or(RejectionReason::InvalidQuantityOrPrice)?;

    let side = match decision.side.as_deref().map(str::to_ascii_lowercase) {
        Some(s) if s == "short" => Side::Short,
        _ => Side::Long,
    };

    let leverage = decision
        .leverage
        .and_then(to_decimal)
        .filter(|l| *l >= Decimal::ONE)
        .unwrap_or(risk.leverage);

    let (stop_loss, profit_target) = protective_levels(decision, side, price, risk);

    Ok(ValidatedAction::Entry {
        side,
        quantity,
        price,
        stop_loss,
        profit_target,
        leverage,
    })
}

/// Stop-loss and profit-target for a new entry, preferring the oracle's own
/// levels when they are present and positive, otherwise deriving them from
/// the configured percentages on the correct side of the entry price.
fn protective_levels(
    decision: &RawDecision,
    side: Side,
    price: Decimal,
    risk: &RiskConfig,
) -> (Decimal, Decimal) {
    let proposed_stop = decision
        .stop_loss
        .and_then(to_decimal)
        .filter(|v| *v > Decimal::ZERO);
    let proposed_target = decision
        .profit_target
        .and_then(to_decimal)
        .filter(|v| *v > Decimal::ZERO);

    let hundred = Decimal::ONE_HUNDRED;
    let (default_stop, default_target) = match side {
        Side::Long => (
            price * (hundred - risk.stop_loss_pct) / hundred,
            price * (hundred + risk.take_profit_pct) / hundred,
        ),
        Side::Short => (
            price * (hundred + risk.stop_loss_pct) / hundred,
            price * (hundred - risk.take_profit_pct) / hundred,
        ),
    };

    (
        proposed_stop.unwrap_or(default_stop),
        proposed_target.unwrap_or(default_target),
    )
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn risk_config() -> RiskConfig {
        RiskConfig {
            max_positions: 3,
            stop_loss_pct: dec!(5),
            take_profit_pct: dec!(10),
            leverage: dec!(2),
            risk_per_trade_pct: dec!(1),
            taker_fee_rate: dec!(0.000275),
        }
    }

    fn ledger() -> Ledger {
        Ledger::new(dec!(10000), dec!(0.000275))
    }

    fn ledger_with(symbol: &str) -> Ledger {
        let mut l = ledger();
        l.open_position(
            Position {
                symbol: symbol.to_string(),
                side: Side::Long,
                quantity: dec!(1),
                entry_price: dec!(100),
                stop_loss: dec!(95),
                profit_target: dec!(110),
                leverage: dec!(1),
                margin: dec!(100),
                fees_paid: dec!(0.0275),
                opened_at: Utc::now(),
            },
            "",
        );
        l
    }

    fn entry(quantity: Option<f64>) -> RawDecision {
        RawDecision {
            action: Some("entry".to_string()),
            side: Some("long".to_string()),
            quantity,
            stop_loss: None,
            profit_target: None,
            leverage: None,
            reasoning: None,
        }
    }

    #[test]
    fn test_hold_always_validates() {
        let d = RawDecision {
            action: Some("hold".to_string()),
            ..Default::default()
        };
        let out = validate("BTC", &d, &ledger(), &risk_config(), None).unwrap();
        assert_eq!(out, ValidatedAction::Hold);
    }

    #[test]
    fn test_missing_action_is_malformed() {
        let d = RawDecision::default();
        let err = validate("BTC", &d, &ledger(), &risk_config(), Some(dec!(100))).unwrap_err();
        assert_eq!(err, RejectionReason::MalformedDecision);
    }

    #[test]
    fn test_unknown_action_is_malformed() {
        let d = RawDecision {
            action: Some("yolo".to_string()),
            ..Default::default()
        };
        let err = validate("BTC", &d, &ledger(), &risk_config(), Some(dec!(100))).unwrap_err();
        assert_eq!(err, RejectionReason::MalformedDecision);
    }

    #[test]
    fn test_action_is_case_insensitive() {
        let d = RawDecision {
            action: Some(" HOLD ".to_string()),
            ..Default::default()
        };
        assert!(validate("BTC", &d, &ledger(), &risk_config(), None).is_ok());
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let l = ledger_with("BTC");
        let err = validate("BTC", &entry(Some(1.0)), &l, &risk_config(), Some(dec!(100)))
            .unwrap_err();
        assert_eq!(err, RejectionReason::DuplicatePosition);
    }

    #[test]
    fn test_position_cap_rejected() {
        let l = ledger_with("BTC");
        let mut risk = risk_config();
        risk.max_positions = 1;
        let err =
            validate("ETH", &entry(Some(1.0)), &l, &risk, Some(dec!(100))).unwrap_err();
        assert_eq!(err, RejectionReason::PositionCapExceeded);
    }

    #[test]
    fn test_missing_quantity_rejected_not_defaulted() {
        let err = validate("BTC", &entry(None), &ledger(), &risk_config(), Some(dec!(100)))
            .unwrap_err();
        assert_eq!(err, RejectionReason::InvalidQuantityOrPrice);
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let err = validate("BTC", &entry(Some(0.0)), &ledger(), &risk_config(), Some(dec!(100)))
            .unwrap_err();
        assert_eq!(err, RejectionReason::InvalidQuantityOrPrice);
    }

    #[test]
    fn test_missing_price_rejected() {
        let err =
            validate("BTC", &entry(Some(1.0)), &ledger(), &risk_config(), None).unwrap_err();
        assert_eq!(err, RejectionReason::InvalidQuantityOrPrice);
    }

    #[test]
    fn test_close_without_position_rejected() {
        let d = RawDecision {
            action: Some("close".to_string()),
            ..Default::default()
        };
        let err = validate("BTC", &d, &ledger(), &risk_config(), Some(dec!(100))).unwrap_err();
        assert_eq!(err, RejectionReason::NoSuchPosition);
    }

    #[test]
    fn test_close_with_position_validates() {
        let l = ledger_with("BTC");
        let d = RawDecision {
            action: Some("close".to_string()),
            ..Default::default()
        };
        let out = validate("BTC", &d, &l, &risk_config(), Some(dec!(100))).unwrap();
        assert_eq!(out, ValidatedAction::Close);
    }

    #[test]
    fn test_defaults_applied_for_long_entry() {
        let out = validate("BTC", &entry(Some(2.0)), &ledger(), &risk_config(), Some(dec!(100)))
            .unwrap();
        match out {
            ValidatedAction::Entry {
                side,
                quantity,
                price,
                stop_loss,
                profit_target,
                leverage,
            } => {
                assert_eq!(side, Side::Long);
                assert_eq!(quantity, dec!(2));
                assert_eq!(price, dec!(100));
                assert_eq!(stop_loss, dec!(95));
                assert_eq!(profit_target, dec!(110));
                assert_eq!(leverage, dec!(2));
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_mirrored_for_short_entry() {
        let mut d = entry(Some(1.0));
        d.side = Some("short".to_string());
        let out = validate("BTC", &d, &ledger(), &risk_config(), Some(dec!(100))).unwrap();
        match out {
            ValidatedAction::Entry {
                side,
                stop_loss,
                profit_target,
                ..
            } => {
                assert_eq!(side, Side::Short);
                assert_eq!(stop_loss, dec!(105));
                assert_eq!(profit_target, dec!(90));
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_oracle_levels_preferred_over_defaults() {
        let mut d = entry(Some(1.0));
        d.stop_loss = Some(97.5);
        d.profit_target = Some(120.0);
        d.leverage = Some(5.0);
        let out = validate("BTC", &d, &ledger(), &risk_config(), Some(dec!(100))).unwrap();
        match out {
            ValidatedAction::Entry {
                stop_loss,
                profit_target,
                leverage,
                ..
            } => {
                assert_eq!(stop_loss, dec!(97.5));
                assert_eq!(profit_target, dec!(120));
                assert_eq!(leverage, dec!(5));
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_sub_one_leverage_falls_back_to_default() {
        let mut d = entry(Some(1.0));
        d.leverage = Some(0.5);
        let out = validate("BTC", &d, &ledger(), &risk_config(), Some(dec!(100))).unwrap();
        match out {
            ValidatedAction::Entry { leverage, .. } => assert_eq!(leverage, dec!(2)),
            other => panic!("expected entry, got {other:?}"),
        }
    }
}
