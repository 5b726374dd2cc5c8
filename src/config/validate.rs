use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::constants::MIN_CANDLES_FOR_INDICATORS;

use super::types::BotConfig;

/// Validate invariants across the merged config that serde alone cannot
/// enforce. Called automatically by [`super::load_config`]. Collects every
/// violation before failing so a bad config file surfaces all problems at
/// once.
pub fn validate_config(config: &BotConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_trading(config, &mut errors);
    validate_risk(config, &mut errors);
    validate_market(config, &mut errors);
    validate_oracle(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// trading.json
// ---------------------------------------------------------------------------

fn validate_trading(config: &BotConfig, errors: &mut Vec<String>) {
    let trading = &config.trading;

    if trading.symbols.is_empty() {
        errors.push("trading: symbols list is empty".into());
    }
    for symbol in &trading.symbols {
        if symbol.trim().is_empty() {
            errors.push("trading: symbols contains an empty entry".into());
        }
    }

    if trading.interval.is_empty() {
        errors.push("trading: interval is empty".into());
    }

    if trading.check_interval_seconds == 0 {
        errors.push("trading: check_interval_seconds must be >= 1".into());
    }

    if trading.initial_balance <= Decimal::ZERO {
        errors.push(format!(
            "trading: initial_balance must be positive, got {}",
            trading.initial_balance
        ));
    }

    if trading.data_dir.is_empty() {
        errors.push("trading: data_dir is empty".into());
    }
}

// ---------------------------------------------------------------------------
// risk.json
// ---------------------------------------------------------------------------

fn validate_risk(config: &BotConfig, errors: &mut Vec<String>) {
    let risk = &config.risk;

    if risk.max_positions < 1 {
        errors.push("risk: max_positions must be >= 1".into());
    }

    if risk.stop_loss_pct <= Decimal::ZERO {
        errors.push(format!(
            "risk: stop_loss_pct must be > 0, got {}",
            risk.stop_loss_pct
        ));
    }

    if risk.take_profit_pct <= Decimal::ZERO {
        errors.push(format!(
            "risk: take_profit_pct must be > 0, got {}",
            risk.take_profit_pct
        ));
    }

    if risk.leverage < dec!(1) {
        errors.push(format!("risk: leverage must be >= 1, got {}", risk.leverage));
    }

    if risk.risk_per_trade_pct <= Decimal::ZERO {
        errors.push(format!(
            "risk: risk_per_trade_pct must be > 0, got {}",
            risk.risk_per_trade_pct
        ));
    }

    if risk.taker_fee_rate < Decimal::ZERO {
        errors.push(format!(
            "risk: taker_fee_rate must be >= 0, got {}",
            risk.taker_fee_rate
        ));
    }
}

// ---------------------------------------------------------------------------
// market.json
// ---------------------------------------------------------------------------

fn validate_market(config: &BotConfig, errors: &mut Vec<String>) {
    let market = &config.market;

    if market.spot_base_url.is_empty() {
        errors.push("market: spot_base_url is empty".into());
    }
    if market.futures_base_url.is_empty() {
        errors.push("market: futures_base_url is empty".into());
    }

    if (market.history_candles as usize) < MIN_CANDLES_FOR_INDICATORS {
        errors.push(format!(
            "market: history_candles must be >= {MIN_CANDLES_FOR_INDICATORS} for MACD, got {}",
            market.history_candles
        ));
    }

    if market.request_timeout_seconds == 0 {
        errors.push("market: request_timeout_seconds must be >= 1".into());
    }
}

// ---------------------------------------------------------------------------
// oracle.json
// ---------------------------------------------------------------------------

fn validate_oracle(config: &BotConfig, errors: &mut Vec<String>) {
    let oracle = &config.oracle;

    if oracle.base_url.is_empty() {
        errors.push("oracle: base_url is empty".into());
    }
    if oracle.model.is_empty() {
        errors.push("oracle: model is empty".into());
    }
    if oracle.api_key_env.is_empty() {
        errors.push("oracle: api_key_env is empty".into());
    }
    if oracle.timeout_seconds == 0 {
        errors.push("oracle: timeout_seconds must be >= 1".into());
    }
    if oracle.system_prompt.trim().is_empty() {
        errors.push("oracle: system_prompt is empty".into());
    }
}
