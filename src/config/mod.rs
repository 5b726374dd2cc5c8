pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Load and merge all config JSON files into a single [`BotConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   trading.json
///   risk.json
///   market.json
///   oracle.json
/// ```
///
/// # Environment variable overrides
///
/// | Env Var                     | Config Field                      |
/// |-----------------------------|-----------------------------------|
/// | `TRADER_INITIAL_BALANCE`    | `trading.initial_balance`         |
/// | `TRADER_CHECK_INTERVAL`     | `trading.check_interval_seconds`  |
/// | `TRADER_DATA_DIR`           | `trading.data_dir`                |
/// | `TRADER_MAX_POSITIONS`      | `risk.max_positions`              |
/// | `TRADER_LEVERAGE`           | `risk.leverage`                   |
/// | `ORACLE_BASE_URL`           | `oracle.base_url`                 |
/// | `ORACLE_MODEL`              | `oracle.model`                    |
pub fn load_config(config_dir: &Path) -> Result<BotConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig =
        serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let trading: TradingConfig =
        serde_json::from_str(&read("trading.json")?).context("parsing trading.json")?;

    let risk: RiskConfig =
        serde_json::from_str(&read("risk.json")?).context("parsing risk.json")?;

    let market: MarketConfig =
        serde_json::from_str(&read("market.json")?).context("parsing market.json")?;

    let oracle: OracleConfig =
        serde_json::from_str(&read("oracle.json")?).context("parsing oracle.json")?;

    let mut config = BotConfig {
        app,
        trading,
        risk,
        market,
        oracle,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides to the loaded config.
///
/// Only non-empty env vars take effect. Parse failures are logged and skipped
/// (the JSON default remains).
fn apply_env_overrides(config: &mut BotConfig) {
    if let Some(val) = env_decimal("TRADER_INITIAL_BALANCE") {
        info!(%val, "env override: TRADER_INITIAL_BALANCE");
        config.trading.initial_balance = val;
    }

    if let Some(val) = env_parse::<u64>("TRADER_CHECK_INTERVAL") {
        info!(val, "env override: TRADER_CHECK_INTERVAL");
        config.trading.check_interval_seconds = val;
    }

    if let Some(val) = env_string("TRADER_DATA_DIR") {
        info!("env override: TRADER_DATA_DIR");
        config.trading.data_dir = val;
    }

    if let Some(val) = env_parse::<usize>("TRADER_MAX_POSITIONS") {
        info!(val, "env override: TRADER_MAX_POSITIONS");
        config.risk.max_positions = val;
    }

    if let Some(val) = env_decimal("TRADER_LEVERAGE") {
        info!(%val, "env override: TRADER_LEVERAGE");
        config.risk.leverage = val;
    }

    if let Some(val) = env_string("ORACLE_BASE_URL") {
        info!("env override: ORACLE_BASE_URL");
        config.oracle.base_url = val;
    }

    if let Some(val) = env_string("ORACLE_MODEL") {
        info!("env override: ORACLE_MODEL");
        config.oracle.model = val;
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Read a non-empty env var and parse it as `Decimal`.
fn env_decimal(key: &str) -> Option<Decimal> {
    env_string(key).and_then(|v| Decimal::from_str(&v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;

    // -----------------------------------------------------------------------
    // Helper: write a minimal set of config JSON files to a temp dir.
    // -----------------------------------------------------------------------

    fn write_test_configs(dir: &Path) {
        std::fs::write(
            dir.join("app.json"),
            r#"{ "logging": { "log_dir": "logs" } }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("trading.json"),
            r#"{
                "symbols": ["BTCUSDT", "ETHUSDT"],
                "interval": "3m",
                "check_interval_seconds": 180,
                "error_cooldown_seconds": 60,
                "initial_balance": "10000.0",
                "data_dir": "data"
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("risk.json"),
            r#"{
                "max_positions": 3,
                "stop_loss_pct": "5.0",
                "take_profit_pct": "5.0",
                "leverage": "1.0",
                "risk_per_trade_pct": "2.0",
                "taker_fee_rate": "0.000275"
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("market.json"),
            r#"{
                "spot_base_url": "https://api.binance.com",
                "futures_base_url": "https://fapi.binance.com",
                "history_candles": 200,
                "request_timeout_seconds": 10
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("oracle.json"),
            r#"{
                "base_url": "https://generativelanguage.googleapis.com",
                "model": "gemini-2.0-flash-exp",
                "api_key_env": "GEMINI_API_KEY",
                "timeout_seconds": 30,
                "system_prompt": "You are a crypto trading expert."
            }"#,
        )
        .unwrap();
    }

    /// Remove all trader env vars so tests don't interfere with each other.
    fn clean_trader_env() {
        for key in [
            "TRADER_INITIAL_BALANCE",
            "TRADER_CHECK_INTERVAL",
            "TRADER_DATA_DIR",
            "TRADER_MAX_POSITIONS",
            "TRADER_LEVERAGE",
            "ORACLE_BASE_URL",
            "ORACLE_MODEL",
        ] {
            std::env::remove_var(key);
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    #[serial]
    fn test_load_test_configs() {
        clean_trader_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());
        let config = load_config(tmp.path()).expect("test config should load");
        assert_eq!(config.trading.symbols.len(), 2);
        assert_eq!(config.trading.initial_balance, dec!(10000.0));
        assert_eq!(config.risk.max_positions, 3);
        assert_eq!(config.risk.taker_fee_rate, dec!(0.000275));
        // app.json fixture omits the log level; it falls back to info.
        assert_eq!(config.app.logging.level, "info");
        clean_trader_env();
    }

    #[test]
    #[serial]
    fn test_missing_config_file_errors() {
        clean_trader_env();
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(
            err.to_string().contains("failed to read config file"),
            "expected file-not-found error, got: {err}"
        );
        clean_trader_env();
    }

    #[test]
    #[serial]
    fn test_env_override_initial_balance() {
        clean_trader_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("TRADER_INITIAL_BALANCE", "5000");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.trading.initial_balance, dec!(5000));
        clean_trader_env();
    }

    #[test]
    #[serial]
    fn test_env_override_empty_string_ignored() {
        clean_trader_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("TRADER_MAX_POSITIONS", "");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.risk.max_positions, 3);
        clean_trader_env();
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_parse_ignored() {
        clean_trader_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("TRADER_CHECK_INTERVAL", "not_a_number");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.trading.check_interval_seconds, 180);
        clean_trader_env();
    }

    #[test]
    #[serial]
    fn test_zero_max_positions_rejected() {
        clean_trader_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("TRADER_MAX_POSITIONS", "0");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(
            err.to_string().contains("max_positions"),
            "expected max_positions error, got: {err}"
        );
        clean_trader_env();
    }

    #[test]
    #[serial]
    fn test_invalid_risk_config_collects_errors() {
        clean_trader_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::fs::write(
            tmp.path().join("risk.json"),
            r#"{
                "max_positions": 0,
                "stop_loss_pct": "0",
                "take_profit_pct": "-1",
                "leverage": "0.5",
                "risk_per_trade_pct": "0",
                "taker_fee_rate": "-0.1"
            }"#,
        )
        .unwrap();

        let err = load_config(tmp.path()).unwrap_err();
        let msg = err.to_string();
        for field in [
            "max_positions",
            "stop_loss_pct",
            "take_profit_pct",
            "leverage",
            "risk_per_trade_pct",
            "taker_fee_rate",
        ] {
            assert!(msg.contains(field), "missing {field} in: {msg}");
        }
        clean_trader_env();
    }
}
