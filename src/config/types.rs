//! Config structs deserialized from the JSON files under the config dir.
//!
//! Decimal-valued fields are strings in JSON (`"3.0"`) to avoid float
//! round-tripping, parsed via `rust_decimal::serde::str`.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Merged view of all config files. Validated once at startup, immutable
/// during a run.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub app: AppConfig,
    pub trading: TradingConfig,
    pub risk: RiskConfig,
    pub market: MarketConfig,
    pub oracle: OracleConfig,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    /// Baseline level for this crate's spans when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// trading.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Exchange symbols to trade, e.g. `["BTCUSDT", "ETHUSDT"]`.
    pub symbols: Vec<String>,
    /// Candle interval for the snapshot fetch, e.g. `"3m"`.
    pub interval: String,
    /// Seconds between cycles.
    pub check_interval_seconds: u64,
    /// Cooldown after a failed cycle before retrying the loop.
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown_seconds: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub initial_balance: Decimal,
    /// Directory for the CSV persistence sink.
    pub data_dir: String,
}

// ---------------------------------------------------------------------------
// risk.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Maximum simultaneously open positions.
    pub max_positions: usize,
    /// Default stop-loss distance, percent of entry price.
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_loss_pct: Decimal,
    /// Default take-profit distance, percent of entry price.
    #[serde(with = "rust_decimal::serde::str")]
    pub take_profit_pct: Decimal,
    /// Default leverage when the oracle omits one.
    #[serde(with = "rust_decimal::serde::str")]
    pub leverage: Decimal,
    /// Capital fraction risked per trade, percent.
    #[serde(with = "rust_decimal::serde::str")]
    pub risk_per_trade_pct: Decimal,
    /// Taker fee rate applied symmetrically on entry and exit.
    #[serde(with = "rust_decimal::serde::str", default = "default_taker_fee_rate")]
    pub taker_fee_rate: Decimal,
}

fn default_error_cooldown() -> u64 {
    crate::constants::DEFAULT_ERROR_COOLDOWN_SECONDS
}

fn default_taker_fee_rate() -> Decimal {
    crate::constants::DEFAULT_TAKER_FEE_RATE
}

// ---------------------------------------------------------------------------
// market.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub spot_base_url: String,
    pub futures_base_url: String,
    /// Candle history depth per snapshot fetch.
    pub history_candles: u32,
    pub request_timeout_seconds: u64,
}

// ---------------------------------------------------------------------------
// oracle.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the Gemini-compatible API.
    pub base_url: String,
    /// Model name, e.g. `"gemini-2.0-flash-exp"`.
    pub model: String,
    /// Env var holding the API key (never stored in config files).
    pub api_key_env: String,
    pub timeout_seconds: u64,
    /// System prompt prepended to every consultation.
    pub system_prompt: String,
}
