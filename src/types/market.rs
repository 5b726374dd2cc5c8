use rust_decimal::Decimal;
use serde::Serialize;

/// One OHLCV bar from the spot klines endpoint.
#[derive(Debug, Clone)]
pub struct Candle {
    /// Bar open time, milliseconds since epoch.
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// One cycle's market read for one symbol: price plus the indicator vector
/// presented to the oracle.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ema20: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rsi: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub macd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub macd_signal: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub funding_rate: Decimal,
}
