//! Market data service: Binance spot klines and tickers, futures funding.
//!
//! One snapshot per symbol per cycle, so no response caching — the cycle
//! cadence is minutes, far above any sensible TTL.
//!
//! Endpoints:
//!   - Spot `/api/v3/klines`: `[[open_time, O, H, L, C, V, …], …]`
//!   - Spot `/api/v3/ticker/price`: `{"symbol": …, "price": "…"}`
//!   - Futures `/fapi/v1/fundingRate?limit=1`: `[{"fundingRate": "…"}]`

use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::core::indicators;
use crate::errors::BotError;
use crate::types::{Candle, MarketSnapshot};

const RSI_PERIOD: usize = 14;
const EMA_PERIOD: usize = 20;

pub struct MarketDataService {
    client: reqwest::Client,
    config: MarketConfig,
    /// Candle interval, e.g. `"3m"`.
    interval: String,
}

impl MarketDataService {
    pub fn new(config: MarketConfig, interval: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("build market data HTTP client")?;
        Ok(Self {
            client,
            config,
            interval,
        })
    }

    /// GET a Binance endpoint and return the parsed JSON body.
    async fn get_json(&self, base: &str, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{base}{path}");
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%url, %status, body = %body, "market data request failed");
            return Err(BotError::DataUnavailable {
                symbol: url,
                reason: format!("HTTP {status}"),
            }
            .into());
        }

        resp.json::<Value>()
            .await
            .with_context(|| format!("parse JSON from {url}"))
    }

    /// Fetch OHLCV candles from the spot klines endpoint.
    pub async fn fetch_candles(&self, symbol: &str, limit: u32) -> Result<Vec<Candle>> {
        let limit_str = limit.to_string();
        let data = self
            .get_json(
                &self.config.spot_base_url,
                "/api/v3/klines",
                &[
                    ("symbol", symbol),
                    ("interval", &self.interval),
                    ("limit", &limit_str),
                ],
            )
            .await?;

        let arr = data.as_array().ok_or_else(|| BotError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "klines response not an array".into(),
        })?;

        let mut candles = Vec::with_capacity(arr.len());
        for k in arr {
            let items = match k.as_array() {
                Some(a) if a.len() >= 6 => a,
                _ => continue,
            };
            candles.push(Candle {
                open_time: items[0].as_i64().unwrap_or(0) / 1000,
                open: parse_decimal_str(&items[1]),
                high: parse_decimal_str(&items[2]),
                low: parse_decimal_str(&items[3]),
                close: parse_decimal_str(&items[4]),
                volume: parse_decimal_str(&items[5]),
            });
        }

        debug!(
            symbol,
            candles = candles.len(),
            latest_close = %candles.last().map(|c| c.close).unwrap_or_default(),
            "candles fetched"
        );

        Ok(candles)
    }

    /// Current spot price from the ticker endpoint.
    pub async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        let data = self
            .get_json(
                &self.config.spot_base_url,
                "/api/v3/ticker/price",
                &[("symbol", symbol)],
            )
            .await?;

        data.get("price")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Decimal>().ok())
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| {
                BotError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: "ticker price missing or non-positive".into(),
                }
                .into()
            })
    }

    /// Latest perpetual funding rate. Missing data degrades to zero rather
    /// than failing the snapshot.
    pub async fn funding_rate(&self, symbol: &str) -> Decimal {
        let result = self
            .get_json(
                &self.config.futures_base_url,
                "/fapi/v1/fundingRate",
                &[("symbol", symbol), ("limit", "1")],
            )
            .await;

        match result {
            Ok(data) => data
                .as_array()
                .and_then(|a| a.first())
                .and_then(|entry| entry.get("fundingRate"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Decimal>().ok())
                .unwrap_or(Decimal::ZERO),
            Err(err) => {
                debug!(symbol, error = %err, "funding rate unavailable, defaulting to zero");
                Decimal::ZERO
            }
        }
    }

    /// Build the full per-symbol snapshot: price, EMA20, RSI14, MACD(12,26,9),
    /// funding rate.
    ///
    /// If the ticker fails but candles are present, the last close stands in
    /// for the current price.
    pub async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let candles = self
            .fetch_candles(symbol, self.config.history_candles)
            .await?;
        if candles.len() < crate::constants::MIN_CANDLES_FOR_INDICATORS {
            return Err(BotError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("only {} candles, need more history", candles.len()),
            }
            .into());
        }

        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();

        let price = match self.current_price(symbol).await {
            Ok(p) => p,
            Err(err) => {
                let fallback = *closes.last().unwrap_or(&Decimal::ZERO);
                warn!(symbol, error = %err, price = %fallback, "ticker failed, using last close");
                fallback
            }
        };

        let ema20 = indicators::ema(&closes, EMA_PERIOD)
            .last()
            .copied()
            .unwrap_or(Decimal::ZERO);
        let rsi = indicators::rsi(&closes, RSI_PERIOD);
        let (macd, macd_signal) = indicators::macd(&closes, 12, 26, 9);
        let funding_rate = self.funding_rate(symbol).await;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            price,
            ema20,
            rsi,
            macd,
            macd_signal,
            funding_rate,
        })
    }
}

/// Parse a `serde_json::Value` that may be a number-as-string into `Decimal`.
fn parse_decimal_str(v: &Value) -> Decimal {
    v.as_str()
        .and_then(|s| s.parse::<Decimal>().ok())
        .or_else(|| v.as_f64().and_then(Decimal::from_f64))
        .unwrap_or(Decimal::ZERO)
}
