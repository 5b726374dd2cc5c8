//! Decision oracle client (Gemini `generateContent` API).
//!
//! The oracle is an untrusted external function: the request can time out,
//! the response can be malformed, and the content can be incoherent. Every
//! failure surfaces as a typed error that the engine downgrades to an empty
//! decision set, so a bad oracle call degrades the cycle to all-hold.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{OracleConfig, RiskConfig};
use crate::core::ledger::Ledger;
use crate::errors::BotError;
use crate::types::{MarketSnapshot, RawDecision};

pub struct OracleClient {
    client: reqwest::Client,
    config: OracleConfig,
    api_key: String,
}

impl OracleClient {
    pub fn new(config: OracleConfig, api_key: String) -> Result<Self, BotError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BotError::Config(format!("build oracle HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Ask the oracle for one decision per symbol.
    ///
    /// The prompt carries the account state and the cycle's market snapshots;
    /// the model is asked for a single JSON object keyed by symbol.
    pub async fn propose(
        &self,
        ledger: &Ledger,
        prices: &BTreeMap<String, rust_decimal::Decimal>,
        snapshots: &[MarketSnapshot],
        risk: &RiskConfig,
    ) -> Result<BTreeMap<String, RawDecision>, BotError> {
        let prompt = self.build_prompt(ledger, prices, snapshots, risk)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::OracleUnavailable {
                        reason: format!("timeout after {}s", self.config.timeout_seconds),
                    }
                } else {
                    BotError::OracleUnavailable {
                        reason: format!("request failed: {e}"),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::OracleUnavailable {
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let payload: Value = resp.json().await.map_err(|e| BotError::OracleMalformed {
            reason: format!("response not JSON: {e}"),
        })?;

        let text = payload
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| BotError::OracleMalformed {
                reason: "no candidates[0].content.parts[0].text in response".into(),
            })?;

        let decisions = extract_decisions(text)?;
        debug!(
            decisions = decisions.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "oracle responded"
        );
        Ok(decisions)
    }

    fn build_prompt(
        &self,
        ledger: &Ledger,
        prices: &BTreeMap<String, rust_decimal::Decimal>,
        snapshots: &[MarketSnapshot],
        risk: &RiskConfig,
    ) -> Result<String, BotError> {
        let positions: Vec<Value> = ledger
            .positions()
            .values()
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                json!({
                    "symbol": pos.symbol,
                    "side": pos.side.as_str(),
                    "quantity": pos.quantity.to_string(),
                    "entry_price": pos.entry_price.to_string(),
                    "stop_loss": pos.stop_loss.to_string(),
                    "profit_target": pos.profit_target.to_string(),
                    "leverage": pos.leverage.to_string(),
                    "unrealized_pnl": pos.unrealized_pnl(price).to_string(),
                })
            })
            .collect();

        let context = json!({
            "account": {
                "balance": ledger.balance().to_string(),
                "total_equity": ledger.total_equity(prices).to_string(),
                "return_pct": ledger.return_pct(prices).to_string(),
                "open_positions": ledger.open_position_count(),
                "max_positions": risk.max_positions,
            },
            "positions": positions,
            "market": snapshots,
        });
        let context_json =
            serde_json::to_string_pretty(&context).map_err(|e| BotError::OracleMalformed {
                reason: format!("serialize prompt context: {e}"),
            })?;

        Ok(format!(
            "{}\n\nCurrent state:\n{}\n\nRespond with a single JSON object mapping each symbol to \
             {{\"action\": \"hold\"|\"entry\"|\"close\", \"side\": \"long\"|\"short\", \
             \"quantity\": number, \"stop_loss\": number, \"profit_target\": number, \
             \"leverage\": number, \"reasoning\": string}}. No other text.",
            self.config.system_prompt, context_json
        ))
    }
}

/// Pull the decision map out of the model's free-text reply.
///
/// Models wrap JSON in prose and code fences, so take the substring from the
/// first `{` to the last `}` and parse that. Non-object values inside the map
/// are skipped with a warning rather than failing the batch.
pub fn extract_decisions(text: &str) -> Result<BTreeMap<String, RawDecision>, BotError> {
    let start = text.find('{').ok_or_else(|| BotError::OracleMalformed {
        reason: "no JSON object in oracle text".into(),
    })?;
    let end = text.rfind('}').ok_or_else(|| BotError::OracleMalformed {
        reason: "unterminated JSON object in oracle text".into(),
    })?;
    if end <= start {
        return Err(BotError::OracleMalformed {
            reason: "no JSON object in oracle text".into(),
        });
    }

    let value: Value =
        serde_json::from_str(&text[start..=end]).map_err(|e| BotError::OracleMalformed {
            reason: format!("oracle JSON did not parse: {e}"),
        })?;
    let map = value.as_object().ok_or_else(|| BotError::OracleMalformed {
        reason: "oracle JSON is not an object".into(),
    })?;

    let mut decisions = BTreeMap::new();
    for (symbol, entry) in map {
        if !entry.is_object() {
            warn!(symbol = %symbol, "skipping non-object decision entry");
            continue;
        }
        match serde_json::from_value::<RawDecision>(entry.clone()) {
            Ok(decision) => {
                decisions.insert(symbol.clone(), decision);
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping unparseable decision entry");
            }
        }
    }

    Ok(decisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_json() {
        let text = r#"{"BTC": {"action": "entry", "side": "long", "quantity": 0.5}}"#;
        let decisions = extract_decisions(text).unwrap();
        assert_eq!(decisions.len(), 1);
        let btc = &decisions["BTC"];
        assert_eq!(btc.action.as_deref(), Some("entry"));
        assert_eq!(btc.quantity, Some(0.5));
    }

    #[test]
    fn test_extract_json_wrapped_in_code_fence() {
        let text = "Here is my analysis.\n```json\n{\"BTC\": {\"action\": \"hold\"}}\n```\nDone.";
        let decisions = extract_decisions(text).unwrap();
        assert_eq!(decisions["BTC"].action.as_deref(), Some("hold"));
    }

    #[test]
    fn test_extract_honors_field_aliases() {
        let text = r#"{"ETH": {"decision": "close", "justification": "rsi overbought"}}"#;
        let decisions = extract_decisions(text).unwrap();
        let eth = &decisions["ETH"];
        assert_eq!(eth.action.as_deref(), Some("close"));
        assert_eq!(eth.reasoning.as_deref(), Some("rsi overbought"));
    }

    #[test]
    fn test_extract_skips_non_object_entries() {
        let text = r#"{"BTC": {"action": "hold"}, "note": "feeling bullish"}"#;
        let decisions = extract_decisions(text).unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(decisions.contains_key("BTC"));
    }

    #[test]
    fn test_extract_no_json_is_malformed() {
        let err = extract_decisions("I cannot comply with this request.").unwrap_err();
        assert!(matches!(err, BotError::OracleMalformed { .. }));
    }

    #[test]
    fn test_extract_broken_json_is_malformed() {
        let err = extract_decisions(r#"{"BTC": {"action": "#).unwrap_err();
        assert!(matches!(err, BotError::OracleMalformed { .. }));
    }

    #[test]
    fn test_extract_empty_object_is_empty_batch() {
        let decisions = extract_decisions("{}").unwrap();
        assert!(decisions.is_empty());
    }
}
