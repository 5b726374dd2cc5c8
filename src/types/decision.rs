//! Oracle decision payloads.
//!
//! `RawDecision` is what the LLM actually sent — loosely typed, every field
//! optional, trusted for nothing. The validator turns it into a
//! `ValidatedAction` (closed sum type) or a `RejectionReason`; only validated
//! actions may mutate the ledger.

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use super::position::Side;

/// Untrusted per-symbol decision as parsed from the oracle response.
///
/// Field names follow the prompt contract; `decision` and `justification`
/// aliases match payloads the model has been observed to emit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDecision {
    #[serde(default, alias = "decision")]
    pub action: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub profit_target: Option<f64>,
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(default, alias = "justification")]
    pub reasoning: Option<String>,
}

/// A decision that passed every validation rule and is safe to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedAction {
    /// No-op: keep current state for the symbol.
    Hold,
    /// Open a new position with fully resolved parameters.
    Entry {
        side: Side,
        quantity: Decimal,
        price: Decimal,
        stop_loss: Decimal,
        profit_target: Decimal,
        leverage: Decimal,
    },
    /// Close the symbol's open position at the current price.
    Close,
}

/// Why a decision was rejected. First failing rule wins; rejections never
/// block other symbols in the same batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("unknown or missing action")]
    MalformedDecision,

    #[error("position already open for symbol")]
    DuplicatePosition,

    #[error("open position cap reached")]
    PositionCapExceeded,

    #[error("quantity or price not positive")]
    InvalidQuantityOrPrice,

    #[error("no open position for symbol")]
    NoSuchPosition,
}
