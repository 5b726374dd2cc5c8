pub mod decision;
pub mod market;
pub mod position;

pub use decision::{RawDecision, RejectionReason, ValidatedAction};
pub use market::{Candle, MarketSnapshot};
pub use position::{Position, Side, TradeAction, TradeRecord};
