//! Process-wide constants.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Taker fee rate applied symmetrically on entry and exit, used when the risk
/// config omits one.
pub const DEFAULT_TAKER_FEE_RATE: Decimal = dec!(0.000275);

/// Minimum candle history required for MACD(12,26,9) to produce a signal line.
pub const MIN_CANDLES_FOR_INDICATORS: usize = 35;

/// Fallback cooldown after a failed cycle, seconds.
pub const DEFAULT_ERROR_COOLDOWN_SECONDS: u64 = 60;
