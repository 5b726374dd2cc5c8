//! Pure computation module for technical indicators.
//!
//! No I/O, no side effects. Takes close-price slices and returns indicator
//! values. All computations use `Decimal` for precision. Only the indicators
//! the snapshot contract needs are implemented: EMA, RSI (Wilder's
//! smoothing), and MACD.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Exponential Moving Average, seeded with the SMA of the first `period`
/// values. Returns an empty vec if there is insufficient data.
pub fn ema(prices: &[Decimal], period: usize) -> Vec<Decimal> {
    if prices.len() < period || period == 0 {
        return Vec::new();
    }

    let k = dec!(2) / Decimal::from(period as u64 + 1);
    let one_minus_k = dec!(1) - k;

    let sma: Decimal = prices[..period].iter().copied().sum::<Decimal>()
        / Decimal::from(period as u64);

    let mut result = Vec::with_capacity(prices.len() - period + 1);
    result.push(sma);

    for &price in &prices[period..] {
        let prev = *result.last().expect("result is seeded with SMA");
        result.push(price * k + prev * one_minus_k);
    }

    result
}

/// Relative Strength Index (Wilder's smoothing).
///
/// Uses smoothing factor `1/period` (not the standard EMA `2/(period+1)`).
/// Returns 50 if insufficient data.
pub fn rsi(prices: &[Decimal], period: usize) -> Decimal {
    if prices.len() < period + 1 || period == 0 {
        return dec!(50);
    }

    let period_d = Decimal::from(period as u64);
    let period_minus_1 = Decimal::from(period as u64 - 1);

    let changes: Vec<Decimal> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period]
        .iter()
        .map(|&c| if c > Decimal::ZERO { c } else { Decimal::ZERO })
        .sum::<Decimal>()
        / period_d;

    let mut avg_loss = changes[..period]
        .iter()
        .map(|&c| if c < Decimal::ZERO { -c } else { Decimal::ZERO })
        .sum::<Decimal>()
        / period_d;

    // Wilder's smoothing for remaining changes.
    for &c in &changes[period..] {
        if c > Decimal::ZERO {
            avg_gain = (avg_gain * period_minus_1 + c) / period_d;
            avg_loss = (avg_loss * period_minus_1) / period_d;
        } else {
            avg_gain = (avg_gain * period_minus_1) / period_d;
            avg_loss = (avg_loss * period_minus_1 + c.abs()) / period_d;
        }
    }

    if avg_loss == Decimal::ZERO {
        return dec!(100);
    }

    let rs = avg_gain / avg_loss;
    dec!(100) - (dec!(100) / (dec!(1) + rs))
}

/// Moving Average Convergence Divergence.
///
/// Returns `(macd_line, signal_line)`. Returns `(0, 0)` if insufficient data.
pub fn macd(
    prices: &[Decimal],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Decimal, Decimal) {
    if fast >= slow || prices.len() < slow + signal {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    let fast_ema = ema(prices, fast);
    let slow_ema = ema(prices, slow);

    if fast_ema.is_empty() || slow_ema.is_empty() {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    // Align: MACD line = fast_ema - slow_ema, from the slow-start onward.
    let offset = slow - fast;
    let macd_values: Vec<Decimal> = (0..slow_ema.len())
        .map(|i| fast_ema[i + offset] - slow_ema[i])
        .collect();

    let signal_ema = ema(&macd_values, signal);
    if signal_ema.is_empty() {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    let macd_line = *macd_values.last().expect("macd_values non-empty after ema");
    let signal_line = *signal_ema
        .last()
        .expect("signal_ema non-empty after is_empty check");

    (macd_line, signal_line)
}
