use thiserror::Error;

/// Typed error hierarchy for the trading bot.
///
/// Library-internal errors use specific variants; application code wraps with
/// `anyhow::Context` for propagation. None of these terminate the cycle loop —
/// the orchestrator maps each to its local recovery path.
#[derive(Error, Debug)]
pub enum BotError {
    // -- Market data --------------------------------------------------------
    #[error("market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    // -- Oracle -------------------------------------------------------------
    #[error("oracle unavailable: {reason}")]
    OracleUnavailable { reason: String },

    #[error("oracle response malformed: {reason}")]
    OracleMalformed { reason: String },

    // -- Persistence --------------------------------------------------------
    #[error("persistence sink write failed ({file}): {reason}")]
    PersistenceFailure { file: String, reason: String },

    // -- Configuration ------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),
}
