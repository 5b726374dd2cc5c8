//! Append-only CSV persistence sink.
//!
//! One file per record family under the configured data dir:
//!   - `portfolio_state.csv`   — balance/equity/return, one row per cycle
//!   - `trade_history.csv`     — every settlement (opens and closes)
//!   - `ai_decisions.csv`      — every oracle decision as received
//!   - `market_snapshots.csv`  — per-symbol snapshot rows, per cycle
//!   - `active_positions.csv`  — open book, one row per position per cycle
//!
//! Writes are best-effort durability, not a transaction boundary: a failed
//! append is logged by the caller and never rolls back the in-memory ledger.
//! Each append opens, writes, and flushes in one call, so readers never see a
//! torn row.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::ledger::Ledger;
use crate::errors::BotError;
use crate::types::{MarketSnapshot, RawDecision, TradeRecord};

const PORTFOLIO_STATE_FILE: &str = "portfolio_state.csv";
const TRADE_HISTORY_FILE: &str = "trade_history.csv";
const DECISIONS_FILE: &str = "ai_decisions.csv";
const SNAPSHOTS_FILE: &str = "market_snapshots.csv";
const ACTIVE_POSITIONS_FILE: &str = "active_positions.csv";

#[derive(Debug, Serialize)]
struct StateRow {
    timestamp: DateTime<Utc>,
    balance: Decimal,
    total_equity: Decimal,
    return_pct: Decimal,
}

#[derive(Debug, Serialize)]
struct DecisionRow<'a> {
    timestamp: DateTime<Utc>,
    symbol: &'a str,
    action: &'a str,
    side: &'a str,
    quantity: Option<f64>,
    stop_loss: Option<f64>,
    profit_target: Option<f64>,
    leverage: Option<f64>,
    reasoning: &'a str,
}

#[derive(Debug, Serialize)]
struct SnapshotRow<'a> {
    timestamp: DateTime<Utc>,
    symbol: &'a str,
    price: Decimal,
    ema20: Decimal,
    rsi: Decimal,
    macd: Decimal,
    macd_signal: Decimal,
    funding_rate: Decimal,
}

#[derive(Debug, Serialize)]
struct ActivePositionRow<'a> {
    timestamp: DateTime<Utc>,
    symbol: &'a str,
    side: &'a str,
    quantity: Decimal,
    entry_price: Decimal,
    current_price: Decimal,
    stop_loss: Decimal,
    profit_target: Decimal,
    leverage: Decimal,
    margin: Decimal,
    unrealized_pnl: Decimal,
}

pub struct CsvSink {
    data_dir: PathBuf,
}

impl CsvSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, BotError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| BotError::PersistenceFailure {
            file: data_dir.display().to_string(),
            reason: format!("create data dir: {e}"),
        })?;
        Ok(Self { data_dir })
    }

    /// Append one serializable row; the header is written only when the file
    /// is first created.
    fn append<T: Serialize>(&self, filename: &str, row: &T) -> Result<(), BotError> {
        let path = self.data_dir.join(filename);
        let write_header = !path.exists();

        let fail = |reason: String| BotError::PersistenceFailure {
            file: filename.to_string(),
            reason,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| fail(format!("open: {e}")))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer
            .serialize(row)
            .map_err(|e| fail(format!("serialize: {e}")))?;
        writer.flush().map_err(|e| fail(format!("flush: {e}")))?;
        Ok(())
    }

    pub fn record_state(
        &self,
        ledger: &Ledger,
        prices: &BTreeMap<String, Decimal>,
    ) -> Result<(), BotError> {
        self.append(
            PORTFOLIO_STATE_FILE,
            &StateRow {
                timestamp: Utc::now(),
                balance: ledger.balance(),
                total_equity: ledger.total_equity(prices),
                return_pct: ledger.return_pct(prices),
            },
        )
    }

    pub fn record_trade(&self, record: &TradeRecord) -> Result<(), BotError> {
        self.append(TRADE_HISTORY_FILE, record)
    }

    pub fn record_decisions(
        &self,
        decisions: &BTreeMap<String, RawDecision>,
    ) -> Result<(), BotError> {
        let timestamp = Utc::now();
        for (symbol, decision) in decisions {
            self.append(
                DECISIONS_FILE,
                &DecisionRow {
                    timestamp,
                    symbol,
                    action: decision.action.as_deref().unwrap_or(""),
                    side: decision.side.as_deref().unwrap_or(""),
                    quantity: decision.quantity,
                    stop_loss: decision.stop_loss,
                    profit_target: decision.profit_target,
                    leverage: decision.leverage,
                    reasoning: decision.reasoning.as_deref().unwrap_or(""),
                },
            )?;
        }
        Ok(())
    }

    pub fn record_snapshots(&self, snapshots: &[MarketSnapshot]) -> Result<(), BotError> {
        let timestamp = Utc::now();
        for snapshot in snapshots {
            self.append(
                SNAPSHOTS_FILE,
                &SnapshotRow {
                    timestamp,
                    symbol: &snapshot.symbol,
                    price: snapshot.price,
                    ema20: snapshot.ema20,
                    rsi: snapshot.rsi,
                    macd: snapshot.macd,
                    macd_signal: snapshot.macd_signal,
                    funding_rate: snapshot.funding_rate,
                },
            )?;
        }
        Ok(())
    }

    pub fn record_active_positions(
        &self,
        ledger: &Ledger,
        prices: &BTreeMap<String, Decimal>,
    ) -> Result<(), BotError> {
        let timestamp = Utc::now();
        for (symbol, pos) in ledger.positions() {
            let current_price = prices.get(symbol).copied().unwrap_or(pos.entry_price);
            self.append(
                ACTIVE_POSITIONS_FILE,
                &ActivePositionRow {
                    timestamp,
                    symbol,
                    side: pos.side.as_str(),
                    quantity: pos.quantity,
                    entry_price: pos.entry_price,
                    current_price,
                    stop_loss: pos.stop_loss,
                    profit_target: pos.profit_target,
                    leverage: pos.leverage,
                    margin: pos.margin,
                    unrealized_pnl: pos.unrealized_pnl(current_price),
                },
            )?;
        }
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
