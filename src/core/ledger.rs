//! Authoritative trading ledger: balance, open positions, trade history.
//!
//! The ledger is an explicitly owned aggregate — constructed once per run and
//! passed by reference to the risk engine and executor. Balance is only ever
//! debited/credited inside [`Ledger::open_position`] and
//! [`Ledger::close_position`]; the trade history is append-only.
//!
//! Settlement model (symmetric taker fee on entry and exit):
//! - open:  `balance -= margin + entry_fees`, position inserted, an "open"
//!   record with pnl = 0 appended as a marker row.
//! - close: `net_pnl = unrealized - entry_fees - exit_fees`,
//!   `balance += margin + net_pnl`, position removed, a "close" record
//!   carrying `net_pnl` appended.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info};

use crate::types::{Position, TradeAction, TradeRecord};

pub struct Ledger {
    initial_balance: Decimal,
    balance: Decimal,
    /// symbol → open position. BTreeMap for deterministic iteration order.
    positions: BTreeMap<String, Position>,
    /// Append-only; never mutated after append.
    trade_history: Vec<TradeRecord>,
    taker_fee_rate: Decimal,
}

impl Ledger {
    pub fn new(initial_balance: Decimal, taker_fee_rate: Decimal) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            positions: BTreeMap::new(),
            trade_history: Vec::new(),
            taker_fee_rate,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    pub fn taker_fee_rate(&self) -> Decimal {
        self.taker_fee_rate
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn trade_history(&self) -> &[TradeRecord] {
        &self.trade_history
    }

    // -----------------------------------------------------------------------
    // Valuation
    // -----------------------------------------------------------------------

    /// Mark-to-market P&L for one symbol. Zero if no position is open.
    pub fn unrealized_pnl(&self, symbol: &str, current_price: Decimal) -> Decimal {
        self.positions
            .get(symbol)
            .map(|pos| pos.unrealized_pnl(current_price))
            .unwrap_or(Decimal::ZERO)
    }

    /// Total equity: balance plus unrealized P&L across open positions.
    ///
    /// Falls back to the entry price for symbols missing from `prices`, so a
    /// partial price feed never distorts equity (missing data values the
    /// position flat).
    pub fn total_equity(&self, prices: &BTreeMap<String, Decimal>) -> Decimal {
        let mut equity = self.balance;
        for (symbol, pos) in &self.positions {
            let price = prices.get(symbol).copied().unwrap_or(pos.entry_price);
            equity += pos.unrealized_pnl(price);
        }
        equity
    }

    /// Return since inception, percent of initial balance.
    pub fn return_pct(&self, prices: &BTreeMap<String, Decimal>) -> Decimal {
        if self.initial_balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.total_equity(prices) - self.initial_balance) / self.initial_balance) * dec!(100)
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Open a new position. Debits `margin + fees_paid` from the balance and
    /// appends an "open" marker record with pnl = 0.
    ///
    /// Returns `false` (no-op) if a position already exists for the symbol.
    /// The validator makes this unreachable; the re-check here is the
    /// last-line invariant guard, and tripping it indicates a validator bug.
    pub fn open_position(&mut self, position: Position, reason: &str) -> bool {
        if self.positions.contains_key(&position.symbol) {
            error!(
                symbol = %position.symbol,
                "invariant guard tripped: open_position on symbol with existing position"
            );
            return false;
        }

        self.balance -= position.margin + position.fees_paid;

        self.trade_history.push(TradeRecord {
            timestamp: Utc::now(),
            symbol: position.symbol.clone(),
            action: TradeAction::Open,
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price: Decimal::ZERO,
            pnl: Decimal::ZERO,
            reason: reason.to_string(),
        });

        info!(
            symbol = %position.symbol,
            side = position.side.as_str(),
            quantity = %position.quantity,
            entry_price = %position.entry_price,
            stop_loss = %position.stop_loss,
            profit_target = %position.profit_target,
            leverage = %position.leverage,
            margin = %position.margin,
            balance = %self.balance,
            "position opened"
        );

        self.positions.insert(position.symbol.clone(), position);
        true
    }

    /// Close an existing position at `exit_price`, settling fees and P&L.
    /// Credits `margin + net_pnl` back to the balance.
    ///
    /// Returns `None` (no-op) if no position exists for the symbol — the
    /// single close path shared by protective exits and oracle-driven closes.
    pub fn close_position(
        &mut self,
        symbol: &str,
        exit_price: Decimal,
        reason: &str,
    ) -> Option<TradeRecord> {
        let pos = match self.positions.remove(symbol) {
            Some(p) => p,
            None => {
                error!(
                    symbol,
                    "invariant guard tripped: close_position on symbol with no position"
                );
                return None;
            }
        };

        let unrealized = pos.unrealized_pnl(exit_price);
        let exit_fees = pos.quantity * exit_price * self.taker_fee_rate;
        let net_pnl = unrealized - pos.fees_paid - exit_fees;

        self.balance += pos.margin + net_pnl;

        let record = TradeRecord {
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            action: TradeAction::Close,
            side: pos.side,
            quantity: pos.quantity,
            entry_price: pos.entry_price,
            exit_price,
            pnl: net_pnl,
            reason: reason.to_string(),
        };
        self.trade_history.push(record.clone());

        info!(
            symbol,
            side = pos.side.as_str(),
            exit_price = %exit_price,
            net_pnl = %net_pnl,
            balance = %self.balance,
            reason,
            "position closed"
        );

        Some(record)
    }
}
