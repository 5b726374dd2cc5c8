//! Cycle orchestrator.
//!
//! One cycle: fetch snapshots → sweep protective exits → consult the oracle
//! → validate and apply decisions → persist. The ledger is the source of
//! truth; persistence failures are logged and never unwind a mutation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RiskConfig, TradingConfig};
use crate::errors::BotError;
use crate::market::MarketDataService;
use crate::oracle::OracleClient;
use crate::persistence::CsvSink;
use crate::types::{MarketSnapshot, RawDecision};

use super::executor::{self, CycleOutcome};
use super::ledger::Ledger;
use super::risk;

/// Where the engine currently is inside a cycle. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FetchingSnapshots,
    EvaluatingRisk,
    ConsultingOracle,
    ApplyingDecisions,
    Persisting,
    ShuttingDown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingSnapshots => "fetching_snapshots",
            Self::EvaluatingRisk => "evaluating_risk",
            Self::ConsultingOracle => "consulting_oracle",
            Self::ApplyingDecisions => "applying_decisions",
            Self::Persisting => "persisting",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

/// What the pre-oracle half of a cycle hands to the post-oracle half.
struct CyclePrelude {
    /// Coin-keyed prices from this cycle's snapshots.
    prices: BTreeMap<String, Decimal>,
    protective_exits: usize,
}

pub struct TradingEngine {
    trading: TradingConfig,
    risk: RiskConfig,
    market: Arc<MarketDataService>,
    oracle: Arc<OracleClient>,
    ledger: Ledger,
    sink: CsvSink,
    shutdown: CancellationToken,
    phase: Phase,
}

impl TradingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trading: TradingConfig,
        risk: RiskConfig,
        market: Arc<MarketDataService>,
        oracle: Arc<OracleClient>,
        ledger: Ledger,
        sink: CsvSink,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            trading,
            risk,
            market,
            oracle,
            ledger,
            sink,
            shutdown,
            phase: Phase::Idle,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(phase = phase.as_str(), "phase transition");
        self.phase = phase;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Main loop: one cycle per `check_interval_seconds`, with a longer
    /// cooldown after a failed cycle so a broken upstream is not hammered.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let interval = Duration::from_secs(self.trading.check_interval_seconds);
        let cooldown = Duration::from_secs(self.trading.error_cooldown_seconds);

        info!(
            symbols = ?self.trading.symbols,
            interval_s = self.trading.check_interval_seconds,
            balance = %self.ledger.balance(),
            "trading engine started"
        );

        loop {
            let sleep = match self.run_cycle().await {
                Ok(()) => interval,
                Err(e) => {
                    error!(error = %e, cooldown_s = cooldown.as_secs(), "cycle failed");
                    cooldown
                }
            };
            self.set_phase(Phase::Idle);

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.set_phase(Phase::ShuttingDown);
                    info!("trading engine shutting down");
                    break;
                }
                _ = tokio::time::sleep(sleep) => {}
            }
        }

        // Final state row so the last balance survives the shutdown.
        self.persist_or_log(|sink, ledger| sink.record_state(ledger, &BTreeMap::new()));
        Ok(())
    }

    async fn run_cycle(&mut self) -> anyhow::Result<()> {
        self.set_phase(Phase::FetchingSnapshots);
        let snapshots = self.fetch_snapshots().await;
        let Some(prelude) = self.prepare_cycle(&snapshots) else {
            return Ok(());
        };

        self.set_phase(Phase::ConsultingOracle);
        let oracle_result = self
            .oracle
            .propose(&self.ledger, &prelude.prices, &snapshots, &self.risk)
            .await;

        self.settle_cycle(&prelude, oracle_result);
        Ok(())
    }

    /// Pre-oracle half of a cycle: persist snapshots, build the price map,
    /// sweep protective exits. An empty snapshot set returns `None` with the
    /// ledger untouched, and the cycle never reaches the oracle.
    fn prepare_cycle(&mut self, snapshots: &[MarketSnapshot]) -> Option<CyclePrelude> {
        if snapshots.is_empty() {
            warn!("no market snapshots available, skipping cycle");
            return None;
        }
        self.persist_or_log(|sink, _| sink.record_snapshots(snapshots));

        // Price map keyed by coin, matching position and decision keys.
        let prices: BTreeMap<String, Decimal> = snapshots
            .iter()
            .map(|s| (s.symbol.clone(), s.price))
            .collect();

        self.set_phase(Phase::EvaluatingRisk);
        let protective = risk::check_protective_exits(&mut self.ledger, &prices);
        for record in &protective {
            self.persist_or_log(|sink, _| sink.record_trade(record));
        }

        Some(CyclePrelude {
            prices,
            protective_exits: protective.len(),
        })
    }

    /// Post-oracle half: apply the decision batch and persist cycle state.
    /// An oracle error degrades to an empty decision set, so the cycle holds
    /// everything; protective exits already settled in [`Self::prepare_cycle`]
    /// stand either way.
    fn settle_cycle(
        &mut self,
        prelude: &CyclePrelude,
        oracle_result: Result<BTreeMap<String, RawDecision>, BotError>,
    ) -> CycleOutcome {
        let decisions: BTreeMap<String, RawDecision> = match oracle_result {
            Ok(d) => d
                .into_iter()
                .map(|(symbol, decision)| (coin(&symbol).to_string(), decision))
                .collect(),
            Err(e) => {
                warn!(error = %e, "oracle unavailable, holding all positions");
                BTreeMap::new()
            }
        };
        if !decisions.is_empty() {
            self.persist_or_log(|sink, _| sink.record_decisions(&decisions));
        }

        self.set_phase(Phase::ApplyingDecisions);
        let universe: Vec<String> = self
            .trading
            .symbols
            .iter()
            .map(|s| coin(s).to_string())
            .collect();
        let outcome = executor::apply_decisions(
            &decisions,
            &mut self.ledger,
            &prelude.prices,
            &self.risk,
            &universe,
        );
        for record in &outcome.executed {
            self.persist_or_log(|sink, _| sink.record_trade(record));
        }

        self.set_phase(Phase::Persisting);
        self.persist_or_log(|sink, ledger| sink.record_state(ledger, &prelude.prices));
        self.persist_or_log(|sink, ledger| {
            sink.record_active_positions(ledger, &prelude.prices)
        });

        info!(
            balance = %self.ledger.balance(),
            equity = %self.ledger.total_equity(&prelude.prices),
            return_pct = %self.ledger.return_pct(&prelude.prices),
            open_positions = self.ledger.open_position_count(),
            protective_exits = prelude.protective_exits,
            executed = outcome.executed.len(),
            rejected = outcome.rejections.len(),
            "cycle complete"
        );

        outcome
    }

    /// Fetch all symbol snapshots concurrently. A symbol that fails is
    /// dropped from this cycle; the rest proceed.
    async fn fetch_snapshots(&self) -> Vec<MarketSnapshot> {
        let fetches = self.trading.symbols.iter().map(|symbol| {
            let market = self.market.clone();
            async move { (symbol.clone(), market.fetch_snapshot(symbol).await) }
        });

        let mut snapshots = Vec::with_capacity(self.trading.symbols.len());
        for (symbol, result) in join_all(fetches).await {
            match result {
                Ok(mut snapshot) => {
                    // Normalize to the coin key used by the ledger and the
                    // oracle contract.
                    snapshot.symbol = coin(&snapshot.symbol).to_string();
                    snapshots.push(snapshot);
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "snapshot fetch failed"),
            }
        }
        snapshots
    }

    fn persist_or_log<F>(&self, write: F)
    where
        F: FnOnce(&CsvSink, &Ledger) -> Result<(), crate::errors::BotError>,
    {
        if let Err(e) = write(&self.sink, &self.ledger) {
            error!(error = %e, "persistence write failed, in-memory state unaffected");
        }
    }
}

/// Ledger-side asset key for an exchange symbol: `"BTCUSDT"` → `"BTC"`.
pub fn coin(symbol: &str) -> &str {
    symbol.strip_suffix("USDT").unwrap_or(symbol)
}
