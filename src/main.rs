use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use llm_trader::config;
use llm_trader::core::engine::TradingEngine;
use llm_trader::core::ledger::Ledger;
use llm_trader::logging;
use llm_trader::market::MarketDataService;
use llm_trader::oracle::OracleClient;
use llm_trader::persistence::CsvSink;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    // Determine config directory — default to `./config`.
    let config_dir = std::env::var("TRADER_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    // Load and validate configuration.
    let config = config::load_config(&config_dir)?;

    // Initialize tracing — hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    info!(
        symbols = ?config.trading.symbols,
        interval = %config.trading.interval,
        initial_balance = %config.trading.initial_balance,
        model = %config.oracle.model,
        "paper trader starting"
    );

    let api_key = std::env::var(&config.oracle.api_key_env)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| {
            format!(
                "oracle API key env var {} is not set",
                config.oracle.api_key_env
            )
        })?;

    // -----------------------------------------------------------------------
    // Component construction (dependency injection order)
    // -----------------------------------------------------------------------

    let market = Arc::new(
        MarketDataService::new(config.market.clone(), config.trading.interval.clone())
            .context("failed to initialize market data service")?,
    );

    let oracle = Arc::new(
        OracleClient::new(config.oracle.clone(), api_key)
            .context("failed to initialize oracle client")?,
    );

    let ledger = Ledger::new(config.trading.initial_balance, config.risk.taker_fee_rate);

    let sink =
        CsvSink::new(&config.trading.data_dir).context("failed to initialize CSV sink")?;

    let shutdown = CancellationToken::new();
    let mut engine = TradingEngine::new(
        config.trading.clone(),
        config.risk.clone(),
        market,
        oracle,
        ledger,
        sink,
        shutdown.clone(),
    );

    info!("all components initialized");

    let engine_handle = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            error!(error = %e, "trading engine exited with error");
        }
    });

    info!("engine running — press Ctrl+C to shutdown");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("shutdown signal received, stopping gracefully...");
    shutdown.cancel();

    if let Err(e) = engine_handle.await {
        error!(error = %e, "trading engine task panicked");
    }

    info!("shutdown complete");
    Ok(())
}
