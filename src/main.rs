//! TRIARB: triangular arbitrage engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects to the configured venue, and runs a single scan pass over
//! every triangle-eligible symbol.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use triarb::config::AppConfig;
use triarb::engine::reporter::TracingReporter;
use triarb::engine::scanner::{ScanSettings, Scanner};
use triarb::exchanges;
use triarb::storage;
use triarb::strategy::ProfitEvaluator;

const BANNER: &str = r#"
 _____ ____  ___    _    ____  ____
|_   _|  _ \|_ _|  / \  |  _ \| __ )
  | | | |_) || |  / _ \ | |_) |  _ \
  | | |  _ < | | / ___ \|  _ <| |_) |
  |_| |_| \_\___/_/   \_\_| \_\____/

  Triangular Arbitrage Engine v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let mut cfg = AppConfig::load(&config_path)?;
    cfg.apply_env_overrides()?;
    cfg.validate().context("Invalid configuration")?;

    init_logging();

    println!("{BANNER}");
    info!(
        venue = %cfg.venue.name,
        bridge = %cfg.triangle.bridge_asset,
        settlement = %cfg.triangle.settlement_asset,
        principal = cfg.strategy.principal,
        margin = cfg.strategy.profit_margin,
        dry_run = cfg.venue.dry_run,
        "TRIARB starting up"
    );

    // -- Initialise components -------------------------------------------

    let exchange = exchanges::connect(
        &cfg.venue,
        cfg.credentials()?,
        &cfg.triangle.settlement_asset,
    )?;

    let evaluator = ProfitEvaluator::new(cfg.principal()?, cfg.profit_threshold()?);
    let settings = ScanSettings::new(
        &cfg.triangle.bridge_asset,
        &cfg.triangle.settlement_asset,
        &cfg.scan,
    );
    let reporter = TracingReporter;
    let scanner = Scanner::new(exchange.as_ref(), evaluator, settings, &reporter);

    // -- Single pass -----------------------------------------------------

    let outcome = tokio::select! {
        outcome = scanner.run_pass() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    if let Err(e) = exchange.close().await {
        warn!(error = %e, "Failed to close venue client");
    }

    let result = match outcome {
        Some(Ok(result)) => result,
        Some(Err(e)) => {
            error!(error = %e, "Scan pass aborted");
            return Err(e.into());
        }
        None => {
            warn!("Shutdown signal received, pass interrupted");
            return Ok(());
        }
    };

    if let Some(path) = cfg.output.result_path.as_deref() {
        if let Err(e) = storage::save_pass_result(&result, path) {
            error!(error = %e, "Failed to save pass result");
        }
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("triarb=info"));

    let json_logging = std::env::var("TRIARB_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
