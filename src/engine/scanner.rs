//! Scan loop.
//!
//! One pass over every triangle-eligible symbol: fetch a ticker snapshot,
//! price both directions, and execute each direction that clears the
//! threshold using the live settlement-asset balance.
//!
//! Symbols are processed strictly one at a time. The settlement balance is
//! re-read before every execution and spent in full, so running symbols
//! concurrently would race on the same funds.
//!
//! Failures are contained per symbol: the error is reported, the loop
//! cools down, and the next symbol is processed. Only a catalog failure
//! aborts the pass.

use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::engine::discovery::discover_bases;
use crate::engine::executor::ExecutionEngine;
use crate::engine::ledger::ProfitLedger;
use crate::engine::reporter::ScanReporter;
use crate::exchanges::Exchange;
use crate::strategy::ProfitEvaluator;
use crate::types::{ArbError, PassResult, TickerSnapshot, Triangle};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub bridge_asset: String,
    pub settlement_asset: String,
    /// Pause after every this many symbols, whatever their outcome.
    pub throttle_every: usize,
    pub throttle_pause: Duration,
    /// Pause after a failed symbol.
    pub error_cooldown: Duration,
}

impl ScanSettings {
    pub fn new(bridge_asset: &str, settlement_asset: &str, scan: &ScanConfig) -> Self {
        Self {
            bridge_asset: bridge_asset.to_string(),
            settlement_asset: settlement_asset.to_string(),
            throttle_every: scan.throttle_every.max(1),
            throttle_pause: scan.throttle_pause(),
            error_cooldown: scan.error_cooldown(),
        }
    }
}

/// Per-pass counters. Discarded when the pass ends.
#[derive(Debug, Default, Clone, Copy)]
struct ScanState {
    processed: usize,
    failed: usize,
}

impl ScanState {
    fn symbol_done(&mut self, ok: bool) {
        self.processed += 1;
        if !ok {
            self.failed += 1;
        }
    }

    fn should_throttle(&self, every: usize) -> bool {
        every > 0 && self.processed % every == 0
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

pub struct Scanner<'a> {
    exchange: &'a dyn Exchange,
    evaluator: ProfitEvaluator,
    settings: ScanSettings,
    reporter: &'a dyn ScanReporter,
}

impl<'a> Scanner<'a> {
    pub fn new(
        exchange: &'a dyn Exchange,
        evaluator: ProfitEvaluator,
        settings: ScanSettings,
        reporter: &'a dyn ScanReporter,
    ) -> Self {
        Self {
            exchange,
            evaluator,
            settings,
            reporter,
        }
    }

    /// Run one full pass. Errors only when the market catalog cannot be
    /// loaded; per-symbol failures never escape.
    pub async fn run_pass(&self) -> Result<PassResult, ArbError> {
        self.reporter
            .pass_started(self.exchange.name(), self.evaluator.threshold());

        let markets = self
            .exchange
            .load_markets()
            .await
            .map_err(|e| ArbError::Catalog(format!("{e:#}")))?;

        let symbols = discover_bases(
            &markets,
            &self.settings.bridge_asset,
            &self.settings.settlement_asset,
        );
        self.reporter.symbols_discovered(symbols.len());

        let mut ledger = ProfitLedger::new();
        let mut state = ScanState::default();

        for symbol in &symbols {
            let outcome = self.process_symbol(symbol, &mut ledger).await;
            state.symbol_done(outcome.is_ok());

            if let Err(err) = outcome {
                self.reporter.symbol_failed(symbol, &err);
                pause(self.settings.error_cooldown).await;
            }

            if state.should_throttle(self.settings.throttle_every) {
                debug!(processed = state.processed, "Throttling");
                pause(self.settings.throttle_pause).await;
            }
        }

        info!(
            processed = state.processed,
            failed = state.failed,
            trades = ledger.len(),
            "All symbols processed"
        );

        let result = ledger.into_result();
        self.reporter.pass_completed(&result);
        Ok(result)
    }

    /// Evaluate one triangle and execute every actionable direction.
    /// Trades completed before a later failure stay in the ledger.
    async fn process_symbol(&self, base: &str, ledger: &mut ProfitLedger) -> Result<(), ArbError> {
        let triangle = Triangle::new(
            base,
            self.settings.bridge_asset.as_str(),
            self.settings.settlement_asset.as_str(),
        );

        let snapshot = self.fetch_snapshot(&triangle).await?;
        let evaluation = self.evaluator.evaluate(&triangle, &snapshot)?;
        for opportunity in evaluation.opportunities() {
            self.reporter.opportunity_evaluated(opportunity);
        }

        let engine = ExecutionEngine::new(self.exchange);
        for opportunity in evaluation.opportunities() {
            if !self.evaluator.is_actionable(opportunity) {
                continue;
            }

            let balance = self.settlement_balance().await?;
            self.reporter
                .execution_started(&triangle, opportunity.direction, balance);

            let trade = engine
                .execute(&triangle, opportunity.direction, balance)
                .await?;
            self.reporter.trade_completed(&trade);
            ledger.record(trade);
        }
        Ok(())
    }

    async fn fetch_snapshot(&self, triangle: &Triangle) -> Result<TickerSnapshot, ArbError> {
        Ok(TickerSnapshot {
            base_quote: self.last_price(&triangle.base_quote()).await?,
            bridge_quote: self.last_price(&triangle.bridge_quote()).await?,
            base_bridge: self.last_price(&triangle.base_bridge()).await?,
        })
    }

    async fn last_price(&self, pair: &str) -> Result<Option<Decimal>, ArbError> {
        let ticker = self
            .exchange
            .fetch_ticker(pair)
            .await
            .map_err(|e| ArbError::transport(format!("fetch_ticker {pair}"), &e))?;
        Ok(ticker.last)
    }

    /// Free balance of the settlement asset. An absent entry counts as zero.
    async fn settlement_balance(&self) -> Result<Decimal, ArbError> {
        let balances = self
            .exchange
            .fetch_balance()
            .await
            .map_err(|e| ArbError::transport("fetch_balance", &e))?;
        Ok(balances
            .get(&self.settings.settlement_asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO))
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
