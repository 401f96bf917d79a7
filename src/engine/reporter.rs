//! Scan observers.
//!
//! The scan loop reports progress through an injected `ScanReporter`
//! rather than logging directly, so callers decide where events go.
//! `TracingReporter` forwards everything to `tracing`.

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::types::{ArbError, Direction, Opportunity, PassResult, TradeResult, Triangle};

/// Receives scan-pass events. All methods default to no-ops.
pub trait ScanReporter: Send + Sync {
    fn pass_started(&self, _venue: &str, _threshold: Decimal) {}

    fn symbols_discovered(&self, _count: usize) {}

    fn opportunity_evaluated(&self, _opportunity: &Opportunity) {}

    fn execution_started(&self, _triangle: &Triangle, _direction: Direction, _balance: Decimal) {}

    fn trade_completed(&self, _trade: &TradeResult) {}

    fn symbol_failed(&self, _symbol: &str, _error: &ArbError) {}

    fn pass_completed(&self, _result: &PassResult) {}
}

/// Default reporter writing structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ScanReporter for TracingReporter {
    fn pass_started(&self, venue: &str, threshold: Decimal) {
        info!(venue, threshold = %threshold.round_dp(2), "Scan pass starting");
    }

    fn symbols_discovered(&self, count: usize) {
        if count == 0 {
            warn!("No triangle-eligible symbols found");
        } else {
            info!(count, "Triangle-eligible symbols found");
        }
    }

    fn opportunity_evaluated(&self, opportunity: &Opportunity) {
        info!(
            base = %opportunity.triangle.base,
            direction = %opportunity.direction,
            route = %opportunity.direction.describe(&opportunity.triangle),
            expected = %opportunity.expected_profit.round_dp(2),
            "Opportunity evaluated"
        );
    }

    fn execution_started(&self, triangle: &Triangle, direction: Direction, balance: Decimal) {
        info!(
            base = %triangle.base,
            route = %direction.describe(triangle),
            balance = %balance.round_dp(2),
            asset = %triangle.quote,
            "Executing triangle"
        );
    }

    fn trade_completed(&self, trade: &TradeResult) {
        info!(
            base = %trade.base,
            direction = %trade.direction,
            trace = %trade.trace.join(" -> "),
            profit = %trade.realized_profit.round_dp(2),
            "Triangle completed"
        );
    }

    fn symbol_failed(&self, symbol: &str, error: &ArbError) {
        if error.needs_operator() {
            error!(symbol, error = %error, "Triangle left open, manual intervention required");
        } else {
            warn!(symbol, error = %error, "Symbol skipped");
        }
    }

    fn pass_completed(&self, result: &PassResult) {
        info!(
            trades = result.trades.len(),
            profit = %result.total_profit().round_dp(2),
            status = ?result.status,
            "Scan pass complete"
        );
    }
}
