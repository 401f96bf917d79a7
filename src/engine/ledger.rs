//! Profit ledger. Append-only record of completed triangles for one pass.

use rust_decimal::Decimal;

use crate::types::{PassResult, PassStatus, TradeResult};

#[derive(Debug, Default)]
pub struct ProfitLedger {
    trades: Vec<TradeResult>,
}

impl ProfitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: TradeResult) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[TradeResult] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn total_profit(&self) -> Decimal {
        self.trades.iter().map(|t| t.realized_profit).sum()
    }

    /// Close the ledger into the pass summary. A pass always reports success;
    /// per-symbol failures are reported as they happen.
    pub fn into_result(self) -> PassResult {
        PassResult {
            trades: self.trades,
            status: PassStatus::Success,
        }
    }
}
