//! Shared types for the TRIARB engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that exchange, strategy,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Triangle
// ---------------------------------------------------------------------------

/// Three assets linked by three spot markets: BASE/QUOTE, BASE/BRIDGE and
/// BRIDGE/QUOTE.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub base: String,
    /// The venue's designated intermediate hop (e.g. BTC).
    pub bridge: String,
    /// The settlement asset principal and profit are denominated in (e.g. USDT).
    pub quote: String,
}

impl Triangle {
    pub fn new(base: impl Into<String>, bridge: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            bridge: bridge.into(),
            quote: quote.into(),
        }
    }

    pub fn base_quote(&self) -> String {
        pair_id(&self.base, &self.quote)
    }

    pub fn base_bridge(&self) -> String {
        pair_id(&self.base, &self.bridge)
    }

    pub fn bridge_quote(&self) -> String {
        pair_id(&self.bridge, &self.quote)
    }
}

impl fmt::Display for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.base, self.bridge, self.quote)
    }
}

/// Unified pair identifier, `BASE/QUOTE`.
pub fn pair_id(base: &str, quote: &str) -> String {
    format!("{base}/{quote}")
}

/// Split a unified pair identifier back into `(base, quote)`.
pub fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let (base, quote) = pair.split_once('/')?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Last-trade prices for the three markets of a triangle.
///
/// The three prices are fetched independently and are not atomic;
/// a missing price is kept as `None` and rejected by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub base_quote: Option<Decimal>,
    pub bridge_quote: Option<Decimal>,
    pub base_bridge: Option<Decimal>,
}

impl TickerSnapshot {
    pub fn new(base_quote: Decimal, bridge_quote: Decimal, base_bridge: Decimal) -> Self {
        Self {
            base_quote: Some(base_quote),
            bridge_quote: Some(bridge_quote),
            base_bridge: Some(base_bridge),
        }
    }
}

/// One entry of the venue's market catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub base: String,
    pub quote: String,
    pub active: bool,
    pub spot: bool,
    /// Quantity increment for sell orders, when the venue publishes one.
    #[serde(default)]
    pub amount_step: Option<Decimal>,
}

/// Latest ticker for a single pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: String,
    pub last: Option<Decimal>,
}

/// Free and locked balance of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub free: Decimal,
    pub locked: Decimal,
}

/// Venue acknowledgement of a filled market order.
///
/// `amount` is always in the pair's base asset and `cost` in its quote asset.
/// `fees` lists every fee charged on the fill, in the asset received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    pub pair: String,
    pub amount: Decimal,
    pub cost: Decimal,
    pub fees: Vec<Decimal>,
}

impl OrderFill {
    pub fn total_fee(&self) -> Decimal {
        self.fees.iter().copied().sum()
    }
}

// ---------------------------------------------------------------------------
// Opportunities and trades
// ---------------------------------------------------------------------------

/// Trading direction around the triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// QUOTE → BASE → BRIDGE → QUOTE
    Forward,
    /// QUOTE → BRIDGE → BASE → QUOTE
    Reverse,
}

impl Direction {
    /// Assets visited, starting and ending at the settlement asset.
    pub fn route<'a>(&self, triangle: &'a Triangle) -> [&'a str; 4] {
        match self {
            Direction::Forward => [
                triangle.quote.as_str(),
                triangle.base.as_str(),
                triangle.bridge.as_str(),
                triangle.quote.as_str(),
            ],
            Direction::Reverse => [
                triangle.quote.as_str(),
                triangle.bridge.as_str(),
                triangle.base.as_str(),
                triangle.quote.as_str(),
            ],
        }
    }

    /// Human-readable route, e.g. `USDT => ETH => BTC => USDT`.
    pub fn describe(&self, triangle: &Triangle) -> String {
        self.route(triangle).join(" => ")
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Expected outcome of one direction, computed from a single snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub triangle: Triangle,
    pub direction: Direction,
    /// Signed, in settlement-asset units.
    pub expected_profit: Decimal,
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \t Expected {:.2}",
            self.direction.describe(&self.triangle),
            self.expected_profit,
        )
    }
}

/// Outcome of one market order within a triangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegResult {
    pub pair: String,
    pub filled_amount: Decimal,
    pub fee_cost: Decimal,
    /// Amount of the received asset available for the next leg, net of fees.
    pub proceeds: Decimal,
}

/// A completed triangle. Immutable once recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub base: String,
    pub direction: Direction,
    /// Settlement-asset amount committed to leg 1.
    pub invested: Decimal,
    /// Settlement-asset amount received from leg 3.
    pub returned: Decimal,
    pub realized_profit: Decimal,
    /// Pairs traversed, in execution order.
    pub trace: Vec<String>,
    pub legs: Vec<LegResult>,
    pub completed_at: DateTime<Utc>,
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} via {} \t Profit {:.2}",
            self.direction,
            self.base,
            self.trace.join(" -> "),
            self.realized_profit,
        )
    }
}

// ---------------------------------------------------------------------------
// Pass result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Success,
}

/// Summary emitted at the end of a scan pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassResult {
    pub trades: Vec<TradeResult>,
    pub status: PassStatus,
}

impl PassResult {
    pub fn total_profit(&self) -> Decimal {
        self.trades.iter().map(|t| t.realized_profit).sum()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for TRIARB.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArbError {
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Venue call {operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error(
        "Partial execution of {direction} {base}: leg {failed_leg} failed, holding {held_amount} {held_asset}: {message}"
    )]
    PartialExecution {
        base: String,
        direction: Direction,
        failed_leg: u8,
        held_asset: String,
        held_amount: Decimal,
        message: String,
    },

    #[error("Insufficient {asset} balance: have {available}")]
    InsufficientBalance { asset: String, available: Decimal },

    #[error("Market catalog unavailable: {0}")]
    Catalog(String),
}

impl ArbError {
    pub fn transport(operation: impl Into<String>, err: &anyhow::Error) -> Self {
        ArbError::Transport {
            operation: operation.into(),
            message: format!("{err:#}"),
        }
    }

    /// Whether the error leaves funds parked in an intermediate asset.
    pub fn needs_operator(&self) -> bool {
        matches!(self, ArbError::PartialExecution { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
