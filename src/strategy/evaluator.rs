//! Round-trip profit model.
//!
//! Given one ticker snapshot, prices both directions around the triangle
//! for a notional principal in the settlement asset:
//!
//! - Forward (QUOTE → BASE → BRIDGE → QUOTE):
//!   `bridge_quote × base_bridge × principal / base_quote`
//! - Reverse (QUOTE → BRIDGE → BASE → QUOTE):
//!   `base_quote × principal / (bridge_quote × base_bridge)`
//!
//! Fees are not modeled here; the profit threshold absorbs them.

use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{ArbError, Direction, Opportunity, TickerSnapshot, Triangle};

/// Both directional opportunities for one snapshot.
///
/// Each direction is judged against the threshold on its own;
/// both may be actionable in the same iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub forward: Opportunity,
    pub reverse: Opportunity,
}

impl Evaluation {
    pub fn opportunities(&self) -> [&Opportunity; 2] {
        [&self.forward, &self.reverse]
    }
}

#[derive(Debug, Clone)]
pub struct ProfitEvaluator {
    principal: Decimal,
    threshold: Decimal,
}

impl ProfitEvaluator {
    /// `threshold` is an absolute settlement-asset amount.
    pub fn new(principal: Decimal, threshold: Decimal) -> Self {
        Self { principal, threshold }
    }

    /// Threshold derived as `margin × principal`.
    pub fn with_margin(principal: Decimal, margin: Decimal) -> Self {
        Self::new(principal, margin * principal)
    }

    pub fn principal(&self) -> Decimal {
        self.principal
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Price both directions. Fails with `DataUnavailable` when any price is
    /// missing or not strictly positive.
    pub fn evaluate(&self, triangle: &Triangle, snapshot: &TickerSnapshot) -> Result<Evaluation, ArbError> {
        let base_quote = require_price(triangle, &triangle.base_quote(), snapshot.base_quote)?;
        let bridge_quote = require_price(triangle, &triangle.bridge_quote(), snapshot.bridge_quote)?;
        let base_bridge = require_price(triangle, &triangle.base_bridge(), snapshot.base_bridge)?;

        let overflow = || ArbError::DataUnavailable {
            symbol: triangle.base.clone(),
            reason: "price product out of range".to_string(),
        };

        let cross = bridge_quote.checked_mul(base_bridge).ok_or_else(overflow)?;
        let forward_value = cross
            .checked_mul(self.principal)
            .and_then(|v| v.checked_div(base_quote))
            .ok_or_else(overflow)?;
        let reverse_value = base_quote
            .checked_mul(self.principal)
            .and_then(|v| v.checked_div(cross))
            .ok_or_else(overflow)?;

        let evaluation = Evaluation {
            forward: Opportunity {
                triangle: triangle.clone(),
                direction: Direction::Forward,
                expected_profit: forward_value - self.principal,
            },
            reverse: Opportunity {
                triangle: triangle.clone(),
                direction: Direction::Reverse,
                expected_profit: reverse_value - self.principal,
            },
        };

        debug!(
            triangle = %triangle,
            forward = %evaluation.forward.expected_profit.round_dp(4),
            reverse = %evaluation.reverse.expected_profit.round_dp(4),
            "Triangle evaluated"
        );
        Ok(evaluation)
    }

    /// Whether an opportunity clears the profit threshold (strictly).
    pub fn is_actionable(&self, opportunity: &Opportunity) -> bool {
        opportunity.expected_profit > self.threshold
    }
}

fn require_price(triangle: &Triangle, pair: &str, price: Option<Decimal>) -> Result<Decimal, ArbError> {
    match price {
        Some(p) if p > Decimal::ZERO => Ok(p),
        Some(p) => Err(ArbError::DataUnavailable {
            symbol: triangle.base.clone(),
            reason: format!("non-positive price {p} for {pair}"),
        }),
        None => Err(ArbError::DataUnavailable {
            symbol: triangle.base.clone(),
            reason: format!("missing price for {pair}"),
        }),
    }
}
