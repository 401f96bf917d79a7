//! Triangle executor.
//!
//! Drives the three market orders of one direction strictly in sequence.
//! Each leg is submitted only after the previous fill is confirmed and its
//! fee-adjusted proceeds are known. A failed leg is never retried and an
//! open triangle is never unwound automatically. Any failure after the
//! settlement balance has been spent surfaces as `PartialExecution`
//! carrying the asset and amount held.

use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, info};

use crate::exchanges::Exchange;
use crate::types::{ArbError, Direction, LegResult, OrderFill, TradeResult, Triangle};

// ---------------------------------------------------------------------------
// Leg planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// Spend a quote-asset amount to buy the pair's base asset.
    BuyByCost,
    /// Sell a base-asset amount for the pair's quote asset.
    SellByAmount,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::BuyByCost => write!(f, "BUY"),
            OrderKind::SellByAmount => write!(f, "SELL"),
        }
    }
}

/// One planned market order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegPlan {
    pub pair: String,
    pub kind: OrderKind,
    pub spends: String,
    pub receives: String,
}

impl LegPlan {
    fn buy(base: &str, quote: &str) -> Self {
        Self {
            pair: format!("{base}/{quote}"),
            kind: OrderKind::BuyByCost,
            spends: quote.to_string(),
            receives: base.to_string(),
        }
    }

    fn sell(base: &str, quote: &str) -> Self {
        Self {
            pair: format!("{base}/{quote}"),
            kind: OrderKind::SellByAmount,
            spends: base.to_string(),
            receives: quote.to_string(),
        }
    }
}

/// The three orders that close `triangle` in `direction`.
pub fn plan_legs(triangle: &Triangle, direction: Direction) -> [LegPlan; 3] {
    let (base, bridge, quote) = (&triangle.base, &triangle.bridge, &triangle.quote);
    match direction {
        Direction::Forward => [
            LegPlan::buy(base, quote),
            LegPlan::sell(base, bridge),
            LegPlan::sell(bridge, quote),
        ],
        Direction::Reverse => [
            LegPlan::buy(bridge, quote),
            LegPlan::buy(base, bridge),
            LegPlan::sell(base, quote),
        ],
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Progress of a single triangle execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Idle,
    Submitted(u8),
    Filled(u8),
    Completed,
    Failed(u8),
}

pub struct ExecutionEngine<'a> {
    exchange: &'a dyn Exchange,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(exchange: &'a dyn Exchange) -> Self {
        Self { exchange }
    }

    /// Run all three legs, starting from `balance` of the settlement asset.
    pub async fn execute(
        &self,
        triangle: &Triangle,
        direction: Direction,
        balance: Decimal,
    ) -> Result<TradeResult, ArbError> {
        if balance <= Decimal::ZERO {
            return Err(ArbError::InsufficientBalance {
                asset: triangle.quote.clone(),
                available: balance,
            });
        }

        let plan = plan_legs(triangle, direction);
        let mut stage = ExecutionStage::Idle;
        let mut held_asset = triangle.quote.clone();
        let mut held_amount = balance;
        let mut legs = Vec::with_capacity(plan.len());

        for (index, leg) in plan.iter().enumerate() {
            let number = index as u8 + 1;
            stage = advance(triangle, stage, ExecutionStage::Submitted(number));

            let outcome = match leg.kind {
                OrderKind::BuyByCost => {
                    self.exchange
                        .create_market_buy_by_cost(&leg.pair, held_amount)
                        .await
                }
                OrderKind::SellByAmount => {
                    self.exchange
                        .create_market_sell_by_amount(&leg.pair, held_amount)
                        .await
                }
            };

            let fill = match outcome {
                Ok(fill) => fill,
                Err(e) => {
                    advance(triangle, stage, ExecutionStage::Failed(number));
                    return Err(leg_failure(
                        triangle,
                        direction,
                        leg,
                        number,
                        &held_asset,
                        held_amount,
                        format!("{e:#}"),
                    ));
                }
            };

            // The order ran, so whatever it delivered is now the holding.
            let result = settle_leg(leg, &fill);
            if result.proceeds <= Decimal::ZERO {
                advance(triangle, stage, ExecutionStage::Failed(number));
                return Err(ArbError::PartialExecution {
                    base: triangle.base.clone(),
                    direction,
                    failed_leg: number,
                    held_asset: leg.receives.clone(),
                    held_amount: result.proceeds.max(Decimal::ZERO),
                    message: format!(
                        "{} {} filled but returned no usable {} (gross {}, fee {})",
                        leg.kind,
                        leg.pair,
                        leg.receives,
                        result.proceeds + result.fee_cost,
                        result.fee_cost
                    ),
                });
            }

            stage = advance(triangle, stage, ExecutionStage::Filled(number));
            held_asset = leg.receives.clone();
            held_amount = result.proceeds;
            legs.push(result);
        }
        advance(triangle, stage, ExecutionStage::Completed);

        let trade = TradeResult {
            base: triangle.base.clone(),
            direction,
            invested: balance,
            returned: held_amount,
            realized_profit: held_amount - balance,
            trace: plan.iter().map(|leg| leg.pair.clone()).collect(),
            legs,
            completed_at: Utc::now(),
        };

        info!(
            base = %trade.base,
            direction = %direction,
            invested = %trade.invested,
            returned = %trade.returned,
            profit = %trade.realized_profit,
            "Triangle closed"
        );
        Ok(trade)
    }
}

fn advance(triangle: &Triangle, from: ExecutionStage, to: ExecutionStage) -> ExecutionStage {
    debug!(triangle = %triangle, from = ?from, to = ?to, "Execution stage");
    to
}

/// Net the fill's fees out of what the leg delivered.
fn settle_leg(leg: &LegPlan, fill: &OrderFill) -> LegResult {
    let fee = fill.total_fee();
    let gross = match leg.kind {
        OrderKind::BuyByCost => fill.amount,
        OrderKind::SellByAmount => fill.cost,
    };
    LegResult {
        pair: leg.pair.clone(),
        filled_amount: fill.amount,
        fee_cost: fee,
        proceeds: gross - fee,
    }
}

/// An order that was rejected or never acknowledged. Nothing was spent on
/// this leg, so the holding is whatever the previous leg delivered.
fn leg_failure(
    triangle: &Triangle,
    direction: Direction,
    leg: &LegPlan,
    number: u8,
    held_asset: &str,
    held_amount: Decimal,
    message: String,
) -> ArbError {
    if number == 1 {
        return ArbError::Transport {
            operation: format!("leg 1 {} {}", leg.kind, leg.pair),
            message,
        };
    }
    ArbError::PartialExecution {
        base: triangle.base.clone(),
        direction,
        failed_leg: number,
        held_asset: held_asset.to_string(),
        held_amount,
        message,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
