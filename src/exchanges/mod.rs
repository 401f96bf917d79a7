//! Exchange integrations.
//!
//! Defines the `Exchange` capability trait consumed by the engine and a
//! config-driven factory returning one implementation per supported venue:
//! - Binance: live spot trading over the signed REST API
//! - Paper: simulated fills at live prices, wrapping any live venue

pub mod binance;
pub mod paper;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

use crate::config::{to_decimal, Credentials, VenueConfig};
use crate::types::{Balance, MarketInfo, OrderFill, Ticker};

/// Abstraction over spot exchanges.
///
/// Every call is a fallible network operation. Pair identifiers are unified
/// `BASE/QUOTE` strings; implementors translate them to venue symbols.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Load the full market catalog, keyed by unified pair id.
    async fn load_markets(&self) -> Result<HashMap<String, MarketInfo>>;

    /// Fetch the last-trade price for a pair.
    async fn fetch_ticker(&self, pair: &str) -> Result<Ticker>;

    /// Fetch balances for every asset held, keyed by asset symbol.
    async fn fetch_balance(&self) -> Result<HashMap<String, Balance>>;

    /// Market-buy the base asset of `pair`, spending `cost` of its quote asset.
    async fn create_market_buy_by_cost(&self, pair: &str, cost: Decimal) -> Result<OrderFill>;

    /// Market-sell `amount` of the base asset of `pair`.
    async fn create_market_sell_by_amount(&self, pair: &str, amount: Decimal) -> Result<OrderFill>;

    /// Release any held resources. Called once at the end of a pass.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Venue name for logging and identification.
    fn name(&self) -> &str;
}

/// Venues with a live client implementation.
pub const SUPPORTED_VENUES: &[&str] = &[binance::VENUE_NAME];

/// Build the client for the configured venue.
///
/// With `dry_run` enabled the live client only serves market data and
/// orders are simulated by [`paper::PaperExchange`], seeded with
/// `paper_balance` of the settlement asset.
pub fn connect(
    cfg: &VenueConfig,
    credentials: Credentials,
    settlement_asset: &str,
) -> Result<Box<dyn Exchange>> {
    let live: Box<dyn Exchange> = match cfg.name.as_str() {
        binance::VENUE_NAME => Box::new(binance::BinanceClient::new(
            credentials,
            cfg.base_url.clone(),
            cfg.timeout_secs,
        )?),
        other => bail!(
            "Unsupported venue '{other}' (supported: {})",
            SUPPORTED_VENUES.join(", ")
        ),
    };

    if !cfg.dry_run {
        info!(venue = live.name(), "Live trading enabled");
        return Ok(live);
    }

    let fee_rate = to_decimal(cfg.paper_fee_rate, "venue.paper_fee_rate")?;
    let balance = to_decimal(cfg.paper_balance, "venue.paper_balance")?;
    info!(
        venue = live.name(),
        fee_rate = %fee_rate,
        balance = %balance,
        "[DRY RUN] Orders will be simulated"
    );
    Ok(Box::new(
        paper::PaperExchange::new(live, fee_rate).with_balance(settlement_asset, balance),
    ))
}
