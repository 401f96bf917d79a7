//! Paper trading venue.
//!
//! Wraps a live client for the market catalog and tickers, and simulates
//! market orders against an in-memory balance book. Fills happen at the
//! last trade price with a proportional fee charged in the received asset.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

use super::Exchange;
use crate::types::{split_pair, Balance, MarketInfo, OrderFill, Ticker};

pub struct PaperExchange {
    inner: Box<dyn Exchange>,
    name: String,
    fee_rate: Decimal,
    balances: Mutex<HashMap<String, Decimal>>,
}

impl PaperExchange {
    pub fn new(inner: Box<dyn Exchange>, fee_rate: Decimal) -> Self {
        let name = format!("paper:{}", inner.name());
        Self {
            inner,
            name,
            fee_rate,
            balances: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the simulated balance of one asset.
    pub fn with_balance(self, asset: &str, amount: Decimal) -> Self {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(asset.to_string(), amount);
        }
        self
    }

    async fn last_price(&self, pair: &str) -> Result<Decimal> {
        let ticker = self.inner.fetch_ticker(pair).await?;
        match ticker.last {
            Some(price) if price > Decimal::ZERO => Ok(price),
            _ => bail!("No usable last price for {pair}"),
        }
    }

    /// Move `spent` of one asset into `received` (net of fee) of another.
    fn settle(&self, spend: (&str, Decimal), receive: (&str, Decimal)) -> Result<()> {
        let mut balances = self
            .balances
            .lock()
            .map_err(|_| anyhow!("Paper balance book lock poisoned"))?;

        let (spend_asset, spend_amount) = spend;
        let available = balances.get(spend_asset).copied().unwrap_or(Decimal::ZERO);
        if spend_amount > available {
            bail!("Insufficient paper {spend_asset} balance: need {spend_amount}, have {available}");
        }
        balances.insert(spend_asset.to_string(), available - spend_amount);

        let (receive_asset, receive_amount) = receive;
        *balances.entry(receive_asset.to_string()).or_insert(Decimal::ZERO) += receive_amount;
        Ok(())
    }

    fn order_id() -> String {
        format!("paper-{}", uuid::Uuid::new_v4())
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn load_markets(&self) -> Result<HashMap<String, MarketInfo>> {
        self.inner.load_markets().await
    }

    async fn fetch_ticker(&self, pair: &str) -> Result<Ticker> {
        self.inner.fetch_ticker(pair).await
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, Balance>> {
        let balances = self
            .balances
            .lock()
            .map_err(|_| anyhow!("Paper balance book lock poisoned"))?;
        Ok(balances
            .iter()
            .map(|(asset, free)| {
                (
                    asset.clone(),
                    Balance {
                        free: *free,
                        locked: Decimal::ZERO,
                    },
                )
            })
            .collect())
    }

    async fn create_market_buy_by_cost(&self, pair: &str, cost: Decimal) -> Result<OrderFill> {
        let (base, quote) = split_pair(pair).with_context(|| format!("Malformed pair id: {pair}"))?;
        let price = self.last_price(pair).await?;
        let amount = cost / price;
        let fee = amount * self.fee_rate;
        self.settle((quote, cost), (base, amount - fee))?;

        let fill = OrderFill {
            order_id: Self::order_id(),
            pair: pair.to_string(),
            amount,
            cost,
            fees: vec![fee],
        };
        info!(pair, price = %price, amount = %amount, cost = %cost, "[DRY RUN] Simulated market buy");
        Ok(fill)
    }

    async fn create_market_sell_by_amount(&self, pair: &str, amount: Decimal) -> Result<OrderFill> {
        let (base, quote) = split_pair(pair).with_context(|| format!("Malformed pair id: {pair}"))?;
        let price = self.last_price(pair).await?;
        let cost = amount * price;
        let fee = cost * self.fee_rate;
        self.settle((base, amount), (quote, cost - fee))?;

        let fill = OrderFill {
            order_id: Self::order_id(),
            pair: pair.to_string(),
            amount,
            cost,
            fees: vec![fee],
        };
        info!(pair, price = %price, amount = %amount, cost = %cost, "[DRY RUN] Simulated market sell");
        Ok(fill)
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
