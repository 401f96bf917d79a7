//! Mock exchange for integration testing.
//!
//! Provides a deterministic `Exchange` implementation with a fixed catalog,
//! settable last prices, a fee-free balance book and per-pair forced
//! failures. Everything is in-memory.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use triarb::exchanges::Exchange;
use triarb::types::*;

pub const BRIDGE: &str = "BTC";
pub const QUOTE: &str = "USDT";

/// A mock spot venue for deterministic testing.
///
/// Orders fill at the current last price with no fees. All state is
/// shared behind `Arc<Mutex<_>>` so tests can inspect it after a pass.
#[derive(Clone)]
pub struct MockExchange {
    markets: Arc<Mutex<HashMap<String, MarketInfo>>>,
    prices: Arc<Mutex<HashMap<String, Decimal>>>,
    balances: Arc<Mutex<HashMap<String, Decimal>>>,
    failing_tickers: Arc<Mutex<HashSet<String>>>,
    failing_orders: Arc<Mutex<HashSet<String>>>,
    catalog_error: Arc<Mutex<Option<String>>>,
    orders: Arc<Mutex<Vec<String>>>,
}

impl MockExchange {
    /// A venue listing every base against BTC and USDT, plus BTC/USDT.
    pub fn new(quote_balance: Decimal) -> Self {
        let mock = Self {
            markets: Arc::new(Mutex::new(HashMap::new())),
            prices: Arc::new(Mutex::new(HashMap::new())),
            balances: Arc::new(Mutex::new(HashMap::from([(QUOTE.to_string(), quote_balance)]))),
            failing_tickers: Arc::new(Mutex::new(HashSet::new())),
            failing_orders: Arc::new(Mutex::new(HashSet::new())),
            catalog_error: Arc::new(Mutex::new(None)),
            orders: Arc::new(Mutex::new(Vec::new())),
        };
        mock.list(BRIDGE, QUOTE, dec!(65000));
        mock
    }

    /// List a market with a last price.
    pub fn list(&self, base: &str, quote: &str, last: Decimal) {
        let pair = pair_id(base, quote);
        self.markets.lock().unwrap().insert(
            pair.clone(),
            MarketInfo {
                base: base.to_string(),
                quote: quote.to_string(),
                active: true,
                spot: true,
                amount_step: None,
            },
        );
        self.prices.lock().unwrap().insert(pair, last);
    }

    /// List `base/USDT` and `base/BTC`.
    pub fn list_triangle(&self, base: &str, base_quote: Decimal, base_bridge: Decimal) {
        self.list(base, QUOTE, base_quote);
        self.list(base, BRIDGE, base_bridge);
    }

    pub fn deactivate(&self, pair: &str) {
        if let Some(m) = self.markets.lock().unwrap().get_mut(pair) {
            m.active = false;
        }
    }

    pub fn fail_ticker(&self, pair: &str) {
        self.failing_tickers.lock().unwrap().insert(pair.to_string());
    }

    pub fn fail_orders(&self, pair: &str) {
        self.failing_orders.lock().unwrap().insert(pair.to_string());
    }

    pub fn fail_catalog(&self, msg: &str) {
        *self.catalog_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Orders placed so far, as `"BUY ETH/USDT"` / `"SELL ETH/BTC"`.
    pub fn orders(&self) -> Vec<String> {
        self.orders.lock().unwrap().clone()
    }

    pub fn balance_of(&self, asset: &str) -> Decimal {
        self.balances
            .lock()
            .unwrap()
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn fill(&self, side: &str, pair: &str, amount: Decimal, cost: Decimal) -> Result<OrderFill> {
        let (base, quote) = split_pair(pair).ok_or_else(|| anyhow!("Bad pair {pair}"))?;
        let mut balances = self.balances.lock().unwrap();
        let (spend, spend_amount, receive, receive_amount) = if side == "BUY" {
            (quote, cost, base, amount)
        } else {
            (base, amount, quote, cost)
        };
        let available = balances.get(spend).copied().unwrap_or(Decimal::ZERO);
        if spend_amount > available {
            bail!("Insufficient {spend}: need {spend_amount}, have {available}");
        }
        balances.insert(spend.to_string(), available - spend_amount);
        *balances.entry(receive.to_string()).or_insert(Decimal::ZERO) += receive_amount;

        self.orders.lock().unwrap().push(format!("{side} {pair}"));
        Ok(OrderFill {
            order_id: format!("MOCK-{}", Uuid::new_v4()),
            pair: pair.to_string(),
            amount,
            cost,
            fees: Vec::new(),
        })
    }

    fn order_price(&self, pair: &str) -> Result<Decimal> {
        if self.failing_orders.lock().unwrap().contains(pair) {
            bail!("Order rejected on {pair}");
        }
        self.prices
            .lock()
            .unwrap()
            .get(pair)
            .copied()
            .ok_or_else(|| anyhow!("Unknown pair {pair}"))
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn load_markets(&self) -> Result<HashMap<String, MarketInfo>> {
        if let Some(err) = self.catalog_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(self.markets.lock().unwrap().clone())
    }

    async fn fetch_ticker(&self, pair: &str) -> Result<Ticker> {
        if self.failing_tickers.lock().unwrap().contains(pair) {
            bail!("Ticker request for {pair} timed out");
        }
        Ok(Ticker {
            pair: pair.to_string(),
            last: self.prices.lock().unwrap().get(pair).copied(),
        })
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, Balance>> {
        Ok(self
            .balances
            .lock()
            .unwrap()
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
        let price = self.order_price(pair)?;
        self.fill("BUY", pair, cost / price, cost)
    }

    async fn create_market_sell_by_amount(&self, pair: &str, amount: Decimal) -> Result<OrderFill> {
        let price = self.order_price(pair)?;
        self.fill("SELL", pair, amount, amount * price)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_buy_then_sell_moves_balances() {
        let mock = MockExchange::new(dec!(1300));
        mock.list_triangle("ETH", dec!(130), dec!(0.002));

        let buy = assert_ok!(mock.create_market_buy_by_cost("ETH/USDT", dec!(1300)).await);
        assert_eq!(buy.amount, dec!(10));
        assert_eq!(mock.balance_of("USDT"), Decimal::ZERO);

        let sell = assert_ok!(mock.create_market_sell_by_amount("ETH/BTC", dec!(10)).await);
        assert_eq!(sell.cost, dec!(0.02));
        assert_eq!(mock.balance_of("ETH"), Decimal::ZERO);
        assert_eq!(mock.balance_of("BTC"), dec!(0.02));
        assert_eq!(mock.orders(), vec!["BUY ETH/USDT", "SELL ETH/BTC"]);
    }

    #[tokio::test]
    async fn test_overspend_rejected() {
        let mock = MockExchange::new(dec!(100));
        mock.list_triangle("ETH", dec!(130), dec!(0.002));
        assert_err!(mock.create_market_buy_by_cost("ETH/USDT", dec!(101)).await);
        assert!(mock.orders().is_empty());
    }

    #[tokio::test]
    async fn test_forced_failures() {
        let mock = MockExchange::new(dec!(100));
        mock.list_triangle("ETH", dec!(130), dec!(0.002));
        mock.fail_ticker("ETH/BTC");
        mock.fail_orders("ETH/USDT");
        mock.fail_catalog("maintenance");

        assert_err!(mock.fetch_ticker("ETH/BTC").await);
        assert_ok!(mock.fetch_ticker("ETH/USDT").await);
        assert_err!(mock.create_market_buy_by_cost("ETH/USDT", dec!(10)).await);
        assert_err!(mock.load_markets().await);
    }
}
