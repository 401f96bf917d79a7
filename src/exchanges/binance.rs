//! Binance spot integration.
//!
//! Market data comes from the public REST endpoints; balances and orders
//! use the signed endpoints (HMAC-SHA256 over the query string).
//!
//! API docs: https://developers.binance.com/docs/binance-spot-api-docs/rest-api
//! Base URL: https://api.binance.com
//! Auth: `X-MBX-APIKEY` header + `signature` query parameter.
//!
//! Binance symbols are concatenated (`ETHBTC`); the catalog loaded by
//! `load_markets` maps unified `ETH/BTC` ids onto them.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::{Decimal, RoundingStrategy};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Exchange;
use crate::config::Credentials;
use crate::types::{pair_id, split_pair, Balance, MarketInfo, OrderFill, Ticker};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const VENUE_NAME: &str = "binance";
const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const RECV_WINDOW_MS: u64 = 5_000;

/// Quote amounts are truncated to this many decimals before submission.
const QUOTE_PRECISION: u32 = 8;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    is_spot_trading_allowed: bool,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    #[serde(default)]
    step_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    status: String,
    executed_qty: String,
    cummulative_quote_qty: String,
    #[serde(default)]
    fills: Vec<FillInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillInfo {
    commission: String,
    commission_asset: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

/// Catalog entries needed to route orders.
#[derive(Debug, Clone)]
struct SymbolRoute {
    symbol: String,
    amount_step: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BinanceClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    routes: RwLock<HashMap<String, SymbolRoute>>,
}

impl BinanceClient {
    pub fn new(credentials: Credentials, base_url: Option<String>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build Binance HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            credentials,
            routes: RwLock::new(HashMap::new()),
        })
    }

    fn route(&self, pair: &str) -> Result<SymbolRoute> {
        let routes = self
            .routes
            .read()
            .map_err(|_| anyhow!("Binance symbol table lock poisoned"))?;
        if let Some(route) = routes.get(pair) {
            return Ok(route.clone());
        }
        // Fall back to the concatenated form if the catalog has not been loaded.
        let (base, quote) = split_pair(pair).with_context(|| format!("Malformed pair id: {pair}"))?;
        Ok(SymbolRoute {
            symbol: format!("{base}{quote}"),
            amount_step: None,
        })
    }

    async fn public_get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Binance request {path} failed"))?;
        Self::parse_response(path, resp).await
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut query = encode_query(params);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={RECV_WINDOW_MS}&timestamp={}",
            chrono::Utc::now().timestamp_millis()
        ));
        let signature = sign(self.credentials.secret.expose_secret(), &query)?;

        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);
        let resp = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", self.credentials.api_key.expose_secret())
            .send()
            .await
            .with_context(|| format!("Binance request {path} failed"))?;
        Self::parse_response(path, resp).await
    }

    async fn parse_response<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiError>(&body) {
                anyhow::bail!("Binance {path} error {status} (code {}): {}", err.code, err.msg);
            }
            anyhow::bail!("Binance {path} error {status}: {body}");
        }
        serde_json::from_str(&body).with_context(|| format!("Failed to parse Binance {path} response"))
    }

    async fn place_market_order(
        &self,
        pair: &str,
        side: &str,
        size_param: (&str, String),
    ) -> Result<OrderFill> {
        let route = self.route(pair)?;
        let (base, quote) = split_pair(pair).with_context(|| format!("Malformed pair id: {pair}"))?;
        let received = if side == "BUY" { base } else { quote };

        let params = [
            ("symbol", route.symbol.clone()),
            ("side", side.to_string()),
            ("type", "MARKET".to_string()),
            size_param,
            ("newClientOrderId", client_order_id()),
            ("newOrderRespType", "FULL".to_string()),
        ];
        let order: OrderResponse = self.signed_request(Method::POST, "/api/v3/order", &params).await?;
        let fill = convert_order(pair, received, &order)?;

        info!(
            order_id = %fill.order_id,
            pair,
            side,
            status = %order.status,
            amount = %fill.amount,
            cost = %fill.cost,
            fee = %fill.total_fee(),
            "Binance market order filled"
        );
        Ok(fill)
    }
}

#[async_trait]
impl Exchange for BinanceClient {
    async fn load_markets(&self) -> Result<HashMap<String, MarketInfo>> {
        let info: ExchangeInfo = self.public_get("/api/v3/exchangeInfo", &[]).await?;

        let mut markets = HashMap::with_capacity(info.symbols.len());
        let mut routes = HashMap::with_capacity(info.symbols.len());
        for symbol in info.symbols {
            let pair = pair_id(&symbol.base_asset, &symbol.quote_asset);
            let amount_step = lot_step(&symbol.filters);
            routes.insert(
                pair.clone(),
                SymbolRoute {
                    symbol: symbol.symbol.clone(),
                    amount_step,
                },
            );
            markets.insert(
                pair,
                MarketInfo {
                    base: symbol.base_asset,
                    quote: symbol.quote_asset,
                    active: symbol.status == "TRADING",
                    spot: symbol.is_spot_trading_allowed,
                    amount_step,
                },
            );
        }

        *self
            .routes
            .write()
            .map_err(|_| anyhow!("Binance symbol table lock poisoned"))? = routes;

        info!(count = markets.len(), "Loaded Binance market catalog");
        Ok(markets)
    }

    async fn fetch_ticker(&self, pair: &str) -> Result<Ticker> {
        let route = self.route(pair)?;
        let ticker: TickerPrice = self
            .public_get("/api/v3/ticker/price", &[("symbol", route.symbol)])
            .await?;
        let last = parse_decimal(&ticker.price).ok();
        if last.is_none() {
            warn!(pair, price = %ticker.price, "Unparseable Binance ticker price");
        }
        debug!(pair, last = ?last, "Fetched Binance ticker");
        Ok(Ticker {
            pair: pair.to_string(),
            last,
        })
    }

    async fn fetch_balance(&self) -> Result<HashMap<String, Balance>> {
        let account: AccountInfo = self.signed_request(Method::GET, "/api/v3/account", &[]).await?;
        account
            .balances
            .into_iter()
            .map(|b| -> Result<(String, Balance)> {
                Ok((
                    b.asset,
                    Balance {
                        free: parse_decimal(&b.free)?,
                        locked: parse_decimal(&b.locked)?,
                    },
                ))
            })
            .collect()
    }

    async fn create_market_buy_by_cost(&self, pair: &str, cost: Decimal) -> Result<OrderFill> {
        let cost = cost.round_dp_with_strategy(QUOTE_PRECISION, RoundingStrategy::ToZero);
        self.place_market_order(pair, "BUY", ("quoteOrderQty", cost.normalize().to_string()))
            .await
    }

    async fn create_market_sell_by_amount(&self, pair: &str, amount: Decimal) -> Result<OrderFill> {
        let amount = match self.route(pair)?.amount_step {
            Some(step) => round_down_to_step(amount, step),
            None => amount,
        };
        self.place_market_order(pair, "SELL", ("quantity", amount.normalize().to_string()))
            .await
    }

    fn name(&self) -> &str {
        VENUE_NAME
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// HMAC-SHA256 signature of `payload`, hex encoded.
pub fn sign(secret: &str, payload: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| anyhow!("Invalid HMAC key: {e}"))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Client order ids are capped at 36 characters by the venue.
fn client_order_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("triarb-{}", &id[..24])
}

fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("Invalid decimal: {raw}"))
}

fn lot_step(filters: &[SymbolFilter]) -> Option<Decimal> {
    filters
        .iter()
        .find(|f| f.filter_type == "LOT_SIZE")
        .and_then(|f| f.step_size.as_deref())
        .and_then(|s| parse_decimal(s).ok())
        .filter(|step| !step.is_zero())
}

/// Truncate `amount` to a whole multiple of `step`.
pub fn round_down_to_step(amount: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return amount;
    }
    ((amount / step).floor() * step).normalize()
}

/// Convert a FULL order response into an `OrderFill`, keeping only the
/// commissions charged in the asset the order delivered.
fn convert_order(pair: &str, received_asset: &str, order: &OrderResponse) -> Result<OrderFill> {
    let mut fees = Vec::with_capacity(order.fills.len());
    for fill in &order.fills {
        let commission = parse_decimal(&fill.commission)?;
        if fill.commission_asset == received_asset {
            fees.push(commission);
        } else if !commission.is_zero() {
            debug!(
                pair,
                asset = %fill.commission_asset,
                commission = %commission,
                "Commission charged outside the traded pair"
            );
        }
    }

    Ok(OrderFill {
        order_id: order.order_id.to_string(),
        pair: pair.to_string(),
        amount: parse_decimal(&order.executed_qty)?,
        cost: parse_decimal(&order.cummulative_quote_qty)?,
        fees,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
