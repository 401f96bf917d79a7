//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use rust_decimal::prelude::*;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub venue: VenueConfig,
    #[serde(default)]
    pub triangle: TriangleConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VenueConfig {
    /// Venue identifier, e.g. "binance".
    pub name: String,
    pub api_key_env: String,
    pub secret_env: String,
    /// REST endpoint override (testnet, regional mirror).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Simulate fills against live prices instead of placing orders.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_paper_balance")]
    pub paper_balance: f64,
    #[serde(default = "default_paper_fee_rate")]
    pub paper_fee_rate: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TriangleConfig {
    pub bridge_asset: String,
    pub settlement_asset: String,
}

impl Default for TriangleConfig {
    fn default() -> Self {
        Self {
            bridge_asset: "BTC".to_string(),
            settlement_asset: "USDT".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StrategyConfig {
    /// Modeling amount in the settlement asset. Never actually traded.
    pub principal: f64,
    /// Required profit as a fraction of principal (0.01 = 1%).
    pub profit_margin: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Pause after every this many symbols.
    pub throttle_every: usize,
    pub throttle_pause_ms: u64,
    /// Pause after a symbol fails.
    pub error_cooldown_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            throttle_every: 5,
            throttle_pause_ms: 2_000,
            error_cooldown_secs: 10,
        }
    }
}

impl ScanConfig {
    pub fn throttle_pause(&self) -> Duration {
        Duration::from_millis(self.throttle_pause_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    /// Where to write the pass result as JSON. Nothing is written when unset.
    #[serde(default)]
    pub result_path: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_paper_balance() -> f64 {
    1_000.0
}

fn default_paper_fee_rate() -> f64 {
    0.001
}

/// API credentials resolved from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: SecretString,
    pub secret: SecretString,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Apply `EXCHANGE`, `PRINCIPAL` and `PROFIT_MARGIN` from the environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(name) = lookup("EXCHANGE") {
            self.venue.name = name.trim().to_lowercase();
        }
        if let Some(raw) = lookup("PRINCIPAL") {
            self.strategy.principal = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid PRINCIPAL: {raw}"))?;
        }
        if let Some(raw) = lookup("PROFIT_MARGIN") {
            self.strategy.profit_margin = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid PROFIT_MARGIN: {raw}"))?;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.strategy.principal.is_finite() || self.strategy.principal <= 0.0 {
            bail!("strategy.principal must be positive");
        }
        if !self.strategy.profit_margin.is_finite() || self.strategy.profit_margin < 0.0 {
            bail!("strategy.profit_margin must not be negative");
        }
        if self.scan.throttle_every == 0 {
            bail!("scan.throttle_every must be at least 1");
        }
        if self.triangle.bridge_asset.eq_ignore_ascii_case(&self.triangle.settlement_asset) {
            bail!("triangle.bridge_asset and triangle.settlement_asset must differ");
        }
        let fee = self.venue.paper_fee_rate;
        if self.venue.dry_run && !(0.0..1.0).contains(&fee) {
            bail!("venue.paper_fee_rate must be in [0, 1)");
        }
        Ok(())
    }

    pub fn principal(&self) -> Result<Decimal> {
        to_decimal(self.strategy.principal, "strategy.principal")
    }

    /// Absolute profit threshold: `profit_margin × principal`.
    pub fn profit_threshold(&self) -> Result<Decimal> {
        let margin = to_decimal(self.strategy.profit_margin, "strategy.profit_margin")?;
        Ok(margin * self.principal()?)
    }

    /// Resolve the venue credentials referenced by this config.
    ///
    /// In dry-run mode missing keys resolve to empty secrets, since only
    /// public market data is requested from the venue.
    pub fn credentials(&self) -> Result<Credentials> {
        let secret = |env: &str| -> Result<SecretString> {
            match Self::resolve_env(env) {
                Ok(value) => Ok(SecretString::new(value)),
                Err(_) if self.venue.dry_run => Ok(SecretString::new(String::new())),
                Err(e) => Err(e),
            }
        };
        Ok(Credentials {
            api_key: secret(&self.venue.api_key_env)?,
            secret: secret(&self.venue.secret_env)?,
        })
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

/// Convert a config float into an exact decimal.
pub fn to_decimal(value: f64, field: &str) -> Result<Decimal> {
    Decimal::from_f64(value).with_context(|| format!("{field} is not representable: {value}"))
}
