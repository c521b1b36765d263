//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the Telegram bot token and chat id) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

use crate::types::{ArbwatchError, SelectionStrategy};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub exchanges: ExchangesConfig,
    pub arbitrage: ArbitrageConfig,
    pub trade: TradeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Display label for the monitored pair, e.g. "BTC/USD".
    pub trading_pair: String,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangesConfig {
    pub coinbase: CoinbaseConfig,
    pub binance_us: BinanceUsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoinbaseConfig {
    pub enabled: bool,
    /// Coinbase product id, e.g. "BTC-USD".
    pub product_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BinanceUsConfig {
    pub enabled: bool,
    /// Binance.US ticker symbol, e.g. "BTCUSDT".
    pub symbol: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArbitrageConfig {
    /// Minimum spread (percent units) for a direction to qualify.
    pub min_spread_pct: Decimal,
    /// Which qualifying opportunity the executor acts on.
    #[serde(default)]
    pub selection: SelectionStrategy,
}

fn default_initial_balance() -> Decimal {
    dec!(10000)
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradeConfig {
    /// Per-trade USD cap; actual size is min(balance, cap).
    pub amount_usd: Decimal,
    /// Fee percentage charged on each leg separately.
    pub fee_pct: Decimal,
    #[serde(default = "default_initial_balance")]
    pub initial_balance_usd: Decimal,
}

fn default_state_file() -> String {
    "state/ledger.json".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifierConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    pub bot_token_env: Option<String>,
    pub chat_id_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
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

    /// Reject configurations the agent cannot run with.
    pub fn validate(&self) -> Result<(), ArbwatchError> {
        if self.agent.poll_interval_secs == 0 {
            return Err(ArbwatchError::Config(
                "agent.poll_interval_secs must be >= 1".to_string(),
            ));
        }
        if self.arbitrage.min_spread_pct < Decimal::ZERO {
            return Err(ArbwatchError::Config(
                "arbitrage.min_spread_pct must not be negative".to_string(),
            ));
        }
        if self.trade.amount_usd <= Decimal::ZERO {
            return Err(ArbwatchError::Config(
                "trade.amount_usd must be positive".to_string(),
            ));
        }
        if self.trade.fee_pct < Decimal::ZERO || self.trade.fee_pct >= dec!(100) {
            return Err(ArbwatchError::Config(
                "trade.fee_pct must be in [0, 100)".to_string(),
            ));
        }
        if self.trade.initial_balance_usd <= Decimal::ZERO {
            return Err(ArbwatchError::Config(
                "trade.initial_balance_usd must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
