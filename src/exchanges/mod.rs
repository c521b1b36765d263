//! Exchange integrations.
//!
//! Defines the `ExchangeClient` trait and provides implementations for:
//! - Coinbase — spot price via the public v2 prices endpoint
//! - Binance.US — last traded price via the public v3 ticker endpoint
//!
//! Both clients are read-only. ARBWATCH never places real orders; it only
//! needs one fresh USD quote per exchange per polling cycle.

pub mod binance_us;
pub mod coinbase;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::ExchangesConfig;

use self::binance_us::BinanceUsClient;
use self::coinbase::CoinbaseClient;

/// Abstraction over exchange price sources.
///
/// Implementors fetch the latest USD price for one trading pair on one
/// exchange. The feed polls every enabled client once per cycle; a client
/// that errors is skipped for that cycle rather than aborting it.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Exchange identifier used in snapshots, trade records, and logs.
    fn name(&self) -> &str;

    /// Fetch the latest USD price for the configured pair.
    async fn last_price(&self) -> Result<Decimal>;
}

/// Build one client per enabled exchange in the configuration.
///
/// Disabled exchanges are skipped entirely; the caller decides whether the
/// resulting set is large enough to arbitrage (fewer than two sources can
/// never produce an opportunity).
pub fn build_clients(config: &ExchangesConfig) -> Result<Vec<Box<dyn ExchangeClient>>> {
    let mut clients: Vec<Box<dyn ExchangeClient>> = Vec::new();

    if config.coinbase.enabled {
        clients.push(Box::new(CoinbaseClient::new(&config.coinbase.product_id)?));
        info!(product_id = %config.coinbase.product_id, "Coinbase price source enabled");
    }

    if config.binance_us.enabled {
        clients.push(Box::new(BinanceUsClient::new(&config.binance_us.symbol)?));
        info!(symbol = %config.binance_us.symbol, "Binance.US price source enabled");
    }

    Ok(clients)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
