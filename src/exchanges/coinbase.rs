//! Coinbase spot price integration.
//!
//! Read-only: ARBWATCH only needs the latest USD spot quote for the
//! configured product, so the unauthenticated v2 price endpoint is enough.
//!
//! API docs: https://docs.cdp.coinbase.com/coinbase-app/docs/api-prices
//! Base URL: https://api.coinbase.com/v2/
//! Rate limit: 10,000 requests/hour per IP (public endpoints)
//! Auth: Not required for spot price reads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::ExchangeClient;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.coinbase.com/v2";
const EXCHANGE_NAME: &str = "coinbase";

/// Per-request timeout. Quotes are only useful while fresh, so there is no
/// point waiting longer than a poll interval for one.
const REQUEST_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// API response types (Coinbase JSON → Rust)
// ---------------------------------------------------------------------------

/// Response from `/v2/prices/{product}/spot`. We only deserialize the
/// fields we need.
#[derive(Debug, Deserialize)]
struct SpotPriceResponse {
    data: SpotPriceData,
}

#[derive(Debug, Deserialize)]
struct SpotPriceData {
    /// Price as a decimal string, e.g. "64123.45".
    amount: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Coinbase spot price client for a single product.
pub struct CoinbaseClient {
    http: Client,
    /// Product identifier in Coinbase notation, e.g. "BTC-USD".
    product_id: String,
}

impl CoinbaseClient {
    /// Create a new Coinbase client for one product.
    pub fn new(product_id: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("ARBWATCH/0.1.0 (cross-exchange arbitrage monitor)")
            .build()
            .context("Failed to build HTTP client for Coinbase")?;

        Ok(Self {
            http,
            product_id: product_id.into(),
        })
    }

    /// Parse the `amount` string from a spot price response into a
    /// positive `Decimal`.
    fn parse_amount(amount: &str) -> Result<Decimal> {
        let price: Decimal = amount
            .parse()
            .with_context(|| format!("Coinbase spot amount {amount:?} is not a decimal"))?;

        if price <= Decimal::ZERO {
            anyhow::bail!("Coinbase returned non-positive price {price}");
        }

        Ok(price)
    }
}

// ---------------------------------------------------------------------------
// ExchangeClient trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ExchangeClient for CoinbaseClient {
    fn name(&self) -> &str {
        EXCHANGE_NAME
    }

    /// Fetch the current spot price for the configured product.
    async fn last_price(&self) -> Result<Decimal> {
        let url = format!("{BASE_URL}/prices/{}/spot", self.product_id);

        debug!(url = %url, "Fetching Coinbase spot price");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Coinbase spot price request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Coinbase API error {status}: {body}");
        }

        let spot: SpotPriceResponse = resp
            .json()
            .await
            .context("Failed to parse Coinbase spot price response")?;

        Self::parse_amount(&spot.data.amount)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // -- Response parsing tests --

    #[test]
    fn test_spot_response_deserializes() {
        let body = r#"{"data":{"base":"BTC","currency":"USD","amount":"64123.45"}}"#;
        let resp: SpotPriceResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data.amount, "64123.45");
    }

    #[test]
    fn test_parse_amount_valid() {
        let price = CoinbaseClient::parse_amount("64123.45").unwrap();
        assert_eq!(price, dec!(64123.45));
    }

    #[test]
    fn test_parse_amount_integer_string() {
        let price = CoinbaseClient::parse_amount("64000").unwrap();
        assert_eq!(price, dec!(64000));
    }

    #[test]
    fn test_parse_amount_garbage_rejected() {
        assert!(CoinbaseClient::parse_amount("not-a-price").is_err());
    }

    #[test]
    fn test_parse_amount_zero_rejected() {
        assert!(CoinbaseClient::parse_amount("0").is_err());
    }

    #[test]
    fn test_parse_amount_negative_rejected() {
        assert!(CoinbaseClient::parse_amount("-12.5").is_err());
    }

    // -- Client construction --

    #[test]
    fn test_new_client() {
        let client = CoinbaseClient::new("BTC-USD");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().name(), "coinbase");
    }
}
