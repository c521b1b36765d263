//! Binance.US last-trade price integration.
//!
//! Read-only: fetches the most recent traded price for the configured
//! symbol from the public ticker endpoint.
//!
//! API docs: https://docs.binance.us/#get-live-ticker-price
//! Base URL: https://api.binance.us/api/v3/
//! Rate limit: 1,200 request weight/minute per IP
//! Auth: Not required for ticker reads.

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

const BASE_URL: &str = "https://api.binance.us/api/v3";
const EXCHANGE_NAME: &str = "binance_us";

/// Per-request timeout. Quotes are only useful while fresh, so there is no
/// point waiting longer than a poll interval for one.
const REQUEST_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// API response types (Binance JSON → Rust)
// ---------------------------------------------------------------------------

/// Response from `/api/v3/ticker/price`.
#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    #[serde(default)]
    symbol: String,
    /// Price as a decimal string, zero-padded to 8 places, e.g.
    /// "64123.45000000".
    price: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance.US ticker price client for a single symbol.
pub struct BinanceUsClient {
    http: Client,
    /// Symbol in Binance notation, e.g. "BTCUSD".
    symbol: String,
}

impl BinanceUsClient {
    /// Create a new Binance.US client for one symbol.
    pub fn new(symbol: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("ARBWATCH/0.1.0 (cross-exchange arbitrage monitor)")
            .build()
            .context("Failed to build HTTP client for Binance.US")?;

        Ok(Self {
            http,
            symbol: symbol.into(),
        })
    }

    /// Parse the `price` string from a ticker response into a positive
    /// `Decimal`, stripping the trailing zeros Binance pads with.
    fn parse_price(price: &str) -> Result<Decimal> {
        let parsed: Decimal = price
            .parse()
            .with_context(|| format!("Binance.US ticker price {price:?} is not a decimal"))?;

        if parsed <= Decimal::ZERO {
            anyhow::bail!("Binance.US returned non-positive price {parsed}");
        }

        Ok(parsed.normalize())
    }
}

// ---------------------------------------------------------------------------
// ExchangeClient trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ExchangeClient for BinanceUsClient {
    fn name(&self) -> &str {
        EXCHANGE_NAME
    }

    /// Fetch the latest traded price for the configured symbol.
    async fn last_price(&self) -> Result<Decimal> {
        let url = format!("{BASE_URL}/ticker/price?symbol={}", self.symbol);

        debug!(url = %url, "Fetching Binance.US ticker price");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Binance.US ticker request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance.US API error {status}: {body}");
        }

        let ticker: TickerPriceResponse = resp
            .json()
            .await
            .context("Failed to parse Binance.US ticker response")?;

        let price = Self::parse_price(&ticker.price)?;
        debug!(symbol = %ticker.symbol, price = %price, "Binance.US ticker fetched");

        Ok(price)
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
    fn test_ticker_response_deserializes() {
        let body = r#"{"symbol":"BTCUSD","price":"64123.45000000"}"#;
        let resp: TickerPriceResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.symbol, "BTCUSD");
        assert_eq!(resp.price, "64123.45000000");
    }

    #[test]
    fn test_parse_price_strips_padding() {
        let price = BinanceUsClient::parse_price("64123.45000000").unwrap();
        assert_eq!(price, dec!(64123.45));
        assert_eq!(price.to_string(), "64123.45");
    }

    #[test]
    fn test_parse_price_integer_value() {
        let price = BinanceUsClient::parse_price("64000.00000000").unwrap();
        assert_eq!(price.to_string(), "64000");
    }

    #[test]
    fn test_parse_price_garbage_rejected() {
        assert!(BinanceUsClient::parse_price("n/a").is_err());
    }

    #[test]
    fn test_parse_price_zero_rejected() {
        assert!(BinanceUsClient::parse_price("0.00000000").is_err());
    }

    #[test]
    fn test_parse_price_negative_rejected() {
        assert!(BinanceUsClient::parse_price("-1.0").is_err());
    }

    // -- Client construction --

    #[test]
    fn test_new_client() {
        let client = BinanceUsClient::new("BTCUSD");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().name(), "binance_us");
    }
}
