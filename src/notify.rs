//! Telegram notifications for detected opportunities and executed trades.
//!
//! Push-only and best-effort: a misconfigured or unreachable Telegram API
//! must never stall the polling loop, so delivery failures are logged at
//! warn and swallowed.
//!
//! API docs: https://core.telegram.org/bots/api#sendmessage
//! Base URL: https://api.telegram.org/bot{token}/
//! Auth: Bot token in the URL path; chat id in the payload.

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, TelegramConfig};
use crate::types::{Opportunity, TradeRecord};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.telegram.org";

/// Environment variables consulted when the config does not name its own.
const DEFAULT_BOT_TOKEN_ENV: &str = "ARBWATCH_TELEGRAM_BOT_TOKEN";
const DEFAULT_CHAT_ID_ENV: &str = "ARBWATCH_TELEGRAM_CHAT_ID";

const REQUEST_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

struct Credentials {
    bot_token: String,
    chat_id: String,
}

/// Telegram push notifier.
///
/// Holds resolved credentials, or nothing when disabled — in which case
/// `send` is a no-op. Secrets are never read from the TOML itself, only
/// from the environment variables the TOML names.
pub struct TelegramNotifier {
    http: Client,
    credentials: Option<Credentials>,
}

impl TelegramNotifier {
    /// Build a notifier from config, resolving credentials from the
    /// environment. Enabled-but-unconfigured degrades to disabled with a
    /// warning rather than failing startup.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        let credentials = if config.enabled {
            let token_env = config
                .bot_token_env
                .as_deref()
                .unwrap_or(DEFAULT_BOT_TOKEN_ENV);
            let chat_env = config.chat_id_env.as_deref().unwrap_or(DEFAULT_CHAT_ID_ENV);

            match (
                AppConfig::resolve_env(token_env),
                AppConfig::resolve_env(chat_env),
            ) {
                (Ok(bot_token), Ok(chat_id)) => {
                    info!("Telegram notifications enabled");
                    Some(Credentials { bot_token, chat_id })
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Telegram enabled but credentials unresolved — notifications disabled");
                    None
                }
            }
        } else {
            debug!("Telegram notifications disabled");
            None
        };

        Ok(Self { http, credentials })
    }

    /// Whether this notifier will actually deliver messages.
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send a Markdown message to the configured chat.
    ///
    /// No-op when disabled. All failures are logged and swallowed.
    pub async fn send(&self, text: &str) {
        let Some(creds) = &self.credentials else {
            return;
        };

        let url = format!("{BASE_URL}/bot{}/sendMessage", creds.bot_token);
        let payload = serde_json::json!({
            "chat_id": creds.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        match self.http.post(&url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Telegram notification sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "Telegram API rejected notification");
            }
            Err(e) => {
                warn!(error = %e, "Telegram notification failed");
            }
        }
    }

    // -- Message builders ------------------------------------------------

    /// Markdown body announcing the top-ranked opportunity.
    pub fn format_opportunity(opp: &Opportunity) -> String {
        format!(
            "🚀 *Arbitrage Opportunity Detected!*\n\
             Buy from: *{}* at `${}`\n\
             Sell to: *{}* at `${}`\n\
             Spread: *{}%*\n\
             Est. Profit: *${}*",
            opp.buy_from, opp.buy_price, opp.sell_to, opp.sell_price, opp.spread_pct,
            opp.estimated_profit_usd,
        )
    }

    /// Markdown body confirming an executed trade.
    pub fn format_trade(record: &TradeRecord) -> String {
        format!(
            "✅ *Trade Executed!*\n\
             Bought from: *{}* at `${}`\n\
             Sold to: *{}* at `${}`\n\
             Profit: *${}*\n\
             New Balance: *${}*",
            record.buy_from, record.buy_price, record.sell_to, record.sell_price,
            record.profit_usd, record.balance_usd,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
