//! Shared types for the ARBWATCH agent.
//!
//! These types form the data model used across all modules.
//! The detector produces [`Opportunity`] values from a [`PriceSnapshot`];
//! the executor turns at most one of them per cycle into a [`TradeRecord`]
//! appended to the persisted [`LedgerState`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Latest known price per exchange, rebuilt from scratch every poll cycle.
///
/// A `BTreeMap` keeps exchange iteration order deterministic, so pair
/// enumeration (and therefore first-found selection and replays) is
/// reproducible for the same snapshot.
pub type PriceSnapshot = BTreeMap<String, Decimal>;

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A directional arbitrage opportunity: buy on one exchange, sell on another.
///
/// Constructed by the detector only when the spread meets the configured
/// minimum. Immutable once built; consumed at most once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Exchange to buy on (the cheaper side).
    pub buy_from: String,
    /// Exchange to sell on.
    pub sell_to: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// (sell - buy) / buy x 100, rounded to 2 dp for reporting.
    pub spread_pct: Decimal,
    /// Single-rate profit estimate on the configured notional, rounded to 2 dp.
    pub estimated_profit_usd: Decimal,
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} | buy ${:.2} sell ${:.2} | spread {}% | est. profit ${:.2}",
            self.buy_from,
            self.sell_to,
            self.buy_price,
            self.sell_price,
            self.spread_pct,
            self.estimated_profit_usd,
        )
    }
}

impl Opportunity {
    /// Check the fields the executor relies on before committing a trade.
    ///
    /// The detector never produces a malformed opportunity, but the executor
    /// accepts any caller-supplied sequence, so the boundary is re-checked.
    pub fn validate(&self) -> Result<(), ArbwatchError> {
        if self.buy_from.trim().is_empty() {
            return Err(ArbwatchError::InvalidOpportunity(
                "missing buy exchange".to_string(),
            ));
        }
        if self.sell_to.trim().is_empty() {
            return Err(ArbwatchError::InvalidOpportunity(
                "missing sell exchange".to_string(),
            ));
        }
        if self.buy_price <= Decimal::ZERO {
            return Err(ArbwatchError::InvalidOpportunity(format!(
                "buy price must be positive, got {}",
                self.buy_price
            )));
        }
        if self.sell_price <= Decimal::ZERO {
            return Err(ArbwatchError::InvalidOpportunity(format!(
                "sell price must be positive, got {}",
                self.sell_price
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Selection strategy
// ---------------------------------------------------------------------------

/// Policy for choosing which qualifying opportunity the executor acts on.
///
/// `FirstFound` keeps the historical behavior (first element in enumeration
/// order). `BestProfit` ranks by estimated profit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    FirstFound,
    BestProfit,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::FirstFound => write!(f, "first_found"),
            SelectionStrategy::BestProfit => write!(f, "best_profit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trade record
// ---------------------------------------------------------------------------

/// One executed (simulated) arbitrage trade, as appended to the ledger.
///
/// Records are immutable once appended and `balance_usd` mirrors the ledger
/// balance exactly at the time of write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Execution time, UTC (historical point time in replays).
    pub timestamp: DateTime<Utc>,
    pub buy_from: String,
    pub sell_to: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// USD notional committed: min(balance, configured cap).
    pub amount_usd: Decimal,
    /// Realized profit net of both leg fees, rounded to 2 dp. Signed.
    pub profit_usd: Decimal,
    /// Ledger balance after this trade, rounded to 2 dp.
    pub balance_usd: Decimal,
    /// Combined buy-leg and sell-leg fee for this trade, rounded to 4 dp.
    pub fees_paid_usd: Decimal,
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} | ${:.2} @ {:.2}/{:.2} | profit ${:.2} | balance ${:.2} | fees ${:.4}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.buy_from,
            self.sell_to,
            self.amount_usd,
            self.buy_price,
            self.sell_price,
            self.profit_usd,
            self.balance_usd,
            self.fees_paid_usd,
        )
    }
}

impl TradeRecord {
    /// Whether this trade closed at a profit.
    pub fn is_win(&self) -> bool {
        self.profit_usd > Decimal::ZERO
    }

    /// Profit as a percentage of the committed notional.
    pub fn profit_margin_pct(&self) -> Decimal {
        if self.amount_usd <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.profit_usd / self.amount_usd * Decimal::from(100)
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger state
// ---------------------------------------------------------------------------

fn default_balance() -> Decimal {
    Decimal::from(10_000)
}

/// Persistent ledger: virtual balance, cumulative fees, trade history.
///
/// The persisted JSON file is the sole source of truth across restarts.
/// Missing fields on load fall back to the same defaults a fresh ledger
/// gets, so older files stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default = "default_balance")]
    pub usd_balance: Decimal,
    /// Monotonically non-decreasing.
    #[serde(default)]
    pub total_fees: Decimal,
    /// Append-only; insertion order is chronological order.
    #[serde(default)]
    pub trade_history: Vec<TradeRecord>,
}

impl fmt::Display for LedgerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance=${:.2} | fees=${:.4} | trades={} (W{}/L{})",
            self.usd_balance,
            self.total_fees,
            self.trade_count(),
            self.wins(),
            self.losses(),
        )
    }
}

impl LedgerState {
    /// Fresh ledger with the given starting balance, no fees, no history.
    pub fn new(initial_balance_usd: Decimal) -> Self {
        Self {
            usd_balance: initial_balance_usd,
            total_fees: Decimal::ZERO,
            trade_history: Vec::new(),
        }
    }

    /// Apply one executed trade: balance and fees move together with the
    /// history append, keeping `balance_usd` on the record an exact mirror.
    pub fn apply_trade(&mut self, record: TradeRecord) {
        self.usd_balance += record.profit_usd;
        self.total_fees += record.fees_paid_usd;
        self.trade_history.push(record);
    }

    pub fn trade_count(&self) -> usize {
        self.trade_history.len()
    }

    /// Trades that closed with positive profit.
    pub fn wins(&self) -> usize {
        self.trade_history.iter().filter(|t| t.is_win()).count()
    }

    /// Trades that closed flat or at a loss.
    pub fn losses(&self) -> usize {
        self.trade_history.len() - self.wins()
    }

    pub fn last_trade(&self) -> Option<&TradeRecord> {
        self.trade_history.last()
    }

    /// Profit realized on trades executed on the given UTC calendar day.
    pub fn profit_on(&self, day: chrono::NaiveDate) -> Decimal {
        self.trade_history
            .iter()
            .filter(|t| t.timestamp.date_naive() == day)
            .map(|t| t.profit_usd)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ARBWATCH.
#[derive(Debug, thiserror::Error)]
pub enum ArbwatchError {
    /// An opportunity handed to the executor is missing required fields.
    /// Locally handled (skip + warn), never fatal.
    #[error("Invalid opportunity: {0}")]
    InvalidOpportunity(String),

    /// Ledger persistence failed. Fatal at startup; during a cycle it
    /// aborts that cycle without touching in-memory state.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Another process holds the ledger lock file.
    #[error("Ledger locked: {0}")]
    LedgerLocked(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
