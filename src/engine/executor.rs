//! Ledger executor — simulated trade execution against the virtual ledger.
//!
//! Consumes at most one opportunity per cycle, sizes the trade, prices both
//! legs with separate fees, and appends the resulting record to the
//! persisted ledger. Persistence is the last step and covers the whole
//! state in one write, so the in-memory ledger never runs ahead of disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::storage::{LedgerLock, LedgerStore};
use crate::types::{LedgerState, Opportunity, TradeRecord};

// ---------------------------------------------------------------------------
// Configuration (defaults — overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Starting balance for a fresh ledger.
    pub initial_balance_usd: Decimal,
    /// Per-trade USD cap; actual size is min(balance, cap).
    pub trade_amount_usd: Decimal,
    /// Fee percentage charged separately on each leg.
    pub fee_pct: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance_usd: dec!(10000),
            trade_amount_usd: dec!(1000),
            fee_pct: dec!(0.1),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Owns the ledger state and turns opportunities into executed trades.
#[derive(Debug)]
pub struct LedgerExecutor {
    state: LedgerState,
    config: LedgerConfig,
    store: Option<LedgerStore>,
    _lock: Option<LedgerLock>,
}

impl LedgerExecutor {
    /// Open the persisted ledger for live trading.
    ///
    /// Acquires the exclusive lock first, then loads the saved state or
    /// seeds a fresh one and persists it immediately, so a reader never
    /// observes an unpersisted fresh ledger. Fails on lock contention or
    /// an unreadable/corrupt state file.
    pub fn open(store: LedgerStore, config: LedgerConfig) -> Result<Self> {
        let lock = LedgerLock::acquire(store.path())?;

        let state = match store.load()? {
            Some(state) => {
                info!(
                    balance = %format!("${:.2}", state.usd_balance),
                    trades = state.trade_count(),
                    "Resuming existing ledger"
                );
                state
            }
            None => {
                let fresh = LedgerState::new(config.initial_balance_usd);
                store
                    .save(&fresh)
                    .context("Failed to persist fresh ledger")?;
                info!(
                    balance = %format!("${:.2}", fresh.usd_balance),
                    "Seeded fresh ledger"
                );
                fresh
            }
        };

        Ok(Self {
            state,
            config,
            store: Some(store),
            _lock: Some(lock),
        })
    }

    /// Storeless executor for replays and tests. Never touches the
    /// filesystem and takes no lock.
    pub fn in_memory(config: LedgerConfig) -> Self {
        let state = LedgerState::new(config.initial_balance_usd);
        Self {
            state,
            config,
            store: None,
            _lock: None,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.state.usd_balance
    }

    pub fn total_fees(&self) -> Decimal {
        self.state.total_fees
    }

    /// Full trade history in insertion (chronological) order.
    pub fn history(&self) -> &[TradeRecord] {
        &self.state.trade_history
    }

    pub fn trade_count(&self) -> usize {
        self.state.trade_count()
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Execute the first opportunity of the sequence at the current time.
    pub fn execute(&mut self, opportunities: &[Opportunity]) -> Result<Option<TradeRecord>> {
        self.execute_at(opportunities, Utc::now())
    }

    /// Execute the first opportunity of the sequence, stamping the record
    /// with the given timestamp (replays pass the historical point time).
    ///
    /// Returns `Ok(None)` when there is nothing to do: empty input, a
    /// malformed opportunity (skipped with a warning; the rest of the
    /// sequence is NOT tried), or a depleted balance. Returns `Err` only
    /// when persisting the updated ledger fails; in that case the
    /// in-memory state still matches the last successful write.
    pub fn execute_at(
        &mut self,
        opportunities: &[Opportunity],
        timestamp: DateTime<Utc>,
    ) -> Result<Option<TradeRecord>> {
        let Some(opportunity) = opportunities.first() else {
            return Ok(None);
        };

        if let Err(e) = opportunity.validate() {
            warn!(error = %e, "Skipping malformed opportunity");
            return Ok(None);
        }

        let amount_usd = self.state.usd_balance.min(self.config.trade_amount_usd);
        if amount_usd <= Decimal::ZERO {
            warn!(
                balance = %self.state.usd_balance,
                "Balance depleted, skipping trade"
            );
            return Ok(None);
        }

        let fee_rate = self.config.fee_pct / dec!(100);

        // Buy leg: USD notional to base quantity, fee taken in base units.
        let base_qty = amount_usd / opportunity.buy_price;
        let buy_leg_fee_base = base_qty * fee_rate;
        let base_after_fee = base_qty - buy_leg_fee_base;

        // Sell leg: base back to USD at the sell price, fee taken in USD.
        let usd_proceeds = base_after_fee * opportunity.sell_price;
        let sell_leg_fee_usd = usd_proceeds * fee_rate;
        let usd_after_fees = usd_proceeds - sell_leg_fee_usd;

        // Rounded values are what get committed, so the running balance and
        // the appended record never drift apart.
        let profit_usd = (usd_after_fees - amount_usd).round_dp(2);
        let fees_paid_usd =
            (buy_leg_fee_base * opportunity.buy_price + sell_leg_fee_usd).round_dp(4);

        let record = TradeRecord {
            timestamp,
            buy_from: opportunity.buy_from.clone(),
            sell_to: opportunity.sell_to.clone(),
            buy_price: opportunity.buy_price,
            sell_price: opportunity.sell_price,
            amount_usd,
            profit_usd,
            balance_usd: self.state.usd_balance + profit_usd,
            fees_paid_usd,
        };

        // Candidate-commit: persist the updated state first, then adopt it.
        // A failed write aborts the cycle with the in-memory ledger still at
        // the last persisted state.
        let mut candidate = self.state.clone();
        candidate.apply_trade(record.clone());
        if let Some(store) = &self.store {
            store
                .save(&candidate)
                .context("Failed to persist ledger after trade")?;
        }
        self.state = candidate;

        info!(
            buy_from = %record.buy_from,
            sell_to = %record.sell_to,
            amount = %format!("${:.2}", record.amount_usd),
            profit = %format!("${:.2}", record.profit_usd),
            balance = %format!("${:.2}", record.balance_usd),
            fees = %format!("${:.4}", record.fees_paid_usd),
            "Trade executed"
        );

        Ok(Some(record))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
