//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`
//! and pushed by the polling loop once per cycle.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::{LedgerState, Opportunity, PriceSnapshot, TradeRecord};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Spread points kept for the chart (oldest dropped first).
const SPREAD_HISTORY_LIMIT: usize = 500;

/// Trades returned by `/api/trades`, latest first.
const TRADES_LIMIT: usize = 100;

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    /// Trading pair label, e.g. "BTC/USD".
    pair: String,
    started_at: DateTime<Utc>,
    pub prices: RwLock<PriceSnapshot>,
    pub spread_history: RwLock<Vec<SpreadPoint>>,
    pub opportunities: RwLock<Vec<Opportunity>>,
    /// Mirror of the executor's ledger, kept in step via `record_trade`.
    pub ledger: RwLock<LedgerState>,
}

impl DashboardState {
    /// Create dashboard state seeded from the executor's ledger, so the
    /// page shows balance and history from previous runs immediately.
    pub fn new(pair: impl Into<String>, ledger: LedgerState) -> Self {
        Self {
            pair: pair.into(),
            started_at: Utc::now(),
            prices: RwLock::new(PriceSnapshot::new()),
            spread_history: RwLock::new(Vec::new()),
            opportunities: RwLock::new(Vec::new()),
            ledger: RwLock::new(ledger),
        }
    }

    /// Record one polling cycle's view of the market.
    pub async fn record_cycle(
        &self,
        snapshot: &PriceSnapshot,
        best_spread: Option<Decimal>,
        opportunities: &[Opportunity],
    ) {
        *self.prices.write().await = snapshot.clone();
        *self.opportunities.write().await = opportunities.to_vec();

        if let Some(spread_pct) = best_spread {
            let mut history = self.spread_history.write().await;
            history.push(SpreadPoint {
                timestamp: Utc::now().to_rfc3339(),
                spread_pct,
            });
            if history.len() > SPREAD_HISTORY_LIMIT {
                let excess = history.len() - SPREAD_HISTORY_LIMIT;
                history.drain(..excess);
            }
        }
    }

    /// Mirror an executed trade into the dashboard's ledger copy.
    pub async fn record_trade(&self, record: &TradeRecord) {
        self.ledger.write().await.apply_trade(record.clone());
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub pair: String,
    pub balance_usd: Decimal,
    pub total_fees_usd: Decimal,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub todays_profit_usd: Decimal,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadPoint {
    pub timestamp: String,
    pub spread_pct: Decimal,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let ledger = state.ledger.read().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds();

    Json(StatusResponse {
        pair: state.pair.clone(),
        balance_usd: ledger.usd_balance,
        total_fees_usd: ledger.total_fees,
        trade_count: ledger.trade_count(),
        wins: ledger.wins(),
        losses: ledger.losses(),
        todays_profit_usd: ledger.profit_on(Utc::now().date_naive()),
        uptime_secs,
    })
}

/// GET /api/prices
pub async fn get_prices(State(state): State<AppState>) -> Json<PriceSnapshot> {
    let prices = state.prices.read().await;
    Json(prices.clone())
}

/// GET /api/spread
pub async fn get_spread(State(state): State<AppState>) -> Json<Vec<SpreadPoint>> {
    let history = state.spread_history.read().await;
    Json(history.clone())
}

/// GET /api/opportunities
pub async fn get_opportunities(State(state): State<AppState>) -> Json<Vec<Opportunity>> {
    let opportunities = state.opportunities.read().await;
    Json(opportunities.clone())
}

/// GET /api/trades
pub async fn get_trades(State(state): State<AppState>) -> Json<Vec<TradeRecord>> {
    let ledger = state.ledger.read().await;
    let trades: Vec<TradeRecord> = ledger
        .trade_history
        .iter()
        .rev()
        .take(TRADES_LIMIT)
        .cloned()
        .collect();
    Json(trades)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn make_record(profit: Decimal, balance_after: Decimal) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now(),
            buy_from: "coinbase".to_string(),
            sell_to: "binance_us".to_string(),
            buy_price: dec!(64000),
            sell_price: dec!(64500),
            amount_usd: dec!(1000),
            profit_usd: profit,
            balance_usd: balance_after,
            fees_paid_usd: dec!(2.0068),
        }
    }

    fn test_state() -> AppState {
        Arc::new(DashboardState::new("BTC/USD", LedgerState::new(dec!(10000))))
    }

    // -- Serialization tests --

    #[test]
    fn test_status_response_serializes() {
        let resp = StatusResponse {
            pair: "BTC/USD".into(),
            balance_usd: dec!(10005.80),
            total_fees_usd: dec!(2.0068),
            trade_count: 1,
            wins: 1,
            losses: 0,
            todays_profit_usd: dec!(5.80),
            uptime_secs: 3600,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("BTC/USD"));
        assert!(json.contains("10005.8"));
    }

    #[test]
    fn test_spread_point_serializes() {
        let point = SpreadPoint {
            timestamp: "2026-02-21T12:00:00Z".into(),
            spread_pct: dec!(0.78),
        };
        let json = serde_json::to_string(&point).unwrap();
        assert!(json.contains("0.78"));
    }

    // -- Handler tests --

    #[tokio::test]
    async fn test_get_status_initial() {
        let Json(resp) = get_status(State(test_state())).await;
        assert_eq!(resp.pair, "BTC/USD");
        assert_eq!(resp.balance_usd, dec!(10000));
        assert_eq!(resp.trade_count, 0);
        assert_eq!(resp.todays_profit_usd, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_record_trade_moves_status() {
        let state = test_state();
        state
            .record_trade(&make_record(dec!(5.80), dec!(10005.80)))
            .await;

        let Json(resp) = get_status(State(state)).await;
        assert_eq!(resp.balance_usd, dec!(10005.80));
        assert_eq!(resp.total_fees_usd, dec!(2.0068));
        assert_eq!(resp.trade_count, 1);
        assert_eq!(resp.wins, 1);
        assert_eq!(resp.losses, 0);
        assert_eq!(resp.todays_profit_usd, dec!(5.80));
    }

    #[tokio::test]
    async fn test_todays_profit_skips_older_trades() {
        let state = test_state();

        let mut old = make_record(dec!(100), dec!(10100));
        old.timestamp = Utc::now() - Duration::days(2);
        state.record_trade(&old).await;
        state
            .record_trade(&make_record(dec!(5.80), dec!(10105.80)))
            .await;

        let Json(resp) = get_status(State(state)).await;
        assert_eq!(resp.todays_profit_usd, dec!(5.80));
    }

    #[tokio::test]
    async fn test_record_cycle_updates_prices_and_opportunities() {
        let state = test_state();

        let mut snapshot = PriceSnapshot::new();
        snapshot.insert("coinbase".to_string(), dec!(64000));
        snapshot.insert("binance_us".to_string(), dec!(64500));

        let opp = Opportunity {
            buy_from: "coinbase".to_string(),
            sell_to: "binance_us".to_string(),
            buy_price: dec!(64000),
            sell_price: dec!(64500),
            spread_pct: dec!(0.78),
            estimated_profit_usd: dec!(7.80),
        };

        state
            .record_cycle(&snapshot, Some(dec!(0.78)), std::slice::from_ref(&opp))
            .await;

        let Json(prices) = get_prices(State(state.clone())).await;
        assert_eq!(prices.get("coinbase"), Some(&dec!(64000)));

        let Json(opps) = get_opportunities(State(state.clone())).await;
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].buy_from, "coinbase");

        let Json(spread) = get_spread(State(state)).await;
        assert_eq!(spread.len(), 1);
        assert_eq!(spread[0].spread_pct, dec!(0.78));
    }

    #[tokio::test]
    async fn test_record_cycle_without_spread_adds_no_point() {
        let state = test_state();
        state.record_cycle(&PriceSnapshot::new(), None, &[]).await;

        let Json(spread) = get_spread(State(state)).await;
        assert!(spread.is_empty());
    }

    #[tokio::test]
    async fn test_spread_history_bounded() {
        let state = test_state();
        let snapshot = PriceSnapshot::new();

        for i in 0..(SPREAD_HISTORY_LIMIT + 5) {
            state
                .record_cycle(&snapshot, Some(Decimal::from(i as u64)), &[])
                .await;
        }

        let Json(spread) = get_spread(State(state)).await;
        assert_eq!(spread.len(), SPREAD_HISTORY_LIMIT);
        // Oldest points were dropped.
        assert_eq!(spread[0].spread_pct, Decimal::from(5u64));
    }

    #[tokio::test]
    async fn test_get_trades_latest_first() {
        let state = test_state();
        state.record_trade(&make_record(dec!(1), dec!(10001))).await;
        state.record_trade(&make_record(dec!(2), dec!(10003))).await;
        state.record_trade(&make_record(dec!(3), dec!(10006))).await;

        let Json(trades) = get_trades(State(state)).await;
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].profit_usd, dec!(3));
        assert_eq!(trades[2].profit_usd, dec!(1));
    }
}
