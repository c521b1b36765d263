//! Historical replay engine.
//!
//! Feeds recorded price snapshots through the same detector and executor
//! the live loop uses, against a throwaway in-memory ledger, and reports
//! trade counts, win/loss split, final balance, fees paid, and average
//! profit margin.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::engine::detector::OpportunityDetector;
use crate::engine::executor::{LedgerConfig, LedgerExecutor};
use crate::types::{PriceSnapshot, SelectionStrategy, TradeRecord};

// ---------------------------------------------------------------------------
// Recorded price data
// ---------------------------------------------------------------------------

/// One recorded observation — a timestamp and the per-exchange prices
/// seen at that moment.
#[derive(Debug, Clone)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub prices: PriceSnapshot,
}

/// Load a recorded price series from CSV.
///
/// Expected layout: a `timestamp` column (RFC 3339) followed by one price
/// column per exchange:
///
/// ```text
/// timestamp,coinbase,binance_us
/// 2026-02-21T12:00:00Z,64000.0,64500.0
/// ```
///
/// An empty cell means that exchange had no quote at that point; the row
/// is still replayed with whatever quotes remain.
pub fn load_price_csv(path: impl AsRef<Path>) -> Result<Vec<PricePoint>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read price history {}", path.display()))?;

    let mut lines = contents.lines().enumerate();

    let (_, header) = lines
        .next()
        .context("Price history is empty — expected a header row")?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    if columns.first() != Some(&"timestamp") {
        bail!("Price history header must start with 'timestamp', got {header:?}");
    }
    let exchanges: Vec<String> = columns[1..].iter().map(|s| s.to_string()).collect();
    if exchanges.is_empty() {
        bail!("Price history has no exchange columns");
    }

    let mut points = Vec::new();
    for (idx, line) in lines {
        // 1-based row numbers, matching what an editor shows.
        let row = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() != exchanges.len() + 1 {
            bail!(
                "Row {row}: expected {} cells, got {}",
                exchanges.len() + 1,
                cells.len()
            );
        }

        let timestamp = DateTime::parse_from_rfc3339(cells[0])
            .with_context(|| format!("Row {row}: bad timestamp {:?}", cells[0]))?
            .with_timezone(&Utc);

        let mut prices = PriceSnapshot::new();
        for (exchange, cell) in exchanges.iter().zip(&cells[1..]) {
            if cell.is_empty() {
                continue;
            }
            let price: Decimal = cell
                .parse()
                .with_context(|| format!("Row {row}: bad price {cell:?} for {exchange}"))?;
            prices.insert(exchange.clone(), price);
        }

        points.push(PricePoint { timestamp, prices });
    }

    info!(points = points.len(), file = %path.display(), "Price history loaded");
    Ok(points)
}

// ---------------------------------------------------------------------------
// Replay results
// ---------------------------------------------------------------------------

/// Complete replay performance report.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub points_replayed: usize,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub initial_balance_usd: Decimal,
    pub final_balance_usd: Decimal,
    pub total_profit_usd: Decimal,
    pub total_fees_usd: Decimal,
    /// Mean per-trade profit as a percentage of committed notional,
    /// rounded to 4 places. Zero when no trades executed.
    pub avg_profit_margin_pct: Decimal,
    /// Per-trade log in execution order.
    pub trade_history: Vec<TradeRecord>,
}

// ---------------------------------------------------------------------------
// Backtester
// ---------------------------------------------------------------------------

pub struct Backtester {
    detector: OpportunityDetector,
    selection: SelectionStrategy,
    ledger_config: LedgerConfig,
}

impl Backtester {
    pub fn new(
        detector: OpportunityDetector,
        selection: SelectionStrategy,
        ledger_config: LedgerConfig,
    ) -> Self {
        Self {
            detector,
            selection,
            ledger_config,
        }
    }

    /// Replay a recorded series in order.
    ///
    /// Each point runs one detect→select→execute pass, stamping any
    /// resulting trade with the point's own timestamp — exactly what the
    /// live loop would have done at that moment. The ledger is fresh and
    /// in-memory: replays never touch the live state file.
    pub fn run(&self, points: &[PricePoint]) -> Result<BacktestReport> {
        let mut executor = LedgerExecutor::in_memory(self.ledger_config.clone());
        let initial_balance = executor.balance();

        for point in points {
            let mut opportunities = self.detector.find_opportunities(&point.prices);
            if opportunities.is_empty() {
                continue;
            }

            if self.selection == SelectionStrategy::BestProfit {
                opportunities = OpportunityDetector::rank_by_profit(opportunities);
            }

            if let Some(record) = executor.execute_at(&opportunities, point.timestamp)? {
                debug!(
                    timestamp = %record.timestamp,
                    profit = %format!("${}", record.profit_usd),
                    "Replay trade executed"
                );
            }
        }

        let state = executor.state();
        let total_trades = state.trade_count();
        let avg_profit_margin_pct = if total_trades > 0 {
            let sum: Decimal = state
                .trade_history
                .iter()
                .map(|t| t.profit_margin_pct())
                .sum();
            (sum / Decimal::from(total_trades as u64)).round_dp(4)
        } else {
            Decimal::ZERO
        };

        let report = BacktestReport {
            points_replayed: points.len(),
            total_trades,
            wins: state.wins(),
            losses: state.losses(),
            initial_balance_usd: initial_balance,
            final_balance_usd: state.usd_balance,
            total_profit_usd: (state.usd_balance - initial_balance).round_dp(2),
            total_fees_usd: state.total_fees,
            avg_profit_margin_pct,
            trade_history: state.trade_history.clone(),
        };

        info!(
            points = report.points_replayed,
            trades = report.total_trades,
            wins = report.wins,
            losses = report.losses,
            final_balance = %format!("${}", report.final_balance_usd),
            "Replay complete"
        );

        Ok(report)
    }
}

/// Write trades to CSV, one row per trade in execution order. Columns
/// match the persisted ledger's trade-record fields.
pub fn export_trade_csv(records: &[TradeRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    let mut out = String::from(
        "timestamp,buy_from,sell_to,buy_price,sell_price,amount_usd,profit_usd,balance_usd,fees_paid_usd\n",
    );
    for t in records {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            t.timestamp.to_rfc3339(),
            t.buy_from,
            t.sell_to,
            t.buy_price,
            t.sell_price,
            t.amount_usd,
            t.profit_usd,
            t.balance_usd,
            t.fees_paid_usd,
        ));
    }

    std::fs::write(path, out)
        .with_context(|| format!("Failed to write trade history {}", path.display()))?;

    info!(trades = records.len(), file = %path.display(), "Trade history exported");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
