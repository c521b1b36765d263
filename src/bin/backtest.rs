//! Offline replay entry point.
//!
//! Usage: `arbwatch-backtest <prices.csv> [trades-out.csv]`
//!
//! Loads `config.toml` for thresholds and fees, replays the recorded
//! price history through the live detector and executor, prints a
//! summary report, and optionally exports the trade log as CSV.

use anyhow::Result;
use tracing::info;

use arbwatch::backtest::runner::{export_trade_csv, load_price_csv, Backtester};
use arbwatch::config::AppConfig;
use arbwatch::engine::detector::{DetectorConfig, OpportunityDetector};
use arbwatch::engine::executor::LedgerConfig;

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let Some(prices_path) = args.get(1) else {
        eprintln!("Usage: {} <prices.csv> [trades-out.csv]", args[0]);
        std::process::exit(2);
    };
    let export_path = args.get(2);

    let cfg = AppConfig::load("config.toml")?;
    cfg.validate()?;

    info!(
        min_spread_pct = %cfg.arbitrage.min_spread_pct,
        selection = %cfg.arbitrage.selection,
        trade_amount = %format!("${}", cfg.trade.amount_usd),
        "Replay configured"
    );

    let backtester = Backtester::new(
        OpportunityDetector::new(DetectorConfig {
            min_spread_pct: cfg.arbitrage.min_spread_pct,
            trade_amount_usd: cfg.trade.amount_usd,
            fee_pct: cfg.trade.fee_pct,
        }),
        cfg.arbitrage.selection,
        LedgerConfig {
            initial_balance_usd: cfg.trade.initial_balance_usd,
            trade_amount_usd: cfg.trade.amount_usd,
            fee_pct: cfg.trade.fee_pct,
        },
    );

    let points = load_price_csv(prices_path)?;
    let report = backtester.run(&points)?;

    println!();
    println!("Backtest complete — {} points replayed", report.points_replayed);
    println!("Total Trades:    {}", report.total_trades);
    println!("Winning Trades:  {}", report.wins);
    println!("Losing Trades:   {}", report.losses);
    println!("Final Virtual Balance: ${}", report.final_balance_usd);
    println!("Total Profit Earned:   ${}", report.total_profit_usd);
    println!("Total Fees Paid:       ${}", report.total_fees_usd);
    println!(
        "Average Profit Margin per Trade: {}%",
        report.avg_profit_margin_pct
    );

    if let Some(path) = export_path {
        if report.trade_history.is_empty() {
            println!("No trades were executed; history not saved.");
        } else {
            export_trade_csv(&report.trade_history, path)?;
            println!("Trade history saved to {path}");
        }
    }

    Ok(())
}

/// Initialise the `tracing` subscriber for the CLI.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arbwatch=info"));

    fmt().with_env_filter(env_filter).with_target(false).init();
}
