//! ARBWATCH — Cross-Exchange Crypto Arbitrage Monitor
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the virtual ledger from disk (or seeds it fresh), and runs
//! the main poll→detect→execute loop with graceful shutdown.

use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use arbwatch::config;
use arbwatch::dashboard;
use arbwatch::dashboard::routes::DashboardState;
use arbwatch::engine::detector::{DetectorConfig, OpportunityDetector};
use arbwatch::engine::executor::{LedgerConfig, LedgerExecutor};
use arbwatch::engine::feed::PriceFeed;
use arbwatch::exchanges;
use arbwatch::notify::TelegramNotifier;
use arbwatch::storage::LedgerStore;
use arbwatch::types::{SelectionStrategy, TradeRecord};

const BANNER: &str = r#"
    _    ____  ______        ___  _____ ____ _   _
   / \  |  _ \| __ ) \      / / \|_   _/ ___| | | |
  / _ \ | |_) |  _ \\ \ /\ / / _ \ | || |   | |_| |
 / ___ \|  _ <| |_) |\ V  V / ___ \| || |___|  _  |
/_/   \_\_| \_\____/  \_/\_/_/   \_\_| \____|_| |_|

  Cross-Exchange Crypto Arbitrage Monitor
  v0.1.0 — Paper Trading Agent
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;
    cfg.validate()?;

    // Initialise structured logging
    init_logging(&cfg);

    // Print startup banner
    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        trading_pair = %cfg.agent.trading_pair,
        poll_interval_secs = cfg.agent.poll_interval_secs,
        min_spread_pct = %cfg.arbitrage.min_spread_pct,
        selection = %cfg.arbitrage.selection,
        "ARBWATCH starting up"
    );

    // -- Restore or seed the ledger ---------------------------------------

    let store = LedgerStore::new(&cfg.storage.state_file);
    let mut executor = LedgerExecutor::open(
        store,
        LedgerConfig {
            initial_balance_usd: cfg.trade.initial_balance_usd,
            trade_amount_usd: cfg.trade.amount_usd,
            fee_pct: cfg.trade.fee_pct,
        },
    )?;

    // -- Initialise components -------------------------------------------

    // Exchange clients
    let clients = exchanges::build_clients(&cfg.exchanges)?;
    if clients.len() < 2 {
        warn!(
            sources = clients.len(),
            "Fewer than two price sources enabled — no spread can ever be detected"
        );
    }
    let feed = PriceFeed::new(clients);

    let detector = OpportunityDetector::new(DetectorConfig {
        min_spread_pct: cfg.arbitrage.min_spread_pct,
        trade_amount_usd: cfg.trade.amount_usd,
        fee_pct: cfg.trade.fee_pct,
    });

    let notifier = TelegramNotifier::from_config(&cfg.notifier.telegram)?;
    if notifier.is_enabled() {
        info!("Telegram notifications enabled");
    }

    // Dashboard (optional)
    let dashboard = if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(
            cfg.agent.trading_pair.clone(),
            executor.state().clone(),
        ));
        dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port)?;
        Some(state)
    } else {
        None
    };

    // -- Main loop -------------------------------------------------------

    let poll_interval = Duration::from_secs(cfg.agent.poll_interval_secs);
    let mut interval = tokio::time::interval(poll_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.agent.poll_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    let mut cycle: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                cycle += 1;
                match run_cycle(
                    &feed,
                    &detector,
                    cfg.arbitrage.selection,
                    &notifier,
                    dashboard.as_deref(),
                    &mut executor,
                )
                .await
                {
                    Ok(outcome) => log_cycle(cycle, &outcome, &executor),
                    Err(e) => error!(error = %e, "Cycle failed — continuing to next"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(
        balance = format!("${}", executor.balance()),
        fees = format!("${}", executor.total_fees()),
        trades = executor.trade_count(),
        wins = executor.state().wins(),
        losses = executor.state().losses(),
        "ARBWATCH shut down cleanly."
    );

    Ok(())
}

/// What a single poll→detect→execute cycle produced.
#[derive(Debug, Default)]
struct CycleOutcome {
    sources_polled: usize,
    best_spread: Option<Decimal>,
    opportunities_found: usize,
    executed: Option<TradeRecord>,
}

/// Run a single poll→detect→notify→execute cycle.
async fn run_cycle(
    feed: &PriceFeed,
    detector: &OpportunityDetector,
    selection: SelectionStrategy,
    notifier: &TelegramNotifier,
    dashboard: Option<&DashboardState>,
    executor: &mut LedgerExecutor,
) -> Result<CycleOutcome> {
    // 1. Poll all sources concurrently
    let snapshot = feed.fetch_snapshot().await;
    let sources_polled = snapshot.len();

    if sources_polled < 2 {
        warn!(
            sources = sources_polled,
            "Not enough live prices this cycle, skipping detection"
        );
        if let Some(dash) = dashboard {
            dash.record_cycle(&snapshot, None, &[]).await;
        }
        return Ok(CycleOutcome {
            sources_polled,
            ..Default::default()
        });
    }

    // 2. Detect opportunities
    let best_spread = OpportunityDetector::best_spread(&snapshot);
    let mut opportunities = detector.find_opportunities(&snapshot);
    let opportunities_found = opportunities.len();

    if selection == SelectionStrategy::BestProfit {
        opportunities = OpportunityDetector::rank_by_profit(opportunities);
    }

    // 3. Alert on the top pick before committing the trade
    if let Some(top) = opportunities.first() {
        info!(opportunity = %top, "Arbitrage opportunity detected");
        notifier
            .send(&TelegramNotifier::format_opportunity(top))
            .await;
    }

    // 4. Execute against the virtual ledger (persists on success)
    let executed = executor.execute(&opportunities)?;

    if let Some(record) = &executed {
        notifier.send(&TelegramNotifier::format_trade(record)).await;
    }

    // 5. Publish the cycle to the dashboard
    if let Some(dash) = dashboard {
        dash.record_cycle(&snapshot, best_spread, &opportunities)
            .await;
        if let Some(record) = &executed {
            dash.record_trade(record).await;
        }
    }

    Ok(CycleOutcome {
        sources_polled,
        best_spread,
        opportunities_found,
        executed,
    })
}

/// Log a human-readable cycle summary.
fn log_cycle(cycle: u64, outcome: &CycleOutcome, executor: &LedgerExecutor) {
    let best_spread = outcome
        .best_spread
        .map(|s| format!("{s}%"))
        .unwrap_or_else(|| "-".to_string());

    info!(
        cycle,
        sources = outcome.sources_polled,
        best_spread = %best_spread,
        opportunities = outcome.opportunities_found,
        traded = outcome.executed.is_some(),
        balance = format!("${}", executor.balance()),
        "Cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::AppConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arbwatch=info"));

    let json_logging = std::env::var("ARBWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    let _ = cfg;
}
