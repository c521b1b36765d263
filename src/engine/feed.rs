//! Price feed — one snapshot of every enabled exchange per poll cycle.
//!
//! Produces a `PriceSnapshot` (exchange id → last USD price). Sources are
//! queried concurrently; a source that errors is logged and left out of
//! the snapshot, and the detector treats a thin snapshot as "nothing to
//! compare" rather than a failure.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::exchanges::ExchangeClient;
use crate::types::PriceSnapshot;

/// Polls a set of exchange clients and assembles per-cycle snapshots.
pub struct PriceFeed {
    clients: Vec<Box<dyn ExchangeClient>>,
}

impl PriceFeed {
    /// Create a feed over the given exchange clients.
    pub fn new(clients: Vec<Box<dyn ExchangeClient>>) -> Self {
        Self { clients }
    }

    /// Number of exchange sources this feed polls.
    pub fn exchange_count(&self) -> usize {
        self.clients.len()
    }

    /// Fetch the latest price from every source concurrently.
    ///
    /// Never fails: a source that errors is skipped for this cycle and the
    /// snapshot simply carries fewer entries.
    pub async fn fetch_snapshot(&self) -> PriceSnapshot {
        let fetches = self
            .clients
            .iter()
            .map(|client| async move { (client.name(), client.last_price().await) });

        let mut snapshot = PriceSnapshot::new();
        for (exchange, result) in join_all(fetches).await {
            match result {
                Ok(price) => {
                    debug!(exchange = exchange, price = %price, "Price fetched");
                    snapshot.insert(exchange.to_string(), price);
                }
                Err(e) => {
                    warn!(exchange = exchange, error = %e, "Price fetch failed, skipping source this cycle");
                }
            }
        }

        snapshot
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
