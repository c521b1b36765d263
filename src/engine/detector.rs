//! Cross-exchange spread detection.
//!
//! Compares the last price of the monitored pair across exchanges and emits
//! an [`Opportunity`] for every direction whose spread beats the configured
//! minimum. Pure: no clocks, no I/O, no internal state beyond config.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::types::{Opportunity, PriceSnapshot};

// ---------------------------------------------------------------------------
// Configuration (defaults — overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

pub struct DetectorConfig {
    /// Minimum spread (percent units) for a direction to qualify.
    pub min_spread_pct: Decimal,
    /// USD notional the profit estimate is computed against.
    pub trade_amount_usd: Decimal,
    /// Round-trip fee rate (percent units) used by the estimate.
    pub fee_pct: Decimal,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_spread_pct: dec!(0.8),
            trade_amount_usd: dec!(1000),
            fee_pct: dec!(0.1),
        }
    }
}

// ---------------------------------------------------------------------------
// Opportunity detection
// ---------------------------------------------------------------------------

/// Scans a price snapshot for cross-exchange arbitrage opportunities.
pub struct OpportunityDetector {
    config: DetectorConfig,
}

impl OpportunityDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Access the detector configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Find all qualifying opportunities in the snapshot.
    ///
    /// Every unordered exchange pair is checked in BOTH directions, since
    /// the spread is relative to the buy price and therefore asymmetric.
    /// Fewer than two usable entries is a normal "nothing to compare" state
    /// and returns empty. Output order is pair/direction enumeration order
    /// (deterministic via the snapshot's sorted keys), NOT profit order;
    /// see [`Self::rank_by_profit`].
    pub fn find_opportunities(&self, prices: &PriceSnapshot) -> Vec<Opportunity> {
        let usable: Vec<(&str, Decimal)> = prices
            .iter()
            .filter(|(_, price)| **price > Decimal::ZERO)
            .map(|(name, price)| (name.as_str(), *price))
            .collect();

        if usable.len() < 2 {
            return Vec::new();
        }

        let mut opportunities = Vec::new();
        for i in 0..usable.len() {
            for j in (i + 1)..usable.len() {
                let (a, price_a) = usable[i];
                let (b, price_b) = usable[j];
                if let Some(opp) = self.check_direction(a, price_a, b, price_b) {
                    opportunities.push(opp);
                }
                if let Some(opp) = self.check_direction(b, price_b, a, price_a) {
                    opportunities.push(opp);
                }
            }
        }

        opportunities
    }

    /// Evaluate one direction: buy on `buy_from`, sell on `sell_to`.
    ///
    /// Qualification uses the full-precision spread; the stored
    /// `spread_pct` is rounded to 2 dp for reporting. The profit estimate
    /// applies the fee rate once on the whole round trip — execution
    /// re-prices with a per-leg fee model.
    fn check_direction(
        &self,
        buy_from: &str,
        buy_price: Decimal,
        sell_to: &str,
        sell_price: Decimal,
    ) -> Option<Opportunity> {
        let spread = (sell_price - buy_price) / buy_price * dec!(100);

        if spread < self.config.min_spread_pct {
            return None;
        }

        let fee_multiplier = Decimal::ONE - self.config.fee_pct / dec!(100);
        let estimated_profit =
            (sell_price - buy_price) * fee_multiplier * (self.config.trade_amount_usd / buy_price);

        debug!(
            buy_from,
            sell_to,
            spread = %format!("{:.2}%", spread),
            est_profit = %format!("${:.2}", estimated_profit),
            "Opportunity detected"
        );

        Some(Opportunity {
            buy_from: buy_from.to_string(),
            sell_to: sell_to.to_string(),
            buy_price,
            sell_price,
            spread_pct: spread.round_dp(2),
            estimated_profit_usd: estimated_profit.round_dp(2),
        })
    }

    /// Explicit ranking step: estimated profit descending, stable for ties.
    ///
    /// Kept separate from detection so the selection policy is a visible
    /// caller decision rather than an accident of enumeration order.
    pub fn rank_by_profit(mut opportunities: Vec<Opportunity>) -> Vec<Opportunity> {
        opportunities.sort_by(|a, b| b.estimated_profit_usd.cmp(&a.estimated_profit_usd));
        opportunities
    }

    /// Best directional spread in the snapshot regardless of threshold,
    /// rounded to 2 dp. Feeds the dashboard chart; `None` with fewer than
    /// two usable entries.
    pub fn best_spread(prices: &PriceSnapshot) -> Option<Decimal> {
        let usable: Vec<Decimal> = prices
            .values()
            .filter(|price| **price > Decimal::ZERO)
            .copied()
            .collect();

        if usable.len() < 2 {
            return None;
        }

        let mut best: Option<Decimal> = None;
        for i in 0..usable.len() {
            for j in 0..usable.len() {
                if i == j {
                    continue;
                }
                let spread = (usable[j] - usable[i]) / usable[i] * dec!(100);
                if best.map_or(true, |b| spread > b) {
                    best = Some(spread);
                }
            }
        }
        best.map(|b| b.round_dp(2))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, Decimal)]) -> PriceSnapshot {
        entries
            .iter()
            .map(|(name, price)| (name.to_string(), *price))
            .collect()
    }

    fn detector(min_spread_pct: Decimal) -> OpportunityDetector {
        OpportunityDetector::new(DetectorConfig {
            min_spread_pct,
            trade_amount_usd: dec!(1000),
            fee_pct: dec!(0.1),
        })
    }

    #[test]
    fn test_empty_snapshot() {
        let d = detector(dec!(2));
        assert!(d.find_opportunities(&PriceSnapshot::new()).is_empty());
    }

    #[test]
    fn test_single_exchange() {
        let d = detector(dec!(2));
        let prices = snapshot(&[("coinbase", dec!(64000))]);
        assert!(d.find_opportunities(&prices).is_empty());
    }

    #[test]
    fn test_no_direction_meets_threshold() {
        let d = detector(dec!(2));
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(100.5))]);
        assert!(d.find_opportunities(&prices).is_empty());
    }

    #[test]
    fn test_one_qualifying_direction() {
        let d = detector(dec!(2));
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(105))]);
        let opps = d.find_opportunities(&prices);

        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.buy_from, "a");
        assert_eq!(opp.sell_to, "b");
        assert_eq!(opp.buy_price, dec!(100));
        assert_eq!(opp.sell_price, dec!(105));
        assert_eq!(opp.spread_pct, dec!(5.00));
    }

    #[test]
    fn test_reverse_direction_spread() {
        // With the threshold low enough, both directions come back and the
        // losing one carries the asymmetric negative spread.
        let d = detector(dec!(-10));
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(105))]);
        let opps = d.find_opportunities(&prices);

        assert_eq!(opps.len(), 2);
        let reverse = opps.iter().find(|o| o.buy_from == "b").unwrap();
        assert_eq!(reverse.sell_to, "a");
        assert_eq!(reverse.spread_pct, dec!(-4.76));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let d = detector(dec!(5));
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(105))]);
        assert_eq!(d.find_opportunities(&prices).len(), 1);
    }

    #[test]
    fn test_estimated_profit_formula() {
        // (64500 - 64000) x (1 - 0.1/100) x (1000 / 64000)
        //   = 500 x 0.999 x 0.015625 = 7.8046875 -> 7.80
        let d = detector(dec!(0.5));
        let prices = snapshot(&[("coinbase", dec!(64000)), ("binance_us", dec!(64500))]);
        let opps = d.find_opportunities(&prices);

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].estimated_profit_usd, dec!(7.80));
        assert_eq!(opps[0].spread_pct, dec!(0.78));
    }

    #[test]
    fn test_spread_rounds_for_reporting_only() {
        // Full-precision spread 0.78125% qualifies against 0.785 even though
        // the reported value rounds to 0.78.
        let d = detector(dec!(0.78));
        let prices = snapshot(&[("a", dec!(64000)), ("b", dec!(64500))]);
        let opps = d.find_opportunities(&prices);
        assert_eq!(opps.len(), 1);

        let strict = detector(dec!(0.782));
        assert!(strict.find_opportunities(&prices).is_empty());
    }

    #[test]
    fn test_three_exchanges_enumerates_all_pairs() {
        let d = detector(dec!(0.5));
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(103)), ("c", dec!(106))]);
        let opps = d.find_opportunities(&prices);

        // Qualifying: a->b (3%), a->c (6%), b->c (~2.91%).
        assert_eq!(opps.len(), 3);
        assert_eq!(opps[0].buy_from, "a");
        assert_eq!(opps[0].sell_to, "b");
        assert_eq!(opps[1].buy_from, "a");
        assert_eq!(opps[1].sell_to, "c");
        assert_eq!(opps[2].buy_from, "b");
        assert_eq!(opps[2].sell_to, "c");
    }

    #[test]
    fn test_non_positive_prices_ignored() {
        let d = detector(dec!(2));
        let prices = snapshot(&[("a", dec!(0)), ("b", dec!(100))]);
        assert!(d.find_opportunities(&prices).is_empty());

        let prices = snapshot(&[("a", dec!(-5)), ("b", dec!(100)), ("c", dec!(110))]);
        let opps = d.find_opportunities(&prices);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].buy_from, "b");
    }

    #[test]
    fn test_rank_by_profit() {
        let d = detector(dec!(0.5));
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(103)), ("c", dec!(106))]);
        let opps = d.find_opportunities(&prices);

        // Enumeration order puts a->b first, but a->c is the most profitable.
        assert_eq!(opps[0].sell_to, "b");
        let ranked = OpportunityDetector::rank_by_profit(opps);
        assert_eq!(ranked[0].buy_from, "a");
        assert_eq!(ranked[0].sell_to, "c");
        assert!(ranked[0].estimated_profit_usd >= ranked[1].estimated_profit_usd);
        assert!(ranked[1].estimated_profit_usd >= ranked[2].estimated_profit_usd);
    }

    #[test]
    fn test_rank_by_profit_stable_on_ties() {
        let first = Opportunity {
            buy_from: "a".to_string(),
            sell_to: "b".to_string(),
            buy_price: dec!(100),
            sell_price: dec!(105),
            spread_pct: dec!(5),
            estimated_profit_usd: dec!(49.95),
        };
        let second = Opportunity {
            buy_from: "c".to_string(),
            sell_to: "d".to_string(),
            buy_price: dec!(200),
            sell_price: dec!(210),
            spread_pct: dec!(5),
            estimated_profit_usd: dec!(49.95),
        };
        let ranked = OpportunityDetector::rank_by_profit(vec![first.clone(), second.clone()]);
        assert_eq!(ranked[0], first);
        assert_eq!(ranked[1], second);
    }

    #[test]
    fn test_detection_is_pure() {
        let d = detector(dec!(2));
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(105))]);
        assert_eq!(d.find_opportunities(&prices), d.find_opportunities(&prices));
    }

    #[test]
    fn test_best_spread() {
        let prices = snapshot(&[("a", dec!(100)), ("b", dec!(105))]);
        assert_eq!(OpportunityDetector::best_spread(&prices), Some(dec!(5.00)));

        // Equal prices: best direction is flat.
        let flat = snapshot(&[("a", dec!(100)), ("b", dec!(100))]);
        assert_eq!(OpportunityDetector::best_spread(&flat), Some(dec!(0)));
    }

    #[test]
    fn test_best_spread_insufficient_data() {
        assert!(OpportunityDetector::best_spread(&PriceSnapshot::new()).is_none());
        let one = snapshot(&[("a", dec!(100))]);
        assert!(OpportunityDetector::best_spread(&one).is_none());
        let one_usable = snapshot(&[("a", dec!(100)), ("b", dec!(0))]);
        assert!(OpportunityDetector::best_spread(&one_usable).is_none());
    }
}
