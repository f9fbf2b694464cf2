// =============================================================================
// Index Weighting — market-cap weights with caps and renormalisation
// =============================================================================
//
//   raw weight   = market_cap / Σ market_cap, × bonus when domestic-listed
//   capped       = min(raw, cap)              (dominant 0.30, others 0.15)
//   final weight = capped / Σ capped          (sums to exactly 1.0)
//
// Capping happens before renormalisation, so weight shaved off the heavy
// assets is redistributed proportionally across everyone, which can lift
// the final weights of small constituents above their raw share.

use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::types::AssetQuote;

/// A constituent with its computed weights and per-asset day statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedAsset {
    pub quote: AssetQuote,
    /// Market-cap share before capping, bonus applied.
    pub raw_weight: f64,
    /// Final capped, normalised weight; sums to 1.0 across the basket.
    pub capped_weight: f64,
    /// Day-over-day price change in percent; `None` without a previous
    /// price.
    pub price_change_pct: Option<f64>,
    /// Weighted absolute price move, `(current − previous) × weight`;
    /// `None` without a previous price.
    pub contribution: Option<f64>,
}

/// Weight ceiling for `symbol`: the dominant asset gets the higher cap.
pub fn cap_for(symbol: &str, config: &IndexConfig) -> f64 {
    if symbol == config.dominant_symbol {
        config.dominant_cap
    } else {
        config.other_cap
    }
}

/// Compute capped, normalised weights and per-asset statistics for the
/// selected universe.
///
/// The cap-sum divisor is floored at 1.0 so an all-zero-cap universe cannot
/// divide by zero; it yields zero weights instead.
pub fn compute_weights(quotes: &[AssetQuote], config: &IndexConfig) -> Vec<WeightedAsset> {
    let cap_sum: f64 = quotes.iter().map(|q| q.market_cap).sum::<f64>().max(1.0);

    let raw: Vec<f64> = quotes
        .iter()
        .map(|q| {
            let mut w = q.market_cap / cap_sum;
            if config.is_domestic(&q.id) {
                w *= config.domestic_bonus;
            }
            w
        })
        .collect();

    let capped: Vec<f64> = quotes
        .iter()
        .zip(&raw)
        .map(|(q, &w)| w.min(cap_for(&q.symbol, config)))
        .collect();
    let capped_sum: f64 = capped.iter().sum();

    quotes
        .iter()
        .zip(raw.iter().zip(&capped))
        .map(|(q, (&raw_weight, &capped))| {
            let weight = if capped_sum > 0.0 {
                capped / capped_sum
            } else {
                0.0
            };
            let previous = q.previous_price();
            // previous_price never returns Some(0.0), so these ratios are safe.
            let price_change_pct = previous.map(|p| (q.current_price / p - 1.0) * 100.0);
            let contribution = previous.map(|p| (q.current_price - p) * weight);
            WeightedAsset {
                quote: q.clone(),
                raw_weight,
                capped_weight: weight,
                price_change_pct,
                contribution,
            }
        })
        .collect()
}
