// =============================================================================
// Index Computation — rebased level, daily change, breadth, movers
// =============================================================================
//
// The index level is the weighted basket value rebased so the very first
// run reads exactly 100.0; everything after is relative to that anchor.
// The previous-day value reuses today's weights against each asset's
// implied previous close, so the daily change isolates price movement from
// weight drift.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::weights::WeightedAsset;

/// Point-in-time value of the weighted basket against its base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub date: NaiveDate,
    /// Σ current_price × weight across the basket.
    pub today_value: f64,
    /// Σ previous_price × weight; assets without a previous price skipped.
    pub prev_value: f64,
    /// The persisted rebasing anchor.
    pub base_value: f64,
    /// today_value / base_value × 100. Exactly 100.0 on the base date.
    pub index_level: f64,
    /// Day-over-day change in percent; 0.0 when the previous value is 0.
    pub daily_change_pct: f64,
}

/// Advancer/decliner counts across the basket. Assets without a previous
/// price count in neither bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Breadth {
    pub advancers: usize,
    pub decliners: usize,
}

/// Weighted sum of current prices.
pub fn today_value(assets: &[WeightedAsset]) -> f64 {
    assets
        .iter()
        .map(|a| a.quote.current_price * a.capped_weight)
        .sum()
}

/// Weighted sum of implied previous closes. Assets without one contribute
/// nothing, mirroring how they are excluded from per-asset stats.
pub fn prev_value(assets: &[WeightedAsset]) -> f64 {
    assets
        .iter()
        .filter_map(|a| a.quote.previous_price().map(|p| p * a.capped_weight))
        .sum()
}

/// Assemble the day's snapshot from basket values and the persisted base.
pub fn build_snapshot(date: NaiveDate, today: f64, prev: f64, base: f64) -> IndexSnapshot {
    let index_level = if base != 0.0 { today / base * 100.0 } else { 0.0 };
    let daily_change_pct = if prev != 0.0 {
        (today / prev - 1.0) * 100.0
    } else {
        0.0
    };
    IndexSnapshot {
        date,
        today_value: today,
        prev_value: prev,
        base_value: base,
        index_level,
        daily_change_pct,
    }
}

/// Count advancers and decliners by 24 h price change.
pub fn breadth(assets: &[WeightedAsset]) -> Breadth {
    let advancers = assets
        .iter()
        .filter(|a| a.price_change_pct.map_or(false, |p| p > 0.0))
        .count();
    let decliners = assets
        .iter()
        .filter(|a| a.price_change_pct.map_or(false, |p| p < 0.0))
        .count();
    Breadth {
        advancers,
        decliners,
    }
}

/// Top `n` assets by 24 h change, descending. The sort is stable so ties
/// keep input order, and assets without a change sort last.
pub fn top_gainers(assets: &[WeightedAsset], n: usize) -> Vec<WeightedAsset> {
    let mut sorted = assets.to_vec();
    sorted.sort_by(|a, b| {
        let a_chg = a.price_change_pct.unwrap_or(f64::NEG_INFINITY);
        let b_chg = b.price_change_pct.unwrap_or(f64::NEG_INFINITY);
        b_chg
            .partial_cmp(&a_chg)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

/// Bottom `n` assets by 24 h change, ascending. Assets without a change
/// still sort last rather than masquerading as the day's worst performers.
pub fn top_losers(assets: &[WeightedAsset], n: usize) -> Vec<WeightedAsset> {
    let mut sorted = assets.to_vec();
    sorted.sort_by(|a, b| {
        let a_chg = a.price_change_pct.unwrap_or(f64::INFINITY);
        let b_chg = b.price_change_pct.unwrap_or(f64::INFINITY);
        a_chg
            .partial_cmp(&b_chg)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetQuote;

    fn asset(symbol: &str, price: f64, weight: f64, chg: Option<f64>) -> WeightedAsset {
        let change_pct_24h = chg.unwrap_or(0.0);
        let quote = AssetQuote {
            id: symbol.to_lowercase(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            // A zero price models "no quote", which also kills the
            // previous price and the change stat.
            current_price: if chg.is_some() { price } else { 0.0 },
            market_cap: 1.0e10,
            total_volume: 1.0e8,
            change_pct_24h,
        };
        WeightedAsset {
            quote,
            raw_weight: weight,
            capped_weight: weight,
            price_change_pct: chg,
            contribution: chg.map(|c| c * weight),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn basket_values_are_weighted_sums() {
        let assets = vec![
            asset("BTC", 102.0, 0.5, Some(2.0)),
            asset("ETH", 50.0, 0.5, Some(0.0)),
        ];
        assert!((today_value(&assets) - 76.0).abs() < 1e-10);
        // Previous closes: 100.0 and 50.0.
        assert!((prev_value(&assets) - 75.0).abs() < 1e-10);
    }

    #[test]
    fn prev_value_skips_assets_without_a_previous_price() {
        let assets = vec![
            asset("BTC", 102.0, 0.5, Some(2.0)),
            asset("XXX", 0.0, 0.5, None),
        ];
        assert!((prev_value(&assets) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn snapshot_rebases_against_the_base_value() {
        let snap = build_snapshot(date(2026, 8, 23), 102.0, 100.0, 100.0);
        assert!((snap.index_level - 102.0).abs() < 1e-10);
        assert!((snap.daily_change_pct - 2.0).abs() < 1e-10);
    }

    #[test]
    fn first_run_reads_exactly_one_hundred() {
        // On the base date today's value IS the base value.
        let snap = build_snapshot(date(2026, 8, 23), 76.0, 75.0, 76.0);
        assert!((snap.index_level - 100.0).abs() < 1e-10);
    }

    #[test]
    fn zero_previous_value_reports_a_flat_day() {
        let snap = build_snapshot(date(2026, 8, 23), 76.0, 0.0, 76.0);
        assert!((snap.daily_change_pct - 0.0).abs() < 1e-10);
    }

    #[test]
    fn breadth_ignores_assets_without_a_change() {
        let assets = vec![
            asset("BTC", 102.0, 0.25, Some(2.0)),
            asset("ETH", 49.0, 0.25, Some(-2.0)),
            asset("SOL", 150.0, 0.25, Some(0.0)),
            asset("XXX", 0.0, 0.25, None),
        ];
        let b = breadth(&assets);
        assert_eq!(b.advancers, 1);
        assert_eq!(b.decliners, 1);
    }

    #[test]
    fn gainers_descend_and_losers_ascend() {
        let assets = vec![
            asset("BTC", 102.0, 0.25, Some(2.0)),
            asset("ETH", 49.0, 0.25, Some(-2.0)),
            asset("SOL", 165.0, 0.25, Some(10.0)),
            asset("DOGE", 0.09, 0.25, Some(-8.0)),
        ];

        let gainers = top_gainers(&assets, 3);
        let symbols: Vec<&str> = gainers.iter().map(|a| a.quote.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SOL", "BTC", "ETH"]);

        let losers = top_losers(&assets, 3);
        let symbols: Vec<&str> = losers.iter().map(|a| a.quote.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["DOGE", "ETH", "BTC"]);
    }

    #[test]
    fn assets_without_a_change_sort_last_in_both_directions() {
        let assets = vec![
            asset("XXX", 0.0, 0.25, None),
            asset("BTC", 102.0, 0.25, Some(2.0)),
            asset("ETH", 49.0, 0.25, Some(-2.0)),
        ];

        let gainers = top_gainers(&assets, 3);
        assert_eq!(gainers.last().unwrap().quote.symbol, "XXX");
        let losers = top_losers(&assets, 3);
        assert_eq!(losers.last().unwrap().quote.symbol, "XXX");
    }

    #[test]
    fn ties_keep_input_order() {
        let assets = vec![
            asset("BTC", 102.0, 0.25, Some(2.0)),
            asset("ETH", 51.0, 0.25, Some(2.0)),
            asset("SOL", 153.0, 0.25, Some(2.0)),
        ];
        let gainers = top_gainers(&assets, 3);
        let symbols: Vec<&str> = gainers.iter().map(|a| a.quote.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);
    }

    #[test]
    fn mover_lists_respect_the_requested_length() {
        let assets = vec![
            asset("BTC", 102.0, 0.5, Some(2.0)),
            asset("ETH", 49.0, 0.5, Some(-2.0)),
        ];
        assert_eq!(top_gainers(&assets, 3).len(), 2);
        assert_eq!(top_gainers(&assets, 1).len(), 1);
    }
}
