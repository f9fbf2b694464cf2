// =============================================================================
// Daily Report — the plain-data handoff to the presentation layer
// =============================================================================
//
// Everything a renderer needs and nothing about rendering: the rebased
// snapshot, the weighted universe with per-asset stats, breadth, movers,
// both auxiliary signals with their provenance, the period returns, and
// the flagship trend series. Serializable end to end so the handoff can be
// a file, a queue message, or an in-process call.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::{Breadth, IndexSnapshot, PeriodReturns, WeightedAsset};
use crate::resolvers::{FundingBundle, PriceGapSignal};

/// Recent percent-change-from-start series for one flagship asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSeries {
    pub id: String,
    pub pct_series: Vec<f64>,
}

/// The complete output of one daily run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub index: IndexSnapshot,
    pub assets: Vec<WeightedAsset>,
    pub breadth: Breadth,
    pub top_gainers: Vec<WeightedAsset>,
    pub top_losers: Vec<WeightedAsset>,
    pub price_gap: PriceGapSignal,
    pub funding: FundingBundle,
    pub returns: PeriodReturns,
    pub trends: Vec<TrendSeries>,
}
