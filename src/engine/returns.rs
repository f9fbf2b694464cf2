// =============================================================================
// Period Returns — lookbacks over the persisted index history
// =============================================================================
//
// Every lookback is the same ratio: the latest level against the latest
// history point at or before its reference date. Weekends and gaps are
// handled by that "at or before", and a young history simply reports fewer
// returns; None is an answer here, never an error.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::store::History;

/// The standard lookbacks handed to the presentation layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PeriodReturns {
    pub r1d: Option<f64>,
    pub r7d: Option<f64>,
    pub r30d: Option<f64>,
    pub mtd: Option<f64>,
    pub ytd: Option<f64>,
}

/// Return in percent over the latest point at or before `today − days`.
///
/// `None` with fewer than two history points, with no eligible reference
/// point, or with a zero reference level.
pub fn period_return(history: &History, today: NaiveDate, days: u64) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }
    let reference_date = today.checked_sub_days(Days::new(days))?;
    ratio_to_reference(history, reference_date)
}

/// Return in percent against the latest point at or before `anchor`.
/// Calendar anchors skip the two-point guard: on the anchor date itself a
/// single-point history legitimately answers 0.0.
fn ratio_to_reference(history: &History, anchor: NaiveDate) -> Option<f64> {
    let current = history.latest()?.level;
    let reference = history.level_on_or_before(anchor)?;
    if reference == 0.0 {
        return None;
    }
    Some((current / reference - 1.0) * 100.0)
}

/// Compute the 1/7/30-day, month-to-date, and year-to-date returns.
pub fn period_returns(history: &History, today: NaiveDate) -> PeriodReturns {
    let month_start = today.with_day(1);
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1);
    PeriodReturns {
        r1d: period_return(history, today, 1),
        r7d: period_return(history, today, 7),
        r30d: period_return(history, today, 30),
        mtd: month_start.and_then(|anchor| ratio_to_reference(history, anchor)),
        ytd: year_start.and_then(|anchor| ratio_to_reference(history, anchor)),
    }
}
