// =============================================================================
// Index Engine
// =============================================================================
//
// Pure computation over the resolved snapshot: capped market-cap weighting,
// the rebased index level, per-asset statistics, breadth, movers, and the
// period returns read out of the persisted history. Nothing in here does
// I/O, so every rule is unit-testable with hand-built fixtures.

pub mod index;
pub mod returns;
pub mod weights;

pub use index::{
    breadth, build_snapshot, prev_value, today_value, top_gainers, top_losers, Breadth,
    IndexSnapshot,
};
pub use returns::{period_return, period_returns, PeriodReturns};
pub use weights::{cap_for, compute_weights, WeightedAsset};
