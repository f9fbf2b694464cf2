// =============================================================================
// Signal Resolvers
// =============================================================================
//
// Three independent resolution chains feed the engine:
//   1. Market snapshot        — single source, fatal on failure.
//   2. Cross-market price gap — three sub-ladders with whole-record cache
//                               fallback.
//   3. Perpetual funding      — four venue × instrument ladders with
//                               per-slot cache fallback.
// Ladders share `ladder::resolve_with_fallback`, and every upstream body is
// defused against missing, null, and stringly-typed numeric fields.

pub mod funding;
pub mod ladder;
pub mod market;
pub mod price_gap;

pub use funding::{FundingBundle, FundingResolver, FundingSignal};
pub use ladder::{resolve_with_fallback, Resolved, Stage};
pub use market::MarketResolver;
pub use price_gap::{PriceGapProvenance, PriceGapResolver, PriceGapSignal};

/// Parse a JSON value that may arrive as a number or a numeric string.
/// Venues disagree on which one a rate is.
pub(crate) fn json_f64(value: &serde_json::Value) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    value.as_str().and_then(|s| s.parse().ok())
}
