// =============================================================================
// Error Taxonomy
// =============================================================================
//
// Four failure families with distinct propagation rules:
//   - Fetch:           one upstream request failed after its bounded retries;
//                      the caller decides whether a fallback ladder continues.
//   - SourceExhausted: every stage of a fallback ladder failed. Fatal for the
//                      market snapshot, degraded-but-tolerated for the
//                      auxiliary signals.
//   - Validation:      a resolved value failed a sanity check (e.g. the FX
//                      rate landed outside its plausibility band).
//   - Persistence:     a best-effort write failed. Logged, never propagated.

use thiserror::Error;

/// All errors produced by the engine core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A single upstream request failed after exhausting its retry budget.
    #[error("fetch failed after {attempts} attempts: {url}: {last}")]
    Fetch {
        url: String,
        attempts: u32,
        last: String,
    },

    /// Every stage of a fallback ladder failed.
    #[error("all sources exhausted for signal '{signal}'")]
    SourceExhausted { signal: String },

    /// A resolved numeric value failed a sanity check.
    #[error("validation failed for {what}: {value} outside [{min}, {max}]")]
    Validation {
        what: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A best-effort durable write failed.
    #[error("persistence failed for {what}: {reason}")]
    Persistence { what: String, reason: String },
}
