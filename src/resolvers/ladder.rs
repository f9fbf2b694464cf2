// =============================================================================
// Fallback Ladder — ordered multi-source resolution with cache fallback
// =============================================================================
//
// Every auxiliary signal climbs the same shape of ladder: an ordered list of
// alternative sources tried strictly in sequence until one answers, then the
// last-known-good cached value, then nothing. The label of whichever rung
// satisfied the request becomes the provenance tag the report carries, so a
// reader can always tell a live number from a stale one.
//
// Stage futures are built lazily: a rung below the first success is never
// polled, so no request is ever issued for it.

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Provenance tag for a value served from the cache.
pub const SOURCE_CACHE: &str = "cache";
/// Provenance tag for a signal that could not be resolved at all.
pub const SOURCE_UNAVAILABLE: &str = "unavailable";

/// One rung of a fallback ladder: a provenance label plus the fetch that
/// backs it.
pub struct Stage<'a, T> {
    pub label: &'static str,
    pub fetch: BoxFuture<'a, anyhow::Result<T>>,
}

impl<'a, T> Stage<'a, T> {
    pub fn new(label: &'static str, fetch: BoxFuture<'a, anyhow::Result<T>>) -> Self {
        Self { label, fetch }
    }
}

/// Outcome of climbing a ladder: the value, if any, and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: Option<T>,
    pub source: String,
}

/// Try `stages` in order and return the first success with its label.
///
/// Per-rung failures are logged at debug and swallowed; only full
/// exhaustion surfaces, as [`EngineError::SourceExhausted`].
pub async fn climb<T>(
    signal: &str,
    stages: Vec<Stage<'_, T>>,
) -> Result<(T, &'static str), EngineError> {
    for stage in stages {
        match stage.fetch.await {
            Ok(value) => {
                debug!(signal, source = stage.label, "ladder rung answered");
                return Ok((value, stage.label));
            }
            Err(e) => {
                debug!(signal, source = stage.label, error = %e, "ladder rung failed, trying next");
            }
        }
    }
    Err(EngineError::SourceExhausted {
        signal: signal.to_string(),
    })
}

/// Climb the ladder, falling back to `cached` (tag "cache") on exhaustion,
/// then to nothing (tag "unavailable"). Never fails; a degraded signal is
/// the caller's to tolerate.
pub async fn resolve_with_fallback<T>(
    signal: &str,
    stages: Vec<Stage<'_, T>>,
    cached: Option<T>,
) -> Resolved<T> {
    match climb(signal, stages).await {
        Ok((value, label)) => Resolved {
            value: Some(value),
            source: label.to_string(),
        },
        Err(e) => {
            if cached.is_some() {
                warn!(signal, error = %e, "falling back to cached value");
                Resolved {
                    value: cached,
                    source: SOURCE_CACHE.to_string(),
                }
            } else {
                warn!(signal, error = %e, "no cached value either, signal unavailable");
                Resolved {
                    value: None,
                    source: SOURCE_UNAVAILABLE.to_string(),
                }
            }
        }
    }
}
