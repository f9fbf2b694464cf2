// =============================================================================
// Run Configuration — universe, weighting rules, and operational knobs
// =============================================================================
//
// Loaded from a JSON file once at startup. Every field carries a default so
// a partial (or absent) file still yields a runnable configuration, and the
// universe, listing set, caps, and bonus factor are data rather than code:
// a quarterly universe revision is a config edit, not a release.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// ---- Default values ----

fn default_universe() -> Vec<String> {
    [
        "bitcoin",
        "ethereum",
        "solana",
        "ripple",
        "binancecoin",
        "toncoin",
        "avalanche-2",
        "chainlink",
        "cardano",
        "polygon",
        "near",
        "polkadot",
        "cosmos",
        "litecoin",
        "arbitrum",
        "optimism",
        "internet-computer",
        "aptos",
        "filecoin",
        "sui",
        "dogecoin",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_domestic_listed() -> Vec<String> {
    // The whole default universe trades on domestic KRW venues.
    default_universe()
}

fn default_domestic_bonus() -> f64 {
    1.0
}

fn default_dominant_symbol() -> String {
    "BTC".to_string()
}

fn default_dominant_cap() -> f64 {
    0.30
}

fn default_other_cap() -> f64 {
    0.15
}

fn default_max_constituents() -> usize {
    20
}

fn default_top_movers() -> usize {
    3
}

fn default_timezone_offset_hours() -> i32 {
    9
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_fx_band_min() -> f64 {
    900.0
}

fn default_fx_band_max() -> f64 {
    2000.0
}

fn default_fx_fallback_rate() -> f64 {
    1350.0
}

fn default_market_fetch() -> FetchPolicy {
    FetchPolicy {
        max_attempts: 8,
        timeout_secs: 20,
        backoff_base_secs: 0.8,
        retry_after_cap_secs: 10.0,
    }
}

fn default_aux_fetch() -> FetchPolicy {
    FetchPolicy {
        max_attempts: 5,
        timeout_secs: 12,
        backoff_base_secs: 0.6,
        retry_after_cap_secs: 10.0,
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    12
}

fn default_backoff_base_secs() -> f64 {
    0.6
}

fn default_retry_after_cap_secs() -> f64 {
    10.0
}

// ---- Config structs ----

/// Retry discipline for one class of upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPolicy {
    /// Total attempts before the request is declared failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base of the linear backoff applied on 5xx and transport errors.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,
    /// Ceiling for honouring a 429 Retry-After header.
    #[serde(default = "default_retry_after_cap_secs")]
    pub retry_after_cap_secs: f64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        default_aux_fetch()
    }
}

/// Sanity band and last-resort value for the USD→KRW conversion rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxConfig {
    #[serde(default = "default_fx_band_min")]
    pub band_min: f64,
    #[serde(default = "default_fx_band_max")]
    pub band_max: f64,
    /// Used when the live rate is unavailable or lands outside the band.
    #[serde(default = "default_fx_fallback_rate")]
    pub fallback_rate: f64,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            band_min: default_fx_band_min(),
            band_max: default_fx_band_max(),
            fallback_rate: default_fx_fallback_rate(),
        }
    }
}

impl FxConfig {
    /// Whether `rate` is a plausible USD→KRW rate. Both edges inclusive.
    pub fn contains(&self, rate: f64) -> bool {
        (self.band_min..=self.band_max).contains(&rate)
    }
}

/// Everything one daily run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Candidate universe of provider asset ids; the top `max_constituents`
    /// by market capitalisation make the index.
    #[serde(default = "default_universe")]
    pub universe: Vec<String>,
    /// Asset ids listed on domestic KRW venues; these receive the bonus.
    #[serde(default = "default_domestic_listed")]
    pub domestic_listed: Vec<String>,
    /// Raw-weight multiplier for domestic-listed assets. 1.0 disables it.
    #[serde(default = "default_domestic_bonus")]
    pub domestic_bonus: f64,
    /// Symbol granted the higher weight cap.
    #[serde(default = "default_dominant_symbol")]
    pub dominant_symbol: String,
    /// Weight ceiling for the dominant asset.
    #[serde(default = "default_dominant_cap")]
    pub dominant_cap: f64,
    /// Weight ceiling for every other asset.
    #[serde(default = "default_other_cap")]
    pub other_cap: f64,
    /// How many candidates survive market-cap selection.
    #[serde(default = "default_max_constituents")]
    pub max_constituents: usize,
    /// How many gainers/losers the report lists.
    #[serde(default = "default_top_movers")]
    pub top_movers: usize,
    /// Market timezone as a fixed offset from UTC, in hours (KST = +9).
    /// The run's calendar date is taken in this timezone.
    #[serde(default = "default_timezone_offset_hours")]
    pub timezone_offset_hours: i32,
    /// Root directory for caches, durable state, and reports.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub fx: FxConfig,
    /// Retry discipline for the market snapshot (generous — fatal on failure).
    #[serde(default = "default_market_fetch")]
    pub market_fetch: FetchPolicy,
    /// Retry discipline for auxiliary signals (tighter — ladders absorb failure).
    #[serde(default = "default_aux_fetch")]
    pub aux_fetch: FetchPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            universe: default_universe(),
            domestic_listed: default_domestic_listed(),
            domestic_bonus: default_domestic_bonus(),
            dominant_symbol: default_dominant_symbol(),
            dominant_cap: default_dominant_cap(),
            other_cap: default_other_cap(),
            max_constituents: default_max_constituents(),
            top_movers: default_top_movers(),
            timezone_offset_hours: default_timezone_offset_hours(),
            out_dir: default_out_dir(),
            fx: FxConfig::default(),
            market_fetch: default_market_fetch(),
            aux_fetch: default_aux_fetch(),
        }
    }
}

impl IndexConfig {
    /// Load the configuration from a JSON file. Missing fields fall back to
    /// their defaults; a missing or unparseable file is the caller's call.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {path}"))?;
        info!(
            path,
            universe = config.universe.len(),
            max_constituents = config.max_constituents,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Whether `id` trades on a domestic KRW venue.
    pub fn is_domestic(&self, id: &str) -> bool {
        self.domestic_listed.iter().any(|d| d == id)
    }

    /// Directory holding the last-known-good signal caches.
    pub fn cache_dir(&self) -> PathBuf {
        self.out_dir.join("cache")
    }

    /// Path of the append-style index history file.
    pub fn history_path(&self) -> PathBuf {
        self.out_dir.join("history").join("bm20_index_history.json")
    }

    /// Path of the one-shot base value file.
    pub fn base_value_path(&self) -> PathBuf {
        self.out_dir.join("base").join("bm20_base.json")
    }

    /// Directory the daily report for `date` lands in.
    pub fn report_dir(&self, date: &str) -> PathBuf {
        self.out_dir.join(date)
    }
}
