// =============================================================================
// Funding-Rate Resolver — perpetual funding from two venues with fallback
// =============================================================================
//
// Four independent ladders, one per venue × instrument slot:
//   Binance: premium-index endpoint across three domain aliases, then the
//            funding-history endpoint (limit 1) across the same aliases.
//   Bybit:   the v5 linear tickers endpoint.
// Rates arrive as decimals and are reported in percent (× 100). A ladder
// that exhausts falls back to its own slot in the previous run's cache
// record, and the refreshed record keeps whichever slots are populated, so
// one dead venue never erases a good cached value for the others.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CacheStore;
use crate::fetch::FetchClient;
use crate::resolvers::json_f64;
use crate::resolvers::ladder::{resolve_with_fallback, Stage};
use crate::types::Venue;

/// Cache key for the per-slot funding record.
pub const FUNDING_CACHE_KEY: &str = "funding_last";

/// Binance futures domain aliases, tried in order. The first is the
/// canonical domain; the others answer when it is blocked regionally.
const BINANCE_FUTURES_DOMAINS: [&str; 3] = [
    "https://fapi.binance.com",
    "https://fapi1.binance.com",
    "https://fapi2.binance.com",
];

const BYBIT_TICKERS: &str = "https://api.bybit.com/v5/market/tickers";

/// The two instruments every venue is asked about.
const INSTRUMENTS: [&str; 2] = ["BTCUSDT", "ETHUSDT"];

/// Funding rate for one venue × instrument slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSignal {
    pub venue: Venue,
    pub instrument: String,
    /// Funding rate in percent; `None` when the ladder and cache are empty.
    pub rate_pct: Option<f64>,
    /// Provenance tag: the answering rung, "cache", or "unavailable".
    pub source: String,
}

/// All four slots, in venue-major order (binance btc/eth, bybit btc/eth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingBundle {
    pub rates: Vec<FundingSignal>,
}

impl FundingBundle {
    /// Rate for one slot, if it resolved.
    pub fn rate(&self, venue: Venue, instrument: &str) -> Option<f64> {
        self.rates
            .iter()
            .find(|r| r.venue == venue && r.instrument == instrument)
            .and_then(|r| r.rate_pct)
    }
}

/// On-disk cache record: one optional rate per slot. Partial records load
/// with the missing slots empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingCacheRecord {
    #[serde(default)]
    pub binance_btc: Option<f64>,
    #[serde(default)]
    pub binance_eth: Option<f64>,
    #[serde(default)]
    pub bybit_btc: Option<f64>,
    #[serde(default)]
    pub bybit_eth: Option<f64>,
}

/// Which Binance endpoint a ladder rung hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinanceEndpoint {
    PremiumIndex,
    FundingHistory,
}

/// The Binance ladder: the live premium-index across every alias first,
/// only then the history endpoint across every alias.
fn binance_ladder_plan() -> Vec<(BinanceEndpoint, &'static str)> {
    let mut plan = Vec::with_capacity(BINANCE_FUTURES_DOMAINS.len() * 2);
    for domain in BINANCE_FUTURES_DOMAINS {
        plan.push((BinanceEndpoint::PremiumIndex, domain));
    }
    for domain in BINANCE_FUTURES_DOMAINS {
        plan.push((BinanceEndpoint::FundingHistory, domain));
    }
    plan
}

pub struct FundingResolver {
    client: FetchClient,
}

impl FundingResolver {
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }

    /// Resolve all four slots concurrently and refresh the cache record
    /// with whatever resolved (live or carried over from cache).
    pub async fn resolve(&self, cache: &CacheStore) -> FundingBundle {
        let last: FundingCacheRecord = cache.read(FUNDING_CACHE_KEY).unwrap_or_default();

        let (binance_btc, binance_eth, bybit_btc, bybit_eth) = tokio::join!(
            self.resolve_binance(INSTRUMENTS[0], last.binance_btc),
            self.resolve_binance(INSTRUMENTS[1], last.binance_eth),
            self.resolve_bybit(INSTRUMENTS[0], last.bybit_btc),
            self.resolve_bybit(INSTRUMENTS[1], last.bybit_eth),
        );

        let record = FundingCacheRecord {
            binance_btc: binance_btc.rate_pct,
            binance_eth: binance_eth.rate_pct,
            bybit_btc: bybit_btc.rate_pct,
            bybit_eth: bybit_eth.rate_pct,
        };
        cache.write(FUNDING_CACHE_KEY, &record);

        info!(
            binance_btc = ?record.binance_btc,
            binance_eth = ?record.binance_eth,
            bybit_btc = ?record.bybit_btc,
            bybit_eth = ?record.bybit_eth,
            "funding rates resolved"
        );

        FundingBundle {
            rates: vec![binance_btc, binance_eth, bybit_btc, bybit_eth],
        }
    }

    async fn resolve_binance(&self, instrument: &'static str, cached: Option<f64>) -> FundingSignal {
        let mut stages: Vec<Stage<'_, f64>> = Vec::new();
        for (endpoint, domain) in binance_ladder_plan() {
            let stage = match endpoint {
                BinanceEndpoint::PremiumIndex => Stage::new(
                    "binance_premium",
                    Box::pin(self.fetch_binance_premium(domain, instrument)),
                ),
                BinanceEndpoint::FundingHistory => Stage::new(
                    "binance_history",
                    Box::pin(self.fetch_binance_history(domain, instrument)),
                ),
            };
            stages.push(stage);
        }

        let signal = format!("funding_binance_{instrument}");
        let resolved = resolve_with_fallback(&signal, stages, cached).await;
        FundingSignal {
            venue: Venue::Binance,
            instrument: instrument.to_string(),
            rate_pct: resolved.value,
            source: resolved.source,
        }
    }

    async fn resolve_bybit(&self, instrument: &'static str, cached: Option<f64>) -> FundingSignal {
        let stages = vec![Stage::new(
            "bybit_tickers",
            Box::pin(self.fetch_bybit(instrument)),
        )];

        let signal = format!("funding_bybit_{instrument}");
        let resolved = resolve_with_fallback(&signal, stages, cached).await;
        FundingSignal {
            venue: Venue::Bybit,
            instrument: instrument.to_string(),
            rate_pct: resolved.value,
            source: resolved.source,
        }
    }

    async fn fetch_binance_premium(&self, domain: &'static str, instrument: &str) -> Result<f64> {
        let url = format!("{domain}/fapi/v1/premiumIndex");
        let body = self.client.get_json(&url, &[("symbol", instrument)]).await?;
        parse_premium_index(&body).context("premium index body missing lastFundingRate")
    }

    async fn fetch_binance_history(&self, domain: &'static str, instrument: &str) -> Result<f64> {
        let url = format!("{domain}/fapi/v1/fundingRate");
        let body = self
            .client
            .get_json(&url, &[("symbol", instrument), ("limit", "1")])
            .await?;
        parse_funding_history(&body).context("funding history body empty")
    }

    async fn fetch_bybit(&self, instrument: &str) -> Result<f64> {
        let body = self
            .client
            .get_json(BYBIT_TICKERS, &[("category", "linear"), ("symbol", instrument)])
            .await?;
        parse_bybit_tickers(&body).context("bybit tickers body missing fundingRate")
    }
}

/// Extract `lastFundingRate` from a premium-index body, in percent. The
/// endpoint returns an object for a single symbol but a list without one;
/// accept both shapes.
fn parse_premium_index(body: &serde_json::Value) -> Option<f64> {
    let obj = if body.is_array() { body.get(0)? } else { body };
    json_f64(&obj["lastFundingRate"]).map(|rate| rate * 100.0)
}

/// First entry of a funding-history body (limit 1 makes it the most
/// recent), in percent.
fn parse_funding_history(body: &serde_json::Value) -> Option<f64> {
    json_f64(&body.get(0)?["fundingRate"]).map(|rate| rate * 100.0)
}

/// `result.list[0].fundingRate` from a bybit v5 tickers body, in percent.
fn parse_bybit_tickers(body: &serde_json::Value) -> Option<f64> {
    json_f64(&body["result"]["list"].get(0)?["fundingRate"]).map(|rate| rate * 100.0)
}
