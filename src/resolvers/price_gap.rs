// =============================================================================
// Price-Gap Resolver — domestic vs global BTC pricing ("kimchi premium")
// =============================================================================
//
//   gap% = ((domestic_krw / usdkrw) − global_usd) / global_usd × 100
//
// Three legs, each with its own ladder:
//   domestic KRW price: upbit → aggregator KRW quote
//   global USD price:   today's market snapshot → binance spot → aggregator
//   USD→KRW rate:       tether KRW quote (sanity band) → fixed fallback rate
//
// The FX leg cannot exhaust because the fixed rate always answers. When the
// domestic or global leg exhausts, the previous run's cached record stands
// in, with every provenance tag rewritten to "cache" so a stale gap is
// never mistaken for a live one. With an empty cache the gap is reported
// unavailable rather than aborting the run.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::config::{FxConfig, IndexConfig};
use crate::error::EngineError;
use crate::fetch::FetchClient;
use crate::resolvers::json_f64;
use crate::resolvers::ladder::{resolve_with_fallback, Stage, SOURCE_UNAVAILABLE};
use crate::types::AssetQuote;

/// Cache key for the whole-record price-gap fallback.
pub const PRICE_GAP_CACHE_KEY: &str = "price_gap_last";

/// The asset the gap is measured on.
const GAP_SYMBOL: &str = "BTC";

/// Provenance tag for the fixed FX fallback rate.
const SOURCE_FIXED: &str = "fixed";

const UPBIT_TICKER: &str = "https://api.upbit.com/v1/ticker";
const BINANCE_SPOT_TICKER: &str = "https://api.binance.com/api/v3/ticker/price";
const COINGECKO_SIMPLE_PRICE: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Which source satisfied each leg of the gap computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceGapProvenance {
    pub domestic: String,
    pub global: String,
    pub fx: String,
}

/// Cross-market price gap, cached and reported as one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceGapSignal {
    /// The gap in percent; `None` when unresolvable this run.
    pub gap_pct: Option<f64>,
    /// Domestic BTC price in KRW.
    pub domestic_price: Option<f64>,
    /// Global BTC price in USD.
    pub global_price: Option<f64>,
    /// USD→KRW rate used for the conversion.
    pub fx_rate: Option<f64>,
    pub provenance: PriceGapProvenance,
}

pub struct PriceGapResolver {
    client: FetchClient,
    fx: FxConfig,
}

impl PriceGapResolver {
    pub fn new(client: FetchClient, config: &IndexConfig) -> Self {
        Self {
            client,
            fx: config.fx.clone(),
        }
    }

    /// Resolve the gap, consulting `snapshot` for the global leg and the
    /// cache when a leg exhausts. A full live resolution replaces the
    /// cached record unconditionally.
    pub async fn resolve(&self, snapshot: &[AssetQuote], cache: &CacheStore) -> PriceGapSignal {
        let domestic = resolve_with_fallback(
            "btc_domestic_krw",
            vec![
                Stage::new("upbit", Box::pin(self.fetch_upbit_btc_krw())),
                Stage::new("cg_krw", Box::pin(self.fetch_simple_price("bitcoin", "krw"))),
            ],
            None,
        )
        .await;

        let Some(domestic_price) = domestic.value else {
            return self.degraded(cache, None);
        };

        let global = resolve_with_fallback(
            "btc_global_usd",
            vec![
                Stage::new("snapshot", Box::pin(snapshot_btc_usd(snapshot))),
                Stage::new("binance", Box::pin(self.fetch_binance_btc_usdt())),
                Stage::new("cg_usd", Box::pin(self.fetch_simple_price("bitcoin", "usd"))),
            ],
            None,
        )
        .await;

        let Some(global_price) = global.value else {
            return self.degraded(cache, Some((domestic_price, domestic.source)));
        };

        let fallback_rate = self.fx.fallback_rate;
        let fx = resolve_with_fallback(
            "usdkrw",
            vec![
                Stage::new("cg_tether", Box::pin(self.fetch_tether_krw())),
                Stage::new(SOURCE_FIXED, Box::pin(async move { Ok(fallback_rate) })),
            ],
            None,
        )
        .await;
        // The fixed rung cannot fail, so the FX leg always resolves.
        let fx_rate = fx.value.unwrap_or(fallback_rate);

        let gap_pct = compute_gap_pct(domestic_price, fx_rate, global_price);
        let signal = PriceGapSignal {
            gap_pct: Some(gap_pct),
            domestic_price: Some(domestic_price),
            global_price: Some(global_price),
            fx_rate: Some(fx_rate),
            provenance: PriceGapProvenance {
                domestic: domestic.source,
                global: global.source,
                fx: fx.source,
            },
        };

        cache.write(PRICE_GAP_CACHE_KEY, &signal);
        info!(
            gap_pct = format!("{gap_pct:.4}"),
            domestic = %signal.provenance.domestic,
            global = %signal.provenance.global,
            fx = %signal.provenance.fx,
            "price gap resolved"
        );
        signal
    }

    /// Serve the previous run's record, or an unavailable signal when the
    /// cache is empty too. `domestic_leg` preserves a domestic price that
    /// did resolve before the global leg gave out.
    fn degraded(
        &self,
        cache: &CacheStore,
        domestic_leg: Option<(f64, String)>,
    ) -> PriceGapSignal {
        if let Some(mut cached) = cache.read::<PriceGapSignal>(PRICE_GAP_CACHE_KEY) {
            warn!("price gap unresolvable live, serving cached record");
            cached.provenance = PriceGapProvenance {
                domestic: "cache".to_string(),
                global: "cache".to_string(),
                fx: "cache".to_string(),
            };
            return cached;
        }

        warn!("price gap unavailable, no live sources and empty cache");
        let (domestic_price, domestic_source) = match domestic_leg {
            Some((price, source)) => (Some(price), source),
            None => (None, SOURCE_UNAVAILABLE.to_string()),
        };
        PriceGapSignal {
            gap_pct: None,
            domestic_price,
            global_price: None,
            fx_rate: Some(self.fx.fallback_rate),
            provenance: PriceGapProvenance {
                domestic: domestic_source,
                global: SOURCE_UNAVAILABLE.to_string(),
                fx: SOURCE_FIXED.to_string(),
            },
        }
    }

    async fn fetch_upbit_btc_krw(&self) -> Result<f64> {
        let body = self
            .client
            .get_json(UPBIT_TICKER, &[("markets", "KRW-BTC")])
            .await?;
        body.get(0)
            .and_then(|ticker| json_f64(&ticker["trade_price"]))
            .context("upbit ticker missing trade_price")
    }

    async fn fetch_simple_price(&self, id: &str, vs: &str) -> Result<f64> {
        let body = self
            .client
            .get_json(COINGECKO_SIMPLE_PRICE, &[("ids", id), ("vs_currencies", vs)])
            .await?;
        json_f64(&body[id][vs]).with_context(|| format!("simple price missing {id}.{vs}"))
    }

    async fn fetch_binance_btc_usdt(&self) -> Result<f64> {
        let body = self
            .client
            .get_json(BINANCE_SPOT_TICKER, &[("symbol", "BTCUSDT")])
            .await?;
        json_f64(&body["price"]).context("binance spot ticker missing price")
    }

    /// Live USD→KRW via the tether quote, rejected outside the sanity band
    /// so one bad print cannot swing the gap by hundreds of percent.
    async fn fetch_tether_krw(&self) -> Result<f64> {
        let rate = self.fetch_simple_price("tether", "krw").await?;
        if !self.fx.contains(rate) {
            return Err(EngineError::Validation {
                what: "usdkrw".to_string(),
                value: rate,
                min: self.fx.band_min,
                max: self.fx.band_max,
            }
            .into());
        }
        Ok(rate)
    }
}

/// Today's snapshot already has a BTC quote; reuse it instead of refetching.
/// Only a positive price counts as an answer.
async fn snapshot_btc_usd(snapshot: &[AssetQuote]) -> Result<f64> {
    snapshot
        .iter()
        .find(|q| q.symbol == GAP_SYMBOL)
        .map(|q| q.current_price)
        .filter(|price| *price > 0.0)
        .ok_or_else(|| anyhow!("no positive BTC price in market snapshot"))
}

fn compute_gap_pct(domestic_krw: f64, usdkrw: f64, global_usd: f64) -> f64 {
    ((domestic_krw / usdkrw) - global_usd) / global_usd * 100.0
}
