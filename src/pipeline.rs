// =============================================================================
// Daily Pipeline — one resolve → compute → persist cycle
// =============================================================================
//
// Phase order matters:
//   1. Market snapshot. Fatal on failure; nothing below runs without it.
//   2. Auxiliary signals (price gap, funding, trends) resolved
//      concurrently. Each ladder stays strictly sequential inside, and the
//      funding slots are independent of each other, so the only
//      parallelism is across unrelated signals.
//   3. Weights, basket values, base value, snapshot.
//   4. History upsert, period returns, history save.
//   5. Report assembly.
// Durable state is only touched in phases 3-4, after every fetch has
// settled, so a half-failed resolve phase can never leave a half-written
// history behind.

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::config::IndexConfig;
use crate::engine::{
    breadth, build_snapshot, compute_weights, period_returns, prev_value, today_value,
    top_gainers, top_losers,
};
use crate::fetch::FetchClient;
use crate::report::{DailyReport, TrendSeries};
use crate::resolvers::{FundingResolver, MarketResolver, PriceGapResolver};
use crate::store::{BaseValueStore, HistoryPoint, HistoryStore};

/// Flagship assets whose recent trend the report carries.
const TREND_IDS: [&str; 2] = ["bitcoin", "ethereum"];
/// Days of trend history per asset.
const TREND_DAYS: u32 = 8;

pub struct Pipeline {
    config: IndexConfig,
    market: MarketResolver,
    price_gap: PriceGapResolver,
    funding: FundingResolver,
    cache: CacheStore,
    history_store: HistoryStore,
    base_store: BaseValueStore,
}

impl Pipeline {
    /// Wire resolvers and stores from the run configuration. The market
    /// client gets the generous retry policy and the provider API key; the
    /// auxiliary client gets the tight policy, since ladders absorb its
    /// failures.
    pub fn new(config: IndexConfig, market_api_key: Option<String>) -> Self {
        let mut market_client = FetchClient::new(config.market_fetch.clone());
        if let Some(key) = market_api_key {
            market_client = market_client.with_api_key(key);
        }
        let aux_client = FetchClient::new(config.aux_fetch.clone());

        Self {
            market: MarketResolver::new(market_client, &config),
            price_gap: PriceGapResolver::new(aux_client.clone(), &config),
            funding: FundingResolver::new(aux_client),
            cache: CacheStore::new(config.cache_dir()),
            history_store: HistoryStore::new(config.history_path()),
            base_store: BaseValueStore::new(config.base_value_path()),
            config,
        }
    }

    /// Execute one full cycle for today's date in the market timezone.
    pub async fn run(&self) -> Result<DailyReport> {
        self.run_for_date(local_date(self.config.timezone_offset_hours))
            .await
    }

    /// Execute one full cycle for `today`. Split out from [`Pipeline::run`]
    /// so a backfill or re-run can pin the date.
    pub async fn run_for_date(&self, today: NaiveDate) -> Result<DailyReport> {
        info!(%today, "daily index run starting");

        // ── 1. Market snapshot ──────────────────────────────────────────
        let quotes = self
            .market
            .snapshot()
            .await
            .context("cannot price the index universe, aborting run")?;

        // ── 2. Auxiliary signals ────────────────────────────────────────
        let (price_gap, funding, trends) = tokio::join!(
            self.price_gap.resolve(&quotes, &self.cache),
            self.funding.resolve(&self.cache),
            self.fetch_trends(),
        );

        // ── 3. Weights and index level ──────────────────────────────────
        let assets = compute_weights(&quotes, &self.config);
        let today_v = today_value(&assets);
        let prev_v = prev_value(&assets);
        let base = self.base_store.load_or_init(today, today_v)?;
        let snapshot = build_snapshot(today, today_v, prev_v, base.base_value);

        // ── 4. History and period returns ───────────────────────────────
        let mut history = self.history_store.load()?;
        if history.is_empty() {
            info!("no prior history, starting a fresh series");
        }
        history.upsert(HistoryPoint {
            date: today,
            level: snapshot.index_level,
        });
        let returns = period_returns(&history, today);
        if let Err(e) = self.history_store.save(&history) {
            // This run's returns came from the in-memory series and stand.
            warn!(error = %e, "history save failed");
        }

        // ── 5. Report assembly ──────────────────────────────────────────
        let report = DailyReport {
            date: today,
            breadth: breadth(&assets),
            top_gainers: top_gainers(&assets, self.config.top_movers),
            top_losers: top_losers(&assets, self.config.top_movers),
            index: snapshot,
            assets,
            price_gap,
            funding,
            returns,
            trends,
        };

        info!(
            index_level = format!("{:.2}", report.index.index_level),
            daily_change_pct = format!("{:+.2}", report.index.daily_change_pct),
            advancers = report.breadth.advancers,
            decliners = report.breadth.decliners,
            "daily index computed"
        );
        Ok(report)
    }

    /// Best-effort flagship trend series; a missing series is omitted, not
    /// an error.
    async fn fetch_trends(&self) -> Vec<TrendSeries> {
        let mut out = Vec::new();
        for id in TREND_IDS {
            match self.market.price_series(id, TREND_DAYS).await {
                Ok(pct_series) if !pct_series.is_empty() => out.push(TrendSeries {
                    id: id.to_string(),
                    pct_series,
                }),
                Ok(_) => warn!(id, "empty trend series, omitting from report"),
                Err(e) => warn!(id, error = %e, "trend series fetch failed, omitting from report"),
            }
        }
        out
    }
}

/// Today's calendar date in a fixed-offset market timezone.
pub fn local_date(offset_hours: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is always valid"));
    Utc::now().with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_date_is_well_formed_for_the_market_offset() {
        // KST +9: just verify we get a plausible date either side of UTC.
        let kst = local_date(9);
        let utc = local_date(0);
        let diff = (kst - utc).num_days().abs();
        assert!(diff <= 1);
    }

    #[test]
    fn absurd_offset_falls_back_to_utc() {
        let d = local_date(9999);
        let utc = local_date(0);
        assert_eq!(d, utc);
    }
}
