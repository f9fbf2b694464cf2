// =============================================================================
// BM20 Daily Index — Batch Entry Point
// =============================================================================
//
// One invocation runs one resolve → compute → persist cycle and writes the
// daily report. The process exits non-zero only when the market snapshot
// cannot be priced; degraded auxiliary signals still produce a complete
// report with their provenance marked.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod cache;
mod config;
mod engine;
mod error;
mod fetch;
mod pipeline;
mod report;
mod resolvers;
mod store;
mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::IndexConfig;
use crate::pipeline::Pipeline;
use crate::report::DailyReport;
use crate::types::Venue;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("BM20_CONFIG").unwrap_or_else(|_| "bm20_config.json".to_string());
    let mut config = IndexConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "failed to load config, using defaults");
        IndexConfig::default()
    });

    // Override the output root from env if available.
    if let Ok(dir) = std::env::var("BM20_OUT_DIR") {
        config.out_dir = PathBuf::from(dir);
    }
    let api_key = std::env::var("COINGECKO_API_KEY")
        .ok()
        .filter(|key| !key.is_empty());

    info!(
        universe = config.universe.len(),
        out_dir = %config.out_dir.display(),
        api_key = api_key.is_some(),
        "BM20 daily index starting"
    );

    // ── 2. Run the pipeline ──────────────────────────────────────────────
    let pipeline = Pipeline::new(config.clone(), api_key);
    let report = pipeline.run().await?;

    // ── 3. Write the report for the presentation layer ───────────────────
    let report_path = write_report(&config, &report)?;

    info!(
        date = %report.date,
        index_level = format!("{:.2}", report.index.index_level),
        daily_change_pct = format!("{:+.2}%", report.index.daily_change_pct),
        gap_pct = ?report.price_gap.gap_pct,
        btc_funding_pct = ?report.funding.rate(Venue::Binance, "BTCUSDT"),
        report = %report_path.display(),
        "run complete"
    );
    Ok(())
}

/// Serialize the report into the dated output directory.
fn write_report(config: &IndexConfig, report: &DailyReport) -> Result<PathBuf> {
    let date = report.date.to_string();
    let dir = config.report_dir(&date);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create report dir {}", dir.display()))?;
    let path = dir.join(format!("bm20_report_{date}.json"));
    let content =
        serde_json::to_string_pretty(report).context("failed to serialise daily report")?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(path)
}
