// =============================================================================
// Market Snapshot Resolver — priced universe from the market-data provider
// =============================================================================
//
// One bulk quote call covers the whole candidate universe, then ranking by
// market capitalisation decides which candidates make the index; nobody
// hand-picks constituents. There is no fallback ladder here: without a
// priced universe there is no index, so failure propagates to the caller
// and aborts the run.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::IndexConfig;
use crate::fetch::FetchClient;
use crate::resolvers::json_f64;
use crate::types::AssetQuote;

/// Base URL of the market-data provider.
const COINGECKO_BASE: &str = "https://api.coingecko.com/api/v3";

pub struct MarketResolver {
    client: FetchClient,
    universe: Vec<String>,
    max_constituents: usize,
}

impl MarketResolver {
    pub fn new(client: FetchClient, config: &IndexConfig) -> Self {
        Self {
            client,
            universe: config.universe.clone(),
            max_constituents: config.max_constituents,
        }
    }

    /// Fetch quotes for the candidate universe and keep the top constituents
    /// by market capitalisation.
    pub async fn snapshot(&self) -> Result<Vec<AssetQuote>> {
        let ids = self.universe.join(",");
        let per_page = self.universe.len().to_string();
        let url = format!("{COINGECKO_BASE}/coins/markets");

        let body = self
            .client
            .get_json(
                &url,
                &[
                    ("vs_currency", "usd"),
                    ("ids", ids.as_str()),
                    ("order", "market_cap_desc"),
                    ("per_page", per_page.as_str()),
                    ("page", "1"),
                    ("price_change_percentage", "24h"),
                ],
            )
            .await
            .context("market snapshot request failed")?;

        let mut quotes = parse_markets(&body)?;
        select_by_market_cap(&mut quotes, self.max_constituents);
        info!(constituents = quotes.len(), "market snapshot resolved");
        Ok(quotes)
    }

    /// Percent-change-from-start price series for `id` over `days` days.
    /// Feeds the report's trend chart; failure is the caller's to tolerate.
    pub async fn price_series(&self, id: &str, days: u32) -> Result<Vec<f64>> {
        let url = format!("{COINGECKO_BASE}/coins/{id}/market_chart");
        let days = days.to_string();
        let body = self
            .client
            .get_json(&url, &[("vs_currency", "usd"), ("days", days.as_str())])
            .await
            .with_context(|| format!("price series request failed for {id}"))?;
        Ok(parse_price_series(&body))
    }
}

/// Map the provider's bulk-quote rows into [`AssetQuote`]s. Rows without an
/// id are dropped; every numeric field defuses to 0.0 and the name falls
/// back to the symbol.
fn parse_markets(body: &serde_json::Value) -> Result<Vec<AssetQuote>> {
    let rows = body
        .as_array()
        .context("markets response is not an array")?;

    let mut quotes = Vec::with_capacity(rows.len());
    for row in rows {
        let id = match row["id"].as_str() {
            Some(id) => id.to_string(),
            None => {
                warn!("markets row without an id, skipping");
                continue;
            }
        };
        let symbol = row["symbol"].as_str().unwrap_or_default().to_uppercase();
        let name = row["name"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| symbol.clone());
        quotes.push(AssetQuote {
            id,
            symbol,
            name,
            current_price: json_f64(&row["current_price"]).unwrap_or(0.0),
            market_cap: json_f64(&row["market_cap"]).unwrap_or(0.0),
            total_volume: json_f64(&row["total_volume"]).unwrap_or(0.0),
            change_pct_24h: json_f64(&row["price_change_percentage_24h"]).unwrap_or(0.0),
        });
    }
    Ok(quotes)
}

/// Rank by market capitalisation, descending, and keep the top `max`.
/// The sort is stable so equal caps keep the provider's order.
fn select_by_market_cap(quotes: &mut Vec<AssetQuote>, max: usize) {
    quotes.sort_by(|a, b| {
        b.market_cap
            .partial_cmp(&a.market_cap)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    quotes.truncate(max);
}

/// Turn a market-chart body into percent change from the first point.
/// Any malformed or empty series collapses to an empty vec.
fn parse_price_series(body: &serde_json::Value) -> Vec<f64> {
    let points = match body["prices"].as_array() {
        Some(points) if !points.is_empty() => points,
        _ => return Vec::new(),
    };
    let series: Vec<f64> = points
        .iter()
        .filter_map(|p| p.get(1).and_then(|v| v.as_f64()))
        .collect();
    let base = match series.first() {
        Some(&base) if base != 0.0 => base,
        _ => return Vec::new(),
    };
    series.iter().map(|v| (v / base - 1.0) * 100.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_markets_maps_the_provider_rows() {
        let body = json!([
            {
                "id": "bitcoin",
                "symbol": "btc",
                "name": "Bitcoin",
                "current_price": 65000.0,
                "market_cap": 1.28e12,
                "total_volume": 3.1e10,
                "price_change_percentage_24h": 2.0
            },
            {
                "id": "ethereum",
                "symbol": "eth",
                "name": "Ethereum",
                "current_price": 3300.0,
                "market_cap": 4.0e11,
                "total_volume": 1.2e10,
                "price_change_percentage_24h": -1.5
            }
        ]);

        let quotes = parse_markets(&body).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].id, "bitcoin");
        assert_eq!(quotes[0].symbol, "BTC");
        assert!((quotes[0].current_price - 65000.0).abs() < 1e-10);
        assert!((quotes[1].change_pct_24h + 1.5).abs() < 1e-10);
    }

    #[test]
    fn parse_markets_defuses_nulls_and_missing_fields() {
        let body = json!([
            {
                "id": "polygon",
                "symbol": "matic",
                "name": null,
                "current_price": null,
                "market_cap": null
            }
        ]);

        let quotes = parse_markets(&body).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].name, "MATIC");
        assert!((quotes[0].current_price - 0.0).abs() < 1e-10);
        assert!((quotes[0].market_cap - 0.0).abs() < 1e-10);
        assert!((quotes[0].change_pct_24h - 0.0).abs() < 1e-10);
    }

    #[test]
    fn parse_markets_drops_rows_without_an_id() {
        let body = json!([
            { "symbol": "???", "current_price": 1.0 },
            { "id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 65000.0,
              "market_cap": 1.28e12, "total_volume": 3.1e10, "price_change_percentage_24h": 0.5 }
        ]);
        let quotes = parse_markets(&body).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].id, "bitcoin");
    }

    #[test]
    fn parse_markets_rejects_a_non_array_body() {
        let body = json!({ "error": "rate limited" });
        assert!(parse_markets(&body).is_err());
    }

    #[test]
    fn selection_keeps_the_largest_caps() {
        let mut quotes: Vec<AssetQuote> = (0..21)
            .map(|i| AssetQuote {
                id: format!("asset-{i}"),
                symbol: format!("A{i}"),
                name: format!("Asset {i}"),
                current_price: 10.0,
                market_cap: 1.0e9 * (i as f64 + 1.0),
                total_volume: 1.0e7,
                change_pct_24h: 0.0,
            })
            .collect();

        select_by_market_cap(&mut quotes, 20);
        assert_eq!(quotes.len(), 20);
        // The smallest cap (asset-0) is the one that fell out.
        assert!(quotes.iter().all(|q| q.id != "asset-0"));
        assert_eq!(quotes[0].id, "asset-20");
        // Descending order throughout.
        for pair in quotes.windows(2) {
            assert!(pair[0].market_cap >= pair[1].market_cap);
        }
    }

    #[test]
    fn price_series_is_rebased_to_its_first_point() {
        let body = json!({
            "prices": [[1000, 100.0], [2000, 105.0], [3000, 95.0]]
        });
        let series = parse_price_series(&body);
        assert_eq!(series.len(), 3);
        assert!((series[0] - 0.0).abs() < 1e-10);
        assert!((series[1] - 5.0).abs() < 1e-10);
        assert!((series[2] + 5.0).abs() < 1e-10);
    }

    #[test]
    fn price_series_tolerates_an_empty_or_malformed_body() {
        assert!(parse_price_series(&json!({})).is_empty());
        assert!(parse_price_series(&json!({ "prices": [] })).is_empty());
        assert!(parse_price_series(&json!({ "prices": [[1000, 0.0], [2000, 5.0]] })).is_empty());
    }

    #[test]
    fn json_f64_accepts_numbers_and_numeric_strings() {
        assert_eq!(json_f64(&json!(1.5)), Some(1.5));
        assert_eq!(json_f64(&json!("0.00012")), Some(0.00012));
        assert_eq!(json_f64(&json!("not a number")), None);
        assert_eq!(json_f64(&json!(null)), None);
    }
}
