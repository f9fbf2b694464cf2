// =============================================================================
// Shared types used across the BM20 index engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Per-run quote snapshot for a single tracked asset, as resolved from the
/// market-data provider. Absent numeric fields are defused to 0.0 at parse
/// time so downstream arithmetic never sees a null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetQuote {
    /// Provider asset id (e.g. "bitcoin").
    pub id: String,
    /// Upper-case ticker symbol (e.g. "BTC").
    pub symbol: String,
    /// Display name; falls back to the symbol when the provider omits it.
    pub name: String,
    /// Latest traded price in USD.
    #[serde(default)]
    pub current_price: f64,
    /// Market capitalisation in USD.
    #[serde(default)]
    pub market_cap: f64,
    /// Traded volume over the last 24 hours in USD.
    #[serde(default)]
    pub total_volume: f64,
    /// Price change over the last 24 hours, in percent.
    #[serde(default)]
    pub change_pct_24h: f64,
}

impl AssetQuote {
    /// Previous close implied by the 24 h change percentage:
    /// `current / (1 + change / 100)`.
    ///
    /// Returns `None` when the current price is absent (0.0) or the change
    /// implies a non-positive divisor (a -100% day), so callers can skip the
    /// asset from previous-value sums instead of dividing by zero.
    pub fn previous_price(&self) -> Option<f64> {
        if self.current_price == 0.0 {
            return None;
        }
        let divisor = 1.0 + self.change_pct_24h / 100.0;
        if divisor <= 0.0 {
            return None;
        }
        Some(self.current_price / divisor)
    }
}

/// Perpetual-futures venue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
    Binance,
    Bybit,
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "Binance"),
            Self::Bybit => write!(f, "Bybit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(current_price: f64, change_pct_24h: f64) -> AssetQuote {
        AssetQuote {
            id: "bitcoin".to_string(),
            symbol: "BTC".to_string(),
            name: "Bitcoin".to_string(),
            current_price,
            market_cap: 1.0e12,
            total_volume: 3.0e10,
            change_pct_24h,
        }
    }

    #[test]
    fn previous_price_inverts_the_daily_change() {
        let q = quote(102.0, 2.0);
        let prev = q.previous_price().unwrap();
        assert!((prev - 100.0).abs() < 1e-10);
    }

    #[test]
    fn previous_price_flat_day_equals_current() {
        let q = quote(250.0, 0.0);
        assert!((q.previous_price().unwrap() - 250.0).abs() < 1e-10);
    }

    #[test]
    fn previous_price_none_without_a_current_price() {
        let q = quote(0.0, 5.0);
        assert!(q.previous_price().is_none());
    }

    #[test]
    fn previous_price_none_on_a_total_wipeout() {
        // A -100% day implies a zero divisor.
        let q = quote(1.0, -100.0);
        assert!(q.previous_price().is_none());
    }

    #[test]
    fn venue_display_names() {
        assert_eq!(Venue::Binance.to_string(), "Binance");
        assert_eq!(Venue::Bybit.to_string(), "Bybit");
    }
}
