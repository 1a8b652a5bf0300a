use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── List rows ─────────────────────────────────────────────────────────────────

/// One row of a movers / watchlist / opportunities list after normalisation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListItem {
    pub symbol: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
}

impl ListItem {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            price: None,
            change_percent: None,
        }
    }

    pub fn with_change(mut self, pct: f64) -> Self {
        self.change_percent = Some(pct);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

// ── Cache provenance ──────────────────────────────────────────────────────────

/// Which tier served a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CacheSource {
    Redis,
    Postgres,
    Fresh,
    Other(String),
}

impl From<String> for CacheSource {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => CacheSource::Redis,
            "pg" | "postgres" | "postgresql" => CacheSource::Postgres,
            "fresh" => CacheSource::Fresh,
            _ => CacheSource::Other(s.trim().to_string()),
        }
    }
}

impl From<CacheSource> for String {
    fn from(s: CacheSource) -> Self {
        match s {
            CacheSource::Redis => "redis".into(),
            CacheSource::Postgres => "pg".into(),
            CacheSource::Fresh => "fresh".into(),
            CacheSource::Other(o) => o,
        }
    }
}

/// Metadata the backend attaches to say where a response came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMeta {
    #[serde(default)]
    pub is_cache: bool,
    #[serde(default)]
    pub cache_source: Option<CacheSource>,
    #[serde(default)]
    pub stale: bool,
}

/// A decoded payload plus whatever provenance came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
    pub meta: Option<CacheMeta>,
}

// ── List kinds and queries ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoverDirection {
    Gainers,
    Losers,
    Both,
}

impl MoverDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoverDirection::Gainers => "gainers",
            MoverDirection::Losers => "losers",
            MoverDirection::Both => "both",
        }
    }
}

impl fmt::Display for MoverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoverDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gainers" | "up" => Ok(MoverDirection::Gainers),
            "losers" | "down" => Ok(MoverDirection::Losers),
            "both" | "all" => Ok(MoverDirection::Both),
            other => Err(format!("unknown mover direction '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ListKind {
    Movers { direction: MoverDirection },
    Watchlist { id: String },
    Opportunities,
}

impl ListKind {
    /// Movers grow by re-querying with a larger `limit`; the others arrive whole.
    pub fn is_server_paginated(&self) -> bool {
        matches!(self, ListKind::Movers { .. })
    }
}

/// Why a fetch is being issued. Only initial loads are retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Initial,
    Grow,
    Refresh,
    Retry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub kind: ListKind,
    /// Requested window size; `None` for lists that are not server-paginated
    pub limit: Option<usize>,
    pub force_refresh: bool,
    pub mode: FetchMode,
}

/// Normalised result of one list fetch, before de-duplication and sorting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub items: Vec<ListItem>,
    /// Rows returned on the fullest side (gainers and losers count separately)
    pub fetched: usize,
    pub meta: Option<CacheMeta>,
}

// ── Watchlists ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistSummary {
    #[serde(alias = "watchlist_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbols: Vec<String>,
}

// ── Symbol insights ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompanyOverview {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default, alias = "marketCap")]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    #[serde(default, alias = "peRatio")]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default, alias = "dividendYield")]
    pub dividend_yield: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "sentimentScore", alias = "overall_sentiment_score")]
    pub sentiment_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsSentiment {
    #[serde(default, alias = "feed")]
    pub items: Vec<NewsItem>,
    #[serde(default, alias = "overallScore")]
    pub overall_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptionsActivity {
    #[serde(default)]
    pub contract: String,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default, alias = "openInterest")]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_source_aliases() {
        assert_eq!(CacheSource::from("PostgreSQL".to_string()), CacheSource::Postgres);
        assert_eq!(CacheSource::from("pg".to_string()), CacheSource::Postgres);
        assert_eq!(CacheSource::from(" Redis ".to_string()), CacheSource::Redis);
        assert_eq!(
            CacheSource::from("memcached".to_string()),
            CacheSource::Other("memcached".into())
        );
    }

    #[test]
    fn test_cache_meta_decodes_camel_case() {
        let meta: CacheMeta =
            serde_json::from_str(r#"{"isCache":true,"cacheSource":"redis","stale":false}"#).unwrap();
        assert!(meta.is_cache);
        assert_eq!(meta.cache_source, Some(CacheSource::Redis));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("Losers".parse::<MoverDirection>(), Ok(MoverDirection::Losers));
        assert!("sideways".parse::<MoverDirection>().is_err());
    }
}
