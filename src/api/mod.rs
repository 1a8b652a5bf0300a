pub mod http_client;
pub mod normalize;

use crate::config::{ApiConfig, ListConfig};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CompanyOverview, Envelope, FetchMode, Fundamentals, ListKind, ListPage, ListQuery,
    NewsSentiment, OptionsActivity, WatchlistSummary,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use self::http_client::HttpClient;
use self::normalize::{extract_meta, payload_to_page, unwrap_data};

// ── Source traits ─────────────────────────────────────────────────────────────

/// Anything that can serve a movers / watchlist / opportunities window.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch_list(&self, query: &ListQuery) -> ApiResult<ListPage>;
}

/// Per-symbol detail feeds shown by the stock-info helper.
#[async_trait]
pub trait InsightSource: Send + Sync {
    async fn overview(&self, symbol: &str) -> ApiResult<Envelope<CompanyOverview>>;
    async fn fundamentals(&self, symbol: &str) -> ApiResult<Envelope<Fundamentals>>;
    async fn news_sentiment(&self, symbol: &str) -> ApiResult<Envelope<NewsSentiment>>;
    async fn unusual_options(&self, symbol: &str) -> ApiResult<Envelope<Vec<OptionsActivity>>>;
}

// ── Service roots ─────────────────────────────────────────────────────────────

/// The two logical backends every endpoint hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Core,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ServiceRoots {
    core: Url,
    assistant: Url,
}

impl ServiceRoots {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            core: parse_root(&config.core_base_url)
                .with_context(|| format!("Bad core service URL {:?}", config.core_base_url))?,
            assistant: parse_root(&config.assistant_base_url)
                .with_context(|| format!("Bad assistant service URL {:?}", config.assistant_base_url))?,
        })
    }

    /// Resolve `segments` under a service root. Segments are percent-encoded.
    pub fn endpoint(&self, service: Service, segments: &[&str], query: &[(&str, String)]) -> Url {
        let mut url = match service {
            Service::Core => self.core.clone(),
            Service::Assistant => self.assistant.clone(),
        };
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }
}

fn parse_root(raw: &str) -> ApiResult<Url> {
    let url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
    }
    Ok(url)
}

fn decode<T: DeserializeOwned>(payload: Value) -> ApiResult<Envelope<T>> {
    let meta = extract_meta(&payload);
    let data = serde_json::from_value(unwrap_data(payload))?;
    Ok(Envelope { data, meta })
}

// ── REST client ───────────────────────────────────────────────────────────────

pub struct RestClient {
    http: HttpClient,
    roots: ServiceRoots,
    movers_max: usize,
}

impl RestClient {
    pub fn new(api: &ApiConfig, lists: &ListConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(api)?,
            roots: ServiceRoots::new(api)?,
            movers_max: lists.movers_max.max(1),
        })
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Url {
        self.roots.endpoint(Service::Core, segments, query)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> ApiResult<Envelope<T>> {
        decode(self.http.get_json(&url, FetchMode::Initial).await?)
    }

    // ── Market ────────────────────────────────────────────────────────────────

    pub async fn market_summary(&self) -> ApiResult<Envelope<Value>> {
        self.get(self.url(&["market", "summary"], &[])).await
    }

    pub async fn snapshot(&self, symbols: &[String]) -> ApiResult<ListPage> {
        let url = self.url(&["market", "snapshot"], &[("symbols", symbols.join(","))]);
        let payload = self.http.get_json(&url, FetchMode::Initial).await?;
        Ok(payload_to_page(&payload))
    }

    pub async fn quote(&self, symbol: &str) -> ApiResult<Envelope<Value>> {
        self.get(self.url(&["market", "quote", symbol], &[])).await
    }

    pub async fn chart_data(&self, symbol: &str, timeframe: &str) -> ApiResult<Envelope<Value>> {
        let url = self.url(&["market", "chart", symbol], &[("timeframe", timeframe.to_string())]);
        self.get(url).await
    }

    // ── Screener ──────────────────────────────────────────────────────────────

    pub async fn run_screener(&self, params: &Value) -> ApiResult<ListPage> {
        let payload = self.http.post_json(&self.url(&["screener", "run"], &[]), params).await?;
        Ok(payload_to_page(&payload))
    }

    // ── Watchlists ────────────────────────────────────────────────────────────

    pub async fn watchlists(&self) -> ApiResult<Envelope<Vec<WatchlistSummary>>> {
        self.get(self.url(&["watchlists"], &[])).await
    }

    pub async fn watchlist(&self, id: &str) -> ApiResult<Envelope<WatchlistSummary>> {
        self.get(self.url(&["watchlists", id], &[])).await
    }

    pub async fn add_symbols(&self, id: &str, symbols: &[String]) -> ApiResult<()> {
        let url = self.url(&["watchlists", id, "symbols"], &[]);
        self.http.post_json(&url, &json!({ "symbols": symbols })).await?;
        info!("Added {} symbols to watchlist {}", symbols.len(), id);
        Ok(())
    }

    pub async fn remove_symbol(&self, id: &str, symbol: &str) -> ApiResult<()> {
        self.http
            .delete(&self.url(&["watchlists", id, "symbols", symbol], &[]))
            .await?;
        info!("Removed {} from watchlist {}", symbol, id);
        Ok(())
    }

    // ── Calendars ─────────────────────────────────────────────────────────────

    pub async fn economic_calendar(
        &self,
        date: NaiveDate,
        region: &str,
    ) -> ApiResult<Envelope<Value>> {
        let url = self.url(
            &["calendar", "economic"],
            &[("date", date.to_string()), ("region", region.to_string())],
        );
        self.get(url).await
    }

    pub async fn holidays(&self, year: i32, region: &str) -> ApiResult<Envelope<Value>> {
        let url = self.url(
            &["calendar", "holidays"],
            &[("year", year.to_string()), ("region", region.to_string())],
        );
        self.get(url).await
    }

    /// Earnings, dividends and splits for one symbol over a date range.
    pub async fn company_calendar(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<Envelope<Value>> {
        let url = self.url(
            &["calendar", "company", symbol],
            &[("from", from.to_string()), ("to", to.to_string())],
        );
        self.get(url).await
    }

    // ── Assistant ─────────────────────────────────────────────────────────────

    pub async fn ask(&self, question: &str, mode: &str) -> ApiResult<Envelope<Value>> {
        let url = self.roots.endpoint(Service::Assistant, &["ask"], &[]);
        let payload = self
            .http
            .post_json(&url, &json!({ "question": question, "mode": mode }))
            .await?;
        decode(payload)
    }
}

/// Endpoint for one list window. The movers `limit` is clamped to the
/// server ceiling; `force_refresh` is sent only when asked for.
pub fn list_url(roots: &ServiceRoots, movers_max: usize, query: &ListQuery) -> Url {
    let mut params: Vec<(&str, String)> = Vec::new();
    if query.force_refresh {
        params.push(("force_refresh", "true".to_string()));
    }

    match &query.kind {
        ListKind::Movers { direction } => {
            let movers_max = movers_max.max(1);
            let limit = query.limit.unwrap_or(movers_max).clamp(1, movers_max);
            params.push(("direction", direction.to_string()));
            params.push(("limit", limit.to_string()));
            roots.endpoint(Service::Core, &["market", "movers"], &params)
        }
        ListKind::Watchlist { id } => {
            roots.endpoint(Service::Core, &["watchlists", id.as_str(), "snapshot"], &params)
        }
        ListKind::Opportunities => roots.endpoint(Service::Core, &["screener", "opportunities"], &params),
    }
}

/// A payload with no recognisable row group is a decode failure, not an empty list.
fn page_from_payload(payload: &Value, url: &Url) -> ApiResult<ListPage> {
    if !payload.is_null() && normalize::extract_row_groups(payload).is_empty() {
        return Err(ApiError::Decode(format!("No rows in {} response", url.path())));
    }
    Ok(payload_to_page(payload))
}

#[async_trait]
impl ListSource for RestClient {
    async fn fetch_list(&self, query: &ListQuery) -> ApiResult<ListPage> {
        let url = list_url(&self.roots, self.movers_max, query);
        debug!("Fetching {:?} ({:?})", query.kind, query.mode);
        let payload = self.http.get_json(&url, query.mode).await?;
        page_from_payload(&payload, &url)
    }
}

#[async_trait]
impl InsightSource for RestClient {
    async fn overview(&self, symbol: &str) -> ApiResult<Envelope<CompanyOverview>> {
        self.get(self.url(&["fundamentals", symbol, "overview"], &[])).await
    }

    async fn fundamentals(&self, symbol: &str) -> ApiResult<Envelope<Fundamentals>> {
        self.get(self.url(&["fundamentals", symbol], &[])).await
    }

    async fn news_sentiment(&self, symbol: &str) -> ApiResult<Envelope<NewsSentiment>> {
        self.get(self.url(&["news", "sentiment"], &[("symbol", symbol.to_string())]))
            .await
    }

    async fn unusual_options(&self, symbol: &str) -> ApiResult<Envelope<Vec<OptionsActivity>>> {
        self.get(self.url(&["options", "unusual"], &[("symbol", symbol.to_string())]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> ServiceRoots {
        ServiceRoots::new(&ApiConfig {
            core_base_url: "https://example.test/api/".into(),
            assistant_base_url: "https://example.test/assistant".into(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_and_encodes() {
        let url = roots().endpoint(
            Service::Core,
            &["watchlists", "my list", "snapshot"],
            &[("force_refresh", "true".into())],
        );
        assert_eq!(
            url.as_str(),
            "https://example.test/api/watchlists/my%20list/snapshot?force_refresh=true"
        );

        let ask = roots().endpoint(Service::Assistant, &["ask"], &[]);
        assert_eq!(ask.as_str(), "https://example.test/assistant/ask");
    }

    #[test]
    fn test_rejects_non_base_root() {
        let cfg = ApiConfig {
            core_base_url: "mailto:ops@example.test".into(),
            ..ApiConfig::default()
        };
        assert!(ServiceRoots::new(&cfg).is_err());
        assert!(matches!(parse_root("mailto:ops@example.test"), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(parse_root("not a url"), Err(ApiError::InvalidUrl(_))));
    }

    fn movers(limit: Option<usize>, force_refresh: bool, mode: FetchMode) -> ListQuery {
        ListQuery {
            kind: ListKind::Movers {
                direction: crate::models::MoverDirection::Both,
            },
            limit,
            force_refresh,
            mode,
        }
    }

    #[test]
    fn test_movers_limit_clamped_to_ceiling() {
        let roots = roots();
        let url = list_url(&roots, 20, &movers(Some(50), false, FetchMode::Grow));
        assert_eq!(
            url.as_str(),
            "https://example.test/api/market/movers?direction=both&limit=20"
        );
        let url = list_url(&roots, 20, &movers(Some(0), false, FetchMode::Initial));
        assert!(url.as_str().ends_with("limit=1"));
        let url = list_url(&roots, 20, &movers(None, false, FetchMode::Initial));
        assert!(url.as_str().ends_with("limit=20"));
    }

    #[test]
    fn test_force_refresh_only_on_refresh() {
        let roots = roots();
        let plain = list_url(&roots, 20, &movers(Some(20), false, FetchMode::Initial));
        assert!(!plain.as_str().contains("force_refresh"));

        let forced = list_url(&roots, 20, &movers(Some(20), true, FetchMode::Refresh));
        assert_eq!(
            forced.as_str(),
            "https://example.test/api/market/movers?force_refresh=true&direction=both&limit=20"
        );

        let watchlist = ListQuery {
            kind: ListKind::Watchlist { id: "core 1".into() },
            limit: None,
            force_refresh: true,
            mode: FetchMode::Refresh,
        };
        assert_eq!(
            list_url(&roots, 20, &watchlist).as_str(),
            "https://example.test/api/watchlists/core%201/snapshot?force_refresh=true"
        );
    }

    #[test]
    fn test_rowless_payload_is_decode_error() {
        let url = roots().endpoint(Service::Core, &["screener", "opportunities"], &[]);
        let err = page_from_payload(&serde_json::json!({"status": "ok"}), &url).unwrap_err();
        assert!(matches!(err, ApiError::Decode(ref m) if m.contains("/screener/opportunities")));

        let empty = page_from_payload(&Value::Null, &url).unwrap();
        assert!(empty.items.is_empty());

        let page = page_from_payload(&serde_json::json!({"results": [{"symbol": "amd"}]}), &url).unwrap();
        assert_eq!(page.items[0].symbol, "AMD");
        assert_eq!(page.fetched, 1);
    }

    #[test]
    fn test_decode_unwraps_data_and_meta() {
        let env: Envelope<CompanyOverview> = decode(serde_json::json!({
            "data": {"symbol": "AAPL", "name": "Apple", "marketCap": 3.0e12},
            "meta": {"isCache": true, "cacheSource": "pg", "stale": true}
        }))
        .unwrap();
        assert_eq!(env.data.name.as_deref(), Some("Apple"));
        assert_eq!(env.data.market_cap, Some(3.0e12));
        assert!(env.meta.unwrap().stale);
    }
}
