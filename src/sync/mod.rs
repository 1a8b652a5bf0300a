//! List synchronisation: fetch, de-duplicate, sort and window a remote list.
//!
//! Movers grow by re-requesting a larger top-N window (`limit`), replacing the
//! item set each time, because the backend has no true offset pages. Watchlist
//! and opportunity lists arrive whole and grow by revealing more rows locally.
//!
//! Every request carries a generation number. Changing what the list is about
//! (direction, refresh, cancel) bumps the generation, and `apply` drops any
//! outcome whose generation is no longer current, so a slow response for old
//! parameters can never overwrite a newer one.
//!
//! A manual refresh bypasses server caches and also resets the window to its
//! initial size. The rows already on screen stay until the refreshed result lands.

pub mod sort;
pub mod window;

use crate::api::ListSource;
use crate::config::ListConfig;
use crate::error::ApiResult;
use crate::models::{CacheMeta, FetchMode, ListItem, ListKind, ListPage, ListQuery, MoverDirection};
use crate::provenance::{Provenance, classify};
use std::sync::Arc;
use tracing::{debug, info, warn};

use self::sort::{SortSpec, dedup_first_seen, sort_items};
use self::window::{PageWindow, VisibleWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// What a consumer should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Loading,
    Empty,
    /// Rows from the last good fetch remain in `items()` when `stale_rows` is set
    Errored { message: String, stale_rows: bool },
    Ready,
}

/// A request that has been issued but not yet run. Holds no borrow of the
/// synchronizer, so it can be awaited or spawned independently.
pub struct PendingFetch<S: ListSource + ?Sized> {
    generation: u64,
    query: ListQuery,
    resets_window: bool,
    source: Arc<S>,
}

impl<S: ListSource + ?Sized> PendingFetch<S> {
    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub async fn run(self) -> FetchOutcome {
        let result = self.source.fetch_list(&self.query).await;
        FetchOutcome {
            generation: self.generation,
            query: self.query,
            resets_window: self.resets_window,
            result,
        }
    }
}

pub struct FetchOutcome {
    generation: u64,
    query: ListQuery,
    resets_window: bool,
    result: ApiResult<ListPage>,
}

pub struct ListSynchronizer<S: ListSource + ?Sized> {
    source: Arc<S>,
    kind: ListKind,
    sort: SortSpec,
    window: PageWindow,
    visible: VisibleWindow,
    items: Vec<ListItem>,
    meta: Option<CacheMeta>,
    status: ListStatus,
    error: Option<String>,
    failed: Option<(ListQuery, bool)>,
    generation: u64,
    loaded: bool,
}

impl<S: ListSource + ?Sized> ListSynchronizer<S> {
    pub fn new(source: Arc<S>, kind: ListKind, cfg: &ListConfig) -> Self {
        Self {
            sort: SortSpec::default_for(&kind),
            source,
            kind,
            window: PageWindow::new(cfg.page_size, cfg.movers_max),
            visible: VisibleWindow::new(cfg.visible_increment, cfg.reveal_margin),
            items: Vec::new(),
            meta: None,
            status: ListStatus::Idle,
            error: None,
            failed: None,
            generation: 0,
            loaded: false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn kind(&self) -> &ListKind {
        &self.kind
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn status(&self) -> ListStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn provenance(&self) -> Provenance {
        classify(self.meta.as_ref())
    }

    pub fn current_limit(&self) -> usize {
        self.window.current_limit()
    }

    /// Rows the consumer should show right now.
    pub fn items(&self) -> &[ListItem] {
        if self.kind.is_server_paginated() {
            &self.items
        } else {
            &self.items[..self.visible.visible(self.items.len())]
        }
    }

    pub fn total_len(&self) -> usize {
        self.items.len()
    }

    pub fn has_more(&self) -> bool {
        if self.kind.is_server_paginated() {
            self.window.has_more()
        } else {
            self.visible.has_more(self.items.len())
        }
    }

    pub fn display_state(&self) -> DisplayState {
        if let Some(message) = &self.error {
            return DisplayState::Errored {
                message: message.clone(),
                stale_rows: !self.items.is_empty(),
            };
        }
        if self.items.is_empty() {
            if self.loaded && self.status != ListStatus::Loading {
                DisplayState::Empty
            } else {
                DisplayState::Loading
            }
        } else {
            DisplayState::Ready
        }
    }

    // ── Request issuing ───────────────────────────────────────────────────────

    fn issue(&mut self, limit: Option<usize>, force_refresh: bool, mode: FetchMode, resets_window: bool) -> PendingFetch<S> {
        self.generation += 1;
        self.status = ListStatus::Loading;
        let query = ListQuery {
            kind: self.kind.clone(),
            limit,
            force_refresh,
            mode,
        };
        debug!("Issuing #{} {:?}", self.generation, query);
        PendingFetch {
            generation: self.generation,
            query,
            resets_window,
            source: Arc::clone(&self.source),
        }
    }

    fn paged_limit(&self, limit: usize) -> Option<usize> {
        self.kind.is_server_paginated().then_some(limit)
    }

    pub fn begin_load(&mut self) -> PendingFetch<S> {
        let limit = self.paged_limit(self.window.current_limit());
        self.issue(limit, false, FetchMode::Initial, false)
    }

    /// Grow the window. Server-paginated lists re-query at the next limit;
    /// whole lists reveal more rows locally and need no request.
    pub fn begin_load_more(&mut self) -> Option<PendingFetch<S>> {
        if !self.kind.is_server_paginated() {
            self.visible.reveal_more(self.items.len());
            return None;
        }
        let next = self.window.next_limit()?;
        Some(self.issue(Some(next), false, FetchMode::Grow, false))
    }

    pub fn begin_refresh(&mut self) -> PendingFetch<S> {
        let limit = self.paged_limit(self.window.initial_limit());
        self.issue(limit, true, FetchMode::Refresh, true)
    }

    /// Re-issue the request that failed, with identical parameters.
    pub fn begin_retry(&mut self) -> Option<PendingFetch<S>> {
        let (query, resets_window) = self.failed.clone()?;
        Some(self.issue(query.limit, query.force_refresh, FetchMode::Retry, resets_window))
    }

    /// Switch movers direction. Accumulated rows, window and sort are reset
    /// immediately so nothing from the old direction survives.
    pub fn set_direction(&mut self, direction: MoverDirection) -> Option<PendingFetch<S>> {
        match self.kind {
            ListKind::Movers { direction: current } if current != direction => {}
            _ => return None,
        }
        info!("Movers direction → {}", direction);
        self.kind = ListKind::Movers { direction };
        self.sort = SortSpec::default_for(&self.kind);
        self.window.reset();
        self.visible.reset();
        self.items.clear();
        self.meta = None;
        self.error = None;
        self.failed = None;
        self.loaded = false;
        Some(self.begin_load())
    }

    pub fn set_sort(&mut self, spec: SortSpec) {
        self.sort = spec;
        sort_items(&mut self.items, spec);
    }

    /// Reveal more rows of a whole list when the consumer scrolls near the end.
    pub fn on_scroll(&mut self, last_seen_index: usize) -> bool {
        if self.kind.is_server_paginated() {
            return false;
        }
        self.visible.on_scroll(last_seen_index, self.items.len())
    }

    /// Forget in-flight work, e.g. when the owning view goes away.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if self.status == ListStatus::Loading {
            self.status = if self.loaded { ListStatus::Ready } else { ListStatus::Idle };
        }
    }

    // ── Applying results ──────────────────────────────────────────────────────

    /// Fold a finished request into the list. Returns false if it was superseded.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!(
                "Discarding stale response #{} (current #{})",
                outcome.generation, self.generation
            );
            return false;
        }

        match outcome.result {
            Ok(page) => {
                if outcome.resets_window {
                    self.window.reset();
                    self.visible.reset();
                }
                if let Some(limit) = outcome.query.limit {
                    self.window.commit_limit(limit);
                }
                self.window.record_fetch(page.fetched);

                let mut items = dedup_first_seen(page.items);
                sort_items(&mut items, self.sort);
                debug!("{:?}: {} rows", self.kind, items.len());

                self.items = items;
                self.meta = page.meta;
                self.error = None;
                self.failed = None;
                self.status = ListStatus::Ready;
                self.loaded = true;
            }
            Err(e) => {
                warn!("{:?} fetch failed: {}", outcome.query.kind, e);
                self.error = Some(e.to_string());
                self.failed = Some((outcome.query, outcome.resets_window));
                self.status = ListStatus::Failed;
            }
        }
        true
    }

    // ── Awaiting conveniences ─────────────────────────────────────────────────

    pub async fn load(&mut self) -> bool {
        let pending = self.begin_load();
        let outcome = pending.run().await;
        self.apply(outcome)
    }

    pub async fn load_more(&mut self) -> bool {
        match self.begin_load_more() {
            Some(pending) => {
                let outcome = pending.run().await;
                self.apply(outcome)
            }
            None => false,
        }
    }

    pub async fn refresh(&mut self) -> bool {
        let outcome = self.begin_refresh().run().await;
        self.apply(outcome)
    }

    pub async fn retry(&mut self) -> bool {
        match self.begin_retry() {
            Some(pending) => {
                let outcome = pending.run().await;
                self.apply(outcome)
            }
            None => false,
        }
    }

    pub async fn change_direction(&mut self, direction: MoverDirection) -> bool {
        match self.set_direction(direction) {
            Some(pending) => {
                let outcome = pending.run().await;
                self.apply(outcome)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::normalize::payload_to_page;
    use crate::error::ApiError;
    use crate::sync::sort::{SortDirection, SortKey};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeSource {
        calls: Mutex<Vec<ListQuery>>,
        fail: AtomicBool,
        payload: fn(&ListQuery) -> Value,
    }

    impl FakeSource {
        fn new(payload: fn(&ListQuery) -> Value) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                payload,
            })
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn calls(&self) -> Vec<ListQuery> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListSource for FakeSource {
        async fn fetch_list(&self, query: &ListQuery) -> ApiResult<ListPage> {
            self.calls.lock().unwrap().push(query.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 503,
                    url: "http://fake/".into(),
                });
            }
            Ok(payload_to_page(&(self.payload)(query)))
        }
    }

    fn rows(prefix: &str, n: usize, sign: f64) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"symbol": format!("{}{}", prefix, i), "change_percent": sign * (i as f64 + 1.0)}))
            .collect()
    }

    /// One side per direction, `limit` rows each, capped at 20 available.
    fn movers_payload(q: &ListQuery) -> Value {
        let n = q.limit.unwrap_or(20).min(20);
        match &q.kind {
            ListKind::Movers { direction: MoverDirection::Gainers } => json!({"gainers": rows("G", n, 1.0)}),
            ListKind::Movers { direction: MoverDirection::Losers } => json!({"losers": rows("L", n, -1.0)}),
            _ => json!({"gainers": rows("G", n, 1.0), "losers": rows("L", n, -1.0)}),
        }
    }

    fn cfg(page_size: usize) -> ListConfig {
        ListConfig {
            page_size,
            movers_max: 20,
            visible_increment: 20,
            reveal_margin: 5,
        }
    }

    fn movers(direction: MoverDirection) -> ListKind {
        ListKind::Movers { direction }
    }

    #[tokio::test]
    async fn test_both_directions_rank_by_magnitude() {
        let source = FakeSource::new(|_| {
            let mut gainers = rows("G", 12, 1.0);
            gainers[3]["change_percent"] = json!(9.5);
            let mut losers = rows("L", 12, -1.0);
            losers[7]["change_percent"] = json!(-14.2);
            json!({"gainers": gainers, "losers": losers})
        });
        let mut sync = ListSynchronizer::new(source.clone(), movers(MoverDirection::Both), &cfg(20));

        assert!(sync.load().await);
        assert_eq!(sync.sort(), SortSpec::new(SortKey::AbsChange, SortDirection::Desc));
        assert_eq!(sync.items().len(), 24);
        assert_eq!(sync.items()[0].symbol, "L7");
        // |12| ties between G11 and L11; arrival order breaks the tie
        assert_eq!(sync.items()[1].symbol, "G11");
        assert_eq!(sync.items()[2].symbol, "L11");
        assert_eq!(source.calls()[0].limit, Some(20));
        // 12 rows against a limit of 20 means the list is exhausted
        assert!(!sync.has_more());
    }

    #[tokio::test]
    async fn test_duplicates_collapse_to_first_seen() {
        let source = FakeSource::new(|_| {
            json!({"data": [
                {"symbol": "aapl", "price": 1.0, "change_percent": 2.0},
                {"symbol": "AAPL", "price": 9.0, "change_percent": 8.0},
                {"symbol": "MSFT", "change_percent": 1.0},
                {"symbol": "AAPL", "price": 7.0}
            ]})
        });
        let mut sync = ListSynchronizer::new(source, ListKind::Opportunities, &cfg(20));
        sync.load().await;
        let aapl: Vec<_> = sync.items().iter().filter(|i| i.symbol == "AAPL").collect();
        assert_eq!(aapl.len(), 1);
        assert_eq!(aapl[0].price, Some(1.0));
    }

    #[tokio::test]
    async fn test_load_more_grows_to_server_max() {
        let source = FakeSource::new(movers_payload);
        let mut sync = ListSynchronizer::new(source.clone(), movers(MoverDirection::Gainers), &cfg(6));

        sync.load().await;
        let mut limits = vec![sync.current_limit()];
        while sync.has_more() {
            assert!(sync.load_more().await);
            limits.push(sync.current_limit());
        }
        assert_eq!(limits, [6, 12, 18, 20]);
        assert_eq!(sync.items().len(), 20);
        assert!(!sync.load_more().await);

        let requested: Vec<usize> = source.calls().iter().filter_map(|q| q.limit).collect();
        assert!(requested.windows(2).all(|w| w[0] <= w[1]));
        assert!(requested.iter().all(|&l| l <= 20));
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() {
        let source = FakeSource::new(|_| json!({"gainers": rows("G", 4, 1.0)}));
        let mut sync = ListSynchronizer::new(source, movers(MoverDirection::Gainers), &cfg(10));
        sync.load().await;
        assert_eq!(sync.current_limit(), 10);
        assert!(!sync.has_more());
        assert!(sync.begin_load_more().is_none());
    }

    #[tokio::test]
    async fn test_direction_switch_clears_before_fetch_resolves() {
        let source = FakeSource::new(movers_payload);
        let mut sync = ListSynchronizer::new(source, movers(MoverDirection::Gainers), &cfg(5));
        sync.load().await;
        sync.load_more().await;
        assert_eq!(sync.current_limit(), 10);

        let pending = sync.set_direction(MoverDirection::Losers).unwrap();
        assert!(sync.items().is_empty());
        assert_eq!(sync.current_limit(), 5);
        assert_eq!(sync.sort(), SortSpec::new(SortKey::Change, SortDirection::Asc));
        assert_eq!(sync.display_state(), DisplayState::Loading);
        assert_eq!(pending.query().limit, Some(5));

        let outcome = pending.run().await;
        assert!(sync.apply(outcome));
        assert!(sync.items().iter().all(|i| i.symbol.starts_with('L')));
        assert_eq!(sync.items()[0].change_percent, Some(-5.0));
        assert!(sync.set_direction(MoverDirection::Losers).is_none());
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let source = FakeSource::new(movers_payload);
        let mut sync = ListSynchronizer::new(source, movers(MoverDirection::Gainers), &cfg(5));

        let old = sync.begin_load();
        let new = sync.set_direction(MoverDirection::Losers).unwrap();

        let new_outcome = new.run().await;
        let old_outcome = old.run().await;
        assert!(sync.apply(new_outcome));
        assert!(!sync.apply(old_outcome));
        assert!(sync.items().iter().all(|i| i.symbol.starts_with('L')));
    }

    #[tokio::test]
    async fn test_refresh_forces_bypass_and_resets_window() {
        let source = FakeSource::new(movers_payload);
        let mut sync = ListSynchronizer::new(source.clone(), movers(MoverDirection::Gainers), &cfg(5));
        sync.load().await;
        sync.load_more().await;
        assert_eq!(sync.current_limit(), 10);

        let pending = sync.begin_refresh();
        assert!(pending.query().force_refresh);
        assert_eq!(pending.query().limit, Some(5));
        // rows stay on screen while the refresh is in flight
        assert_eq!(sync.items().len(), 10);

        let outcome = pending.run().await;
        sync.apply(outcome);
        assert_eq!(sync.current_limit(), 5);
        assert_eq!(sync.items().len(), 5);
        assert!(sync.has_more());
        assert!(!source.calls()[0].force_refresh);
    }

    #[tokio::test]
    async fn test_failure_keeps_rows_and_retry_repeats_request() {
        let source = FakeSource::new(movers_payload);
        let mut sync = ListSynchronizer::new(source.clone(), movers(MoverDirection::Gainers), &cfg(5));
        sync.load().await;

        source.set_failing(true);
        assert!(sync.load_more().await);
        assert_eq!(sync.items().len(), 5);
        assert_eq!(sync.current_limit(), 5);
        assert!(matches!(
            sync.display_state(),
            DisplayState::Errored { stale_rows: true, .. }
        ));

        source.set_failing(false);
        assert!(sync.retry().await);
        let calls = source.calls();
        let (failed, retried) = (&calls[1], &calls[2]);
        assert_eq!(failed.kind, retried.kind);
        assert_eq!(failed.limit, retried.limit);
        assert_eq!(failed.force_refresh, retried.force_refresh);
        assert_eq!(retried.mode, FetchMode::Retry);
        assert_eq!(sync.current_limit(), 10);
        assert_eq!(sync.display_state(), DisplayState::Ready);
        assert!(!sync.retry().await);
    }

    #[tokio::test]
    async fn test_watchlist_failure_keeps_snapshot_and_retries_same_id() {
        let source = FakeSource::new(|_| json!({"data": rows("W", 3, 1.0)}));
        let kind = ListKind::Watchlist { id: "tech".into() };
        let mut sync = ListSynchronizer::new(source.clone(), kind.clone(), &cfg(20));
        sync.load().await;
        assert_eq!(sync.items().len(), 3);

        source.set_failing(true);
        sync.refresh().await;
        assert_eq!(sync.items().len(), 3);
        assert!(sync.error().is_some());

        source.set_failing(false);
        assert!(sync.retry().await);
        let last = source.calls().pop().unwrap();
        assert_eq!(last.kind, kind);
        assert!(last.force_refresh);
        assert!(sync.error().is_none());
    }

    #[tokio::test]
    async fn test_whole_list_reveals_locally() {
        let source = FakeSource::new(|_| json!({"items": rows("W", 45, 1.0)}));
        let mut sync = ListSynchronizer::new(
            source.clone(),
            ListKind::Watchlist { id: "big".into() },
            &cfg(20),
        );
        sync.load().await;
        assert_eq!(source.calls()[0].limit, None);
        assert_eq!(sync.items().len(), 20);
        assert!(sync.has_more());

        assert!(sync.on_scroll(16));
        assert_eq!(sync.items().len(), 40);
        assert!(!sync.load_more().await);
        assert_eq!(sync.items().len(), 45);
        assert!(!sync.has_more());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_drops_in_flight_result() {
        let source = FakeSource::new(movers_payload);
        let mut sync = ListSynchronizer::new(source, movers(MoverDirection::Gainers), &cfg(5));
        let pending = sync.begin_load();
        sync.cancel();
        assert_eq!(sync.status(), ListStatus::Idle);
        assert!(!sync.apply(pending.run().await));
        assert!(sync.items().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_provenance() {
        let source = FakeSource::new(|_| json!({"data": [], "_meta": {"isCache": true, "cacheSource": "pg"}}));
        let mut sync = ListSynchronizer::new(source, ListKind::Opportunities, &cfg(20));
        assert_eq!(sync.display_state(), DisplayState::Loading);
        sync.load().await;
        assert_eq!(sync.display_state(), DisplayState::Empty);
        assert_eq!(sync.provenance().tone, crate::provenance::Tone::Teal);
    }

    #[tokio::test]
    async fn test_pending_fetch_can_be_spawned() {
        let source = FakeSource::new(movers_payload);
        let mut sync = ListSynchronizer::new(source, movers(MoverDirection::Both), &cfg(20));
        let handle = tokio::spawn(sync.begin_load().run());
        let outcome = tokio_test::assert_ok!(handle.await);
        assert!(sync.apply(outcome));
        assert_eq!(sync.items().len(), 40);
    }
}
