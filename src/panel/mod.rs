//! Data panels: display states, the stock-insight join and phase-gated refresh.

use crate::api::InsightSource;
use crate::config::SessionConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{CompanyOverview, Envelope, Fundamentals, NewsSentiment, OptionsActivity};
use crate::provenance::{Provenance, classify};
use crate::session::{SessionPhase, SessionStatus, refresh_cadence};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Display state of a data-driven panel. An errored panel may still carry the
/// last good value so it can stay on screen under the error banner.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelState<T> {
    Loading,
    Empty,
    Errored { message: String, stale: Option<T> },
    Ready(T),
}

impl<T> PanelState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            PanelState::Ready(v) => Some(v),
            PanelState::Errored { stale, .. } => stale.as_ref(),
            PanelState::Loading | PanelState::Empty => None,
        }
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, PanelState::Errored { .. })
    }

    fn into_data(self) -> Option<T> {
        match self {
            PanelState::Ready(v) => Some(v),
            PanelState::Errored { stale, .. } => stale,
            PanelState::Loading | PanelState::Empty => None,
        }
    }
}

// ── Stock insights ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StockInsights {
    pub symbol: String,
    pub overview: Option<Envelope<CompanyOverview>>,
    pub fundamentals: Option<Envelope<Fundamentals>>,
    pub news: Option<Envelope<NewsSentiment>>,
    pub options: Option<Envelope<Vec<OptionsActivity>>>,
    /// Parts that failed, with the error text.
    pub failures: Vec<(&'static str, String)>,
}

impl StockInsights {
    pub fn has_content(&self) -> bool {
        self.overview.is_some()
            || self.fundamentals.is_some()
            || self.news.as_ref().is_some_and(|n| !n.data.items.is_empty())
            || self.options.as_ref().is_some_and(|o| !o.data.is_empty())
    }

    /// Provenance of the headline part that loaded.
    pub fn provenance(&self) -> Provenance {
        let meta = self
            .overview
            .as_ref()
            .and_then(|e| e.meta.as_ref())
            .or_else(|| self.fundamentals.as_ref().and_then(|e| e.meta.as_ref()))
            .or_else(|| self.news.as_ref().and_then(|e| e.meta.as_ref()))
            .or_else(|| self.options.as_ref().and_then(|e| e.meta.as_ref()));
        classify(meta)
    }
}

fn keep<T>(part: &'static str, result: ApiResult<T>, failures: &mut Vec<(&'static str, String)>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Insight part '{}' failed: {}", part, e);
            failures.push((part, e.to_string()));
            None
        }
    }
}

/// Fetch the four insight parts concurrently. Any subset may fail; only a
/// total failure is an error.
pub async fn load_stock_insights<S: InsightSource + ?Sized>(source: &S, symbol: &str) -> ApiResult<StockInsights> {
    let (overview, fundamentals, news, options) = tokio::join!(
        source.overview(symbol),
        source.fundamentals(symbol),
        source.news_sentiment(symbol),
        source.unusual_options(symbol),
    );

    let mut failures = Vec::new();
    let insights = StockInsights {
        symbol: symbol.to_string(),
        overview: keep("overview", overview, &mut failures),
        fundamentals: keep("fundamentals", fundamentals, &mut failures),
        news: keep("news", news, &mut failures),
        options: keep("options", options, &mut failures),
        failures,
    };

    if insights.failures.len() == 4 {
        return Err(ApiError::AllFailed(4));
    }
    Ok(insights)
}

pub struct PendingInsights<S: InsightSource + ?Sized> {
    generation: u64,
    symbol: String,
    source: Arc<S>,
}

impl<S: InsightSource + ?Sized> PendingInsights<S> {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub async fn run(self) -> InsightOutcome {
        let result = load_stock_insights(&*self.source, &self.symbol).await;
        InsightOutcome {
            generation: self.generation,
            result,
        }
    }
}

pub struct InsightOutcome {
    generation: u64,
    result: ApiResult<StockInsights>,
}

/// Stock-info body. Tracks one symbol at a time; results for a symbol the
/// panel has since moved away from are dropped.
pub struct StockInfoPanel<S: InsightSource + ?Sized> {
    source: Arc<S>,
    symbol: Option<String>,
    generation: u64,
    state: PanelState<StockInsights>,
}

impl<S: InsightSource + ?Sized> StockInfoPanel<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            symbol: None,
            generation: 0,
            state: PanelState::Empty,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// No symbol to show: render the neutral "select a symbol" prompt.
    pub fn needs_symbol(&self) -> bool {
        self.symbol.is_none()
    }

    pub fn state(&self) -> &PanelState<StockInsights> {
        &self.state
    }

    fn issue(&mut self) -> Option<PendingInsights<S>> {
        let symbol = self.symbol.clone()?;
        self.generation += 1;
        Some(PendingInsights {
            generation: self.generation,
            symbol,
            source: Arc::clone(&self.source),
        })
    }

    /// Point the panel at `symbol`. Returns the fetch to run, if any.
    pub fn show(&mut self, symbol: Option<&str>) -> Option<PendingInsights<S>> {
        let symbol = symbol
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        if symbol.is_none() {
            self.symbol = None;
            self.generation += 1;
            self.state = PanelState::Empty;
            return None;
        }
        if symbol == self.symbol && !self.state.is_errored() {
            return None;
        }
        self.symbol = symbol;
        self.state = PanelState::Loading;
        self.issue()
    }

    /// Re-run the current symbol's request, keeping what is on screen.
    pub fn reload(&mut self) -> Option<PendingInsights<S>> {
        if matches!(self.state, PanelState::Empty) {
            self.state = PanelState::Loading;
        }
        self.issue()
    }

    pub fn apply(&mut self, outcome: InsightOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!("Dropping insights for superseded request #{}", outcome.generation);
            return false;
        }
        let previous = std::mem::replace(&mut self.state, PanelState::Loading);
        self.state = match outcome.result {
            Ok(insights) if insights.has_content() => PanelState::Ready(insights),
            Ok(_) => PanelState::Empty,
            Err(e) => PanelState::Errored {
                message: e.to_string(),
                stale: previous.into_data(),
            },
        };
        true
    }

    pub async fn load(&mut self, symbol: &str) -> &PanelState<StockInsights> {
        if let Some(pending) = self.show(Some(symbol)) {
            let outcome = pending.run().await;
            self.apply(outcome);
        }
        &self.state
    }

    /// Forget in-flight work (unmount).
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}

// ── Auto refresh ──────────────────────────────────────────────────────────────

/// Runs a callback on the polling cadence of the current session phase.
/// The cadence follows phase changes published by the session clock. Dropping
/// the handle stops the task.
pub struct AutoRefresh {
    task: JoinHandle<()>,
}

impl AutoRefresh {
    pub fn spawn<F, Fut>(mut session: watch::Receiver<SessionStatus>, cfg: SessionConfig, mut on_tick: F) -> Self
    where
        F: FnMut(SessionPhase) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut phase = session.borrow_and_update().phase;
            let mut last = Instant::now();
            loop {
                let deadline = last + refresh_cadence(phase, &cfg);
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        on_tick(phase).await;
                        last = Instant::now();
                    }
                    changed = session.changed() => {
                        if changed.is_err() {
                            debug!("Session clock gone; auto refresh stopping");
                            break;
                        }
                        let next = session.borrow_and_update().phase;
                        if next != phase {
                            debug!("Refresh cadence follows {:?} → {:?}", phase, next);
                            phase = next;
                        }
                    }
                }
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.task.abort();
    }
}
