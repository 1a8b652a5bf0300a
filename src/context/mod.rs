//! Shared selection state: focused symbol, active helper and its payload.
//!
//! One `SelectionStore` exists per session. Every mutation goes through a named
//! setter, and each setter does its read-then-write inside a single
//! `send_modify` / `send_if_modified` closure so no other writer can interleave.
//! Readers hold a `watch::Receiver` and are woken on change.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HelperId {
    Charting,
    Action,
    Learning,
    StockInfo,
    Assistant,
    List,
    CompanyCalendar,
    Calendar,
}

impl HelperId {
    pub const ALL: [HelperId; 8] = [
        HelperId::Charting,
        HelperId::Action,
        HelperId::Learning,
        HelperId::StockInfo,
        HelperId::Assistant,
        HelperId::List,
        HelperId::CompanyCalendar,
        HelperId::Calendar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HelperId::Charting => "charting",
            HelperId::Action => "action",
            HelperId::Learning => "learning",
            HelperId::StockInfo => "stockInfo",
            HelperId::Assistant => "assistant",
            HelperId::List => "list",
            HelperId::CompanyCalendar => "companyCalendar",
            HelperId::Calendar => "calendar",
        }
    }
}

impl fmt::Display for HelperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownHelper(pub String);

impl fmt::Display for UnknownHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown helper '{}'", self.0)
    }
}

impl std::error::Error for UnknownHelper {}

impl FromStr for HelperId {
    type Err = UnknownHelper;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HelperId::ALL
            .into_iter()
            .find(|h| h.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownHelper(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Experience {
    Novice,
    #[default]
    Intermediate,
    Power,
}

// ── Helper payload ────────────────────────────────────────────────────────────

/// Free-form payload handed to a helper. Well-known keys get typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HelperContext(Map<String, Value>);

impl HelperContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn symbol(&self) -> Option<&str> {
        self.text("symbol")
    }

    pub fn topic(&self) -> Option<&str> {
        self.text("topic")
    }

    pub fn trigger(&self) -> Option<&str> {
        self.text("trigger")
    }

    pub fn source(&self) -> Option<&str> {
        self.text("source")
    }

    pub fn kind(&self) -> Option<&str> {
        self.text("kind")
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.0.get("params").and_then(Value::as_object)
    }

    /// Shallow merge; keys in `other` win.
    pub fn merge(&mut self, other: HelperContext) {
        self.0.extend(other.0);
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<Map<String, Value>> for HelperContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub selected_symbol: Option<String>,
    pub active_helper: Option<HelperId>,
    pub helper_context: HelperContext,
    pub experience: Experience,
}

#[derive(Debug, Clone)]
pub struct SelectionStore {
    tx: Arc<watch::Sender<Selection>>,
}

impl SelectionStore {
    pub fn new(experience: Experience) -> Self {
        let (tx, _) = watch::channel(Selection {
            experience,
            ..Selection::default()
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Selection {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.tx.subscribe()
    }

    pub fn select_symbol(&self, symbol: Option<&str>) {
        let symbol = symbol
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        self.tx.send_if_modified(|sel| {
            if sel.selected_symbol == symbol {
                return false;
            }
            sel.selected_symbol = symbol;
            true
        });
    }

    /// Activate `helper`, replacing whatever context the previous helper had.
    pub fn set_active_helper(&self, helper: HelperId, context: HelperContext) {
        debug!("Helper → {}", helper);
        self.tx.send_modify(|sel| {
            sel.active_helper = Some(helper);
            sel.helper_context = context;
        });
    }

    /// Activate `helper` carrying the prior context forward, with `extra` on top.
    pub fn open_helper_spread(&self, helper: HelperId, extra: HelperContext) {
        self.tx.send_modify(|sel| {
            sel.active_helper = Some(helper);
            sel.helper_context.merge(extra);
        });
    }

    /// Merge into the active helper's context. Ignored when nothing is open.
    pub fn set_helper_context(&self, partial: HelperContext) {
        self.tx.send_if_modified(|sel| {
            if sel.active_helper.is_none() {
                debug!("Context update with no active helper ignored");
                return false;
            }
            sel.helper_context.merge(partial);
            true
        });
    }

    /// Close the active helper. Returns what was open; a no-op when nothing was.
    pub fn clear_helper(&self) -> Option<HelperId> {
        let mut closed = None;
        self.tx.send_if_modified(|sel| {
            if sel.active_helper.is_none() && sel.helper_context.is_empty() {
                return false;
            }
            closed = sel.active_helper.take();
            sel.helper_context.clear();
            true
        });
        closed
    }

    pub fn set_experience(&self, experience: Experience) {
        self.tx.send_if_modified(|sel| {
            let changed = sel.experience != experience;
            sel.experience = experience;
            changed
        });
    }
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new(Experience::default())
    }
}
