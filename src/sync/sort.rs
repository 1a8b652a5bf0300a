use crate::models::{ListItem, ListKind, MoverDirection};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Change,
    AbsChange,
    Price,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Two-sided movers rank by magnitude; one-sided lists rank by signed change
    /// with the strongest move first.
    pub fn default_for(kind: &ListKind) -> Self {
        match kind {
            ListKind::Movers {
                direction: MoverDirection::Both,
            } => Self::new(SortKey::AbsChange, SortDirection::Desc),
            ListKind::Movers {
                direction: MoverDirection::Losers,
            } => Self::new(SortKey::Change, SortDirection::Asc),
            ListKind::Movers {
                direction: MoverDirection::Gainers,
            }
            | ListKind::Watchlist { .. }
            | ListKind::Opportunities => Self::new(SortKey::Change, SortDirection::Desc),
        }
    }

    pub fn reversed(self) -> Self {
        let direction = match self.direction {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        };
        Self { direction, ..self }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self.key {
            SortKey::Change => "change",
            SortKey::AbsChange => "abs_change",
            SortKey::Price => "price",
            SortKey::Symbol => "symbol",
        };
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{}", key, dir)
    }
}

/// Parses `key[:dir]`, e.g. `abs_change:desc` or `symbol`.
impl FromStr for SortSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, dir) = s.split_once(':').unwrap_or((s, "desc"));
        let key = match key.trim().to_ascii_lowercase().as_str() {
            "change" => SortKey::Change,
            "abs_change" | "abs" => SortKey::AbsChange,
            "price" => SortKey::Price,
            "symbol" => SortKey::Symbol,
            other => return Err(format!("unknown sort key '{}'", other)),
        };
        let direction = match dir.trim().to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => return Err(format!("unknown sort direction '{}'", other)),
        };
        Ok(Self { key, direction })
    }
}

// ── Dedup + sort ──────────────────────────────────────────────────────────────

/// Keep the first row seen for each symbol, preserving arrival order.
pub fn dedup_first_seen(items: Vec<ListItem>) -> Vec<ListItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.symbol.clone()))
        .collect()
}

fn numeric(item: &ListItem, key: SortKey) -> Option<f64> {
    match key {
        SortKey::Change => item.change_percent,
        SortKey::AbsChange => item.change_percent.map(f64::abs),
        SortKey::Price => item.price,
        SortKey::Symbol => None,
    }
}

/// Comparator for `spec`. Rows missing the sort field go last in either direction.
pub fn compare(a: &ListItem, b: &ListItem, spec: SortSpec) -> Ordering {
    let ordered = |ord: Ordering| match spec.direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    };

    if spec.key == SortKey::Symbol {
        return ordered(a.symbol.to_lowercase().cmp(&b.symbol.to_lowercase()));
    }

    match (numeric(a, spec.key), numeric(b, spec.key)) {
        (Some(x), Some(y)) => ordered(x.total_cmp(&y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable in-place sort; ties keep their prior relative order.
pub fn sort_items(items: &mut [ListItem], spec: SortSpec) {
    items.sort_by(|a, b| compare(a, b, spec));
}
