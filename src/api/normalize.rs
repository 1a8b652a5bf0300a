use crate::models::{CacheMeta, CacheSource, ListItem, ListPage};
use serde_json::{Map, Value};
use tracing::warn;

// ── Scalars ───────────────────────────────────────────────────────────────────

/// Parse a number that may arrive as JSON number or decorated string.
/// "1,234.56" → 1234.56 | "+2.3%" → 2.3 | "N/A" → None
pub fn parse_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_decorated(s),
        _ => None,
    }
}

fn parse_decorated(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    // accounting style: "(2.5)" is -2.5
    let (negate, body) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '+' | '$') && !c.is_whitespace())
        .collect();
    let n = cleaned.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Some(if negate { -n } else { n })
}

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

/// First present, parseable numeric field among `keys`.
fn number_field(row: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| row.get(*k).and_then(parse_number))
}

fn string_field(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        row.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

// ── Rows → ListItem ───────────────────────────────────────────────────────────

/// Map one heterogeneous source row onto a `ListItem`.
/// Price comes from `price` or `last`; change from `change_percent`, `changePercent` or `change`.
pub fn row_to_item(row: &Value) -> Option<ListItem> {
    let obj = match row {
        Value::Object(o) => o,
        // Watchlists sometimes come back as bare symbol strings
        Value::String(s) if !s.trim().is_empty() => return Some(ListItem::new(normalise_symbol(s))),
        _ => return None,
    };

    let symbol = string_field(obj, &["symbol", "ticker"])?;

    Some(ListItem {
        symbol: normalise_symbol(&symbol),
        name: string_field(obj, &["name", "company_name", "companyName"]),
        price: number_field(obj, &["price", "last", "last_price", "close"]),
        change_percent: number_field(
            obj,
            &["change_percent", "changePercent", "change_pct", "change"],
        ),
    })
}

pub fn rows_to_items(rows: &[Value]) -> Vec<ListItem> {
    let mut dropped = 0usize;
    let items: Vec<ListItem> = rows
        .iter()
        .filter_map(|r| {
            let item = row_to_item(r);
            if item.is_none() {
                dropped += 1;
            }
            item
        })
        .collect();
    if dropped > 0 {
        warn!("Dropped {} rows without a symbol", dropped);
    }
    items
}

// ── Payload shapes ────────────────────────────────────────────────────────────

const ROW_KEYS: [&str; 5] = ["data", "items", "results", "symbols", "rows"];

/// Pull row arrays out of whatever envelope the endpoint used.
/// Returns one slice per side (gainers and losers are two sides).
pub fn extract_row_groups(payload: &Value) -> Vec<&[Value]> {
    match payload {
        Value::Array(rows) => vec![rows.as_slice()],
        Value::Object(obj) => {
            let sided: Vec<&[Value]> = ["gainers", "losers"]
                .iter()
                .filter_map(|k| obj.get(*k).and_then(Value::as_array))
                .map(|a| a.as_slice())
                .collect();
            if !sided.is_empty() {
                return sided;
            }
            for key in ROW_KEYS {
                if let Some(inner) = obj.get(key) {
                    let groups = extract_row_groups(inner);
                    if !groups.is_empty() {
                        return groups;
                    }
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Build a `ListPage` from a raw list payload.
pub fn payload_to_page(payload: &Value) -> ListPage {
    let groups = extract_row_groups(payload);
    let fetched = groups.iter().map(|g| g.len()).max().unwrap_or(0);
    let items = groups.iter().flat_map(|g| rows_to_items(g)).collect();

    ListPage {
        items,
        fetched,
        meta: extract_meta(payload),
    }
}

// ── Cache metadata ────────────────────────────────────────────────────────────

fn as_flag(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn meta_from_object(obj: &Map<String, Value>) -> Option<CacheMeta> {
    let is_cache = as_flag(obj.get("isCache").or_else(|| obj.get("is_cache")));
    let stale = as_flag(obj.get("stale"));
    let source = obj
        .get("cacheSource")
        .or_else(|| obj.get("cache_source"))
        .and_then(Value::as_str)
        .map(|s| CacheSource::from(s.to_string()));

    if is_cache.is_none() && stale.is_none() && source.is_none() {
        return None;
    }
    Some(CacheMeta {
        is_cache: is_cache.unwrap_or(false),
        cache_source: source,
        stale: stale.unwrap_or(false),
    })
}

/// Find provenance either in a `meta` / `_meta` object or as top-level keys.
pub fn extract_meta(payload: &Value) -> Option<CacheMeta> {
    let obj = payload.as_object()?;
    ["_meta", "meta", "cache"]
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_object))
        .find_map(meta_from_object)
        .or_else(|| meta_from_object(obj))
}

/// Strip the envelope from a non-list payload: `{data: …}` unwraps to the inner value.
pub fn unwrap_data(payload: Value) -> Value {
    match payload {
        Value::Object(mut obj) if obj.contains_key("data") => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
