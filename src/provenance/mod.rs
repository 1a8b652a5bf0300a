//! Display classification for cache-provenance metadata.

use crate::models::{CacheMeta, CacheSource};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Green,
    Amber,
    Purple,
    Teal,
    Gray,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub tone: Tone,
    pub label: String,
}

/// Classify where a response came from. Total over every input, including `None`.
///
/// Precedence: `stale` wins over everything, then a non-cached response is fresh,
/// then the cache tier picks the tone.
pub fn classify(meta: Option<&CacheMeta>) -> Provenance {
    let Some(meta) = meta else {
        return fresh();
    };

    let base = if meta.is_cache {
        cached_label(meta.cache_source.as_ref())
    } else {
        "Fresh".to_string()
    };

    if meta.stale {
        return Provenance {
            tone: Tone::Amber,
            label: format!("{} (stale)", base),
        };
    }
    if !meta.is_cache {
        return fresh();
    }

    let tone = match meta.cache_source {
        Some(CacheSource::Redis) => Tone::Purple,
        Some(CacheSource::Postgres) => Tone::Teal,
        _ => Tone::Gray,
    };
    Provenance { tone, label: base }
}

fn fresh() -> Provenance {
    Provenance {
        tone: Tone::Green,
        label: "Fresh".to_string(),
    }
}

fn cached_label(source: Option<&CacheSource>) -> String {
    match source {
        Some(CacheSource::Redis) => "Cached · Redis".to_string(),
        Some(CacheSource::Postgres) => "Cached · Postgres".to_string(),
        Some(CacheSource::Other(s)) if !s.is_empty() => format!("Cached · {}", s),
        _ => "Cached".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(is_cache: bool, source: Option<&str>, stale: bool) -> CacheMeta {
        CacheMeta {
            is_cache,
            cache_source: source.map(|s| CacheSource::from(s.to_string())),
            stale,
        }
    }

    #[test]
    fn test_missing_meta_is_fresh() {
        assert_eq!(classify(None), fresh());
        assert_eq!(classify(Some(&CacheMeta::default())), fresh());
    }

    #[test]
    fn test_stale_overrides_redis() {
        let p = classify(Some(&meta(true, Some("redis"), true)));
        assert_eq!(p.tone, Tone::Amber);
        assert!(p.label.contains("(stale)"));
    }

    #[test]
    fn test_stale_even_when_not_cached() {
        let p = classify(Some(&meta(false, None, true)));
        assert_eq!(p.tone, Tone::Amber);
        assert_eq!(p.label, "Fresh (stale)");
    }

    #[test]
    fn test_not_cached_ignores_source() {
        assert_eq!(classify(Some(&meta(false, Some("redis"), false))), fresh());
    }

    #[test]
    fn test_tiers() {
        assert_eq!(classify(Some(&meta(true, Some("redis"), false))).tone, Tone::Purple);
        for pg in ["pg", "postgres", "postgresql"] {
            assert_eq!(classify(Some(&meta(true, Some(pg), false))).tone, Tone::Teal);
        }
        let other = classify(Some(&meta(true, Some("disk"), false)));
        assert_eq!(other.tone, Tone::Gray);
        assert_eq!(other.label, "Cached · disk");
        assert_eq!(classify(Some(&meta(true, None, false))).tone, Tone::Gray);
    }
}
