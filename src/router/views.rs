use crate::context::{Experience, HelperContext, HelperId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Static description of a helper surface, built once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperDescriptor {
    pub id: HelperId,
    pub title: &'static str,
    pub requires_symbol: bool,
    /// Controls exposed at the current experience level.
    pub options: Vec<&'static str>,
}

impl HelperDescriptor {
    fn build(id: HelperId, experience: Experience) -> Self {
        let (title, requires_symbol, tiers): (_, _, [&[&'static str]; 3]) = match id {
            HelperId::Charting => (
                "Chart",
                true,
                [&["line"], &["candles", "volume"], &["indicators", "compare", "drawing"]],
            ),
            HelperId::Action => (
                "Trade ideas",
                true,
                [&["watch"], &["alert"], &["screen_similar", "options_chain"]],
            ),
            HelperId::Learning => (
                "Learn",
                false,
                [&["basics"], &["strategies"], &["greeks", "backtests"]],
            ),
            HelperId::StockInfo => (
                "Stock info",
                true,
                [&["overview", "news"], &["fundamentals"], &["options_flow"]],
            ),
            HelperId::Assistant => ("Assistant", false, [&["ask"], &["explain"], &["raw_data"]]),
            HelperId::List => (
                "Lists",
                false,
                [&["movers", "watchlists"], &["opportunities"], &["sort", "bulk_edit"]],
            ),
            HelperId::CompanyCalendar => (
                "Company events",
                true,
                [&["earnings"], &["dividends"], &["splits"]],
            ),
            HelperId::Calendar => (
                "Market calendar",
                false,
                [&["economic"], &["holidays"], &["region_filter"]],
            ),
        };
        let depth = match experience {
            Experience::Novice => 1,
            Experience::Intermediate => 2,
            Experience::Power => 3,
        };
        Self {
            id,
            title,
            requires_symbol,
            options: tiers[..depth].iter().flat_map(|t| t.iter().copied()).collect(),
        }
    }
}

/// Concrete body a helper renders for its current context.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperView {
    Charting { symbol: String, timeframe: Option<String> },
    Action { symbol: String, trigger: Option<String> },
    Learning { topic: Option<String> },
    StockInfo { symbol: String },
    Assistant { topic: Option<String>, source: Option<String> },
    List { kind: Option<String>, source: Option<String> },
    CompanyCalendar { symbol: String },
    Calendar { kind: Option<String> },
    /// Neutral placeholder for a symbol-bound helper opened without one.
    SelectSymbolPrompt { helper: HelperId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedView {
    pub descriptor: Arc<HelperDescriptor>,
    pub view: HelperView,
}

/// Builds helper descriptors on first use and hands out the cached copy after.
#[derive(Debug, Default)]
pub struct ViewFactory {
    cache: HashMap<(HelperId, Experience), Arc<HelperDescriptor>>,
    constructed: usize,
}

impl ViewFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constructed(&self) -> usize {
        self.constructed
    }

    pub fn descriptor(&mut self, id: HelperId, experience: Experience) -> Arc<HelperDescriptor> {
        let constructed = &mut self.constructed;
        self.cache
            .entry((id, experience))
            .or_insert_with(|| {
                *constructed += 1;
                debug!("Built {} descriptor ({:?})", id, experience);
                Arc::new(HelperDescriptor::build(id, experience))
            })
            .clone()
    }

    /// `fallback_symbol` is the store's selected symbol, used when the helper
    /// payload carries none.
    pub fn resolve(
        &mut self,
        id: HelperId,
        ctx: &HelperContext,
        fallback_symbol: Option<&str>,
        experience: Experience,
    ) -> ResolvedView {
        let descriptor = self.descriptor(id, experience);
        let symbol = ctx.symbol().or(fallback_symbol).map(str::to_string);
        let text = |key: &str| ctx.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let view = match (id, symbol) {
            (HelperId::Charting, Some(symbol)) => HelperView::Charting {
                symbol,
                timeframe: text("timeframe"),
            },
            (HelperId::Action, Some(symbol)) => HelperView::Action {
                symbol,
                trigger: ctx.trigger().map(str::to_string),
            },
            (HelperId::StockInfo, Some(symbol)) => HelperView::StockInfo { symbol },
            (HelperId::CompanyCalendar, Some(symbol)) => HelperView::CompanyCalendar { symbol },
            (HelperId::Learning, _) => HelperView::Learning {
                topic: ctx.topic().map(str::to_string),
            },
            (HelperId::Assistant, _) => HelperView::Assistant {
                topic: ctx.topic().map(str::to_string),
                source: ctx.source().map(str::to_string),
            },
            (HelperId::List, _) => HelperView::List {
                kind: ctx.kind().map(str::to_string),
                source: ctx.source().map(str::to_string),
            },
            (HelperId::Calendar, _) => HelperView::Calendar {
                kind: ctx.kind().map(str::to_string),
            },
            (
                HelperId::Charting | HelperId::Action | HelperId::StockInfo | HelperId::CompanyCalendar,
                None,
            ) => {
                debug!("{} opened without a symbol", id);
                HelperView::SelectSymbolPrompt { helper: id }
            }
        };
        ResolvedView { descriptor, view }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_built_once() {
        let mut factory = ViewFactory::new();
        let a = factory.descriptor(HelperId::Charting, Experience::Power);
        let b = factory.descriptor(HelperId::Charting, Experience::Power);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.constructed(), 1);
        factory.descriptor(HelperId::Charting, Experience::Novice);
        assert_eq!(factory.constructed(), 2);
    }

    #[test]
    fn test_options_grow_with_experience() {
        let mut factory = ViewFactory::new();
        let novice = factory.descriptor(HelperId::StockInfo, Experience::Novice);
        let power = factory.descriptor(HelperId::StockInfo, Experience::Power);
        assert_eq!(novice.options, ["overview", "news"]);
        assert!(power.options.contains(&"options_flow"));
        assert!(power.options.starts_with(&novice.options));
    }

    #[test]
    fn test_symbol_helpers_without_symbol_prompt() {
        let mut factory = ViewFactory::new();
        let empty = HelperContext::new();
        for id in [
            HelperId::Charting,
            HelperId::Action,
            HelperId::StockInfo,
            HelperId::CompanyCalendar,
        ] {
            let resolved = factory.resolve(id, &empty, None, Experience::Intermediate);
            assert_eq!(resolved.view, HelperView::SelectSymbolPrompt { helper: id });
            assert!(resolved.descriptor.requires_symbol);
        }
    }

    #[test]
    fn test_selected_symbol_fills_missing_context() {
        let mut factory = ViewFactory::new();
        let ctx = HelperContext::new().with("timeframe", "1W");
        let resolved = factory.resolve(HelperId::Charting, &ctx, Some("AAPL"), Experience::Novice);
        assert_eq!(
            resolved.view,
            HelperView::Charting {
                symbol: "AAPL".into(),
                timeframe: Some("1W".into())
            }
        );

        let ctx = HelperContext::new().with("symbol", "MSFT");
        let resolved = factory.resolve(HelperId::StockInfo, &ctx, Some("AAPL"), Experience::Novice);
        assert_eq!(resolved.view, HelperView::StockInfo { symbol: "MSFT".into() });
    }
}
