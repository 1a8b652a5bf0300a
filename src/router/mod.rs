//! Routes selection state to one helper surface and one presentation mode.
//!
//! The router never stores which helper is open; that lives in the
//! `SelectionStore`. It owns everything derived from viewport and keyboard:
//! presentation mode, the focus to hand back on close, the drawer tab trap and
//! the lazily built helper descriptors.

pub mod focus;
pub mod presentation;
pub mod views;

pub use focus::FocusTrap;
pub use presentation::{Breakpoints, PresentationMode, derive_presentation_mode};
pub use views::{HelperDescriptor, HelperView, ResolvedView, ViewFactory};

use crate::context::{HelperContext, HelperId, SelectionStore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    /// A symbol is selected but no helper is open. `mode` is `None` on phones.
    Contextual {
        symbol: String,
        mode: Option<PresentationMode>,
    },
    HelperOpen {
        helper: HelperId,
        mode: PresentationMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Tab,
    ShiftTab,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Helper closed; carries the element that should regain focus, if any.
    Closed { restore_focus: Option<String> },
    /// Focus moved inside the trap.
    Focus(String),
    Ignored,
}

pub struct HelperRouter {
    store: SelectionStore,
    breakpoints: Breakpoints,
    width: u32,
    factory: ViewFactory,
    focused: Option<String>,
    return_focus: Option<String>,
    trap: FocusTrap,
}

impl HelperRouter {
    pub fn new(store: SelectionStore, breakpoints: Breakpoints, width: u32) -> Self {
        Self {
            store,
            breakpoints,
            width,
            factory: ViewFactory::new(),
            focused: None,
            return_focus: None,
            trap: FocusTrap::default(),
        }
    }

    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn mode(&self) -> Option<PresentationMode> {
        let active = self.store.snapshot().active_helper;
        derive_presentation_mode(self.width, active, &self.breakpoints)
    }

    pub fn state(&self) -> RouterState {
        let sel = self.store.snapshot();
        let mode = derive_presentation_mode(self.width, sel.active_helper, &self.breakpoints);
        match (sel.active_helper, sel.selected_symbol, mode) {
            (Some(helper), _, Some(mode)) => RouterState::HelperOpen { helper, mode },
            (None, Some(symbol), mode) => RouterState::Contextual { symbol, mode },
            _ => RouterState::Idle,
        }
    }

    // ── Opening / closing ─────────────────────────────────────────────────────

    pub fn select_symbol(&self, symbol: Option<&str>) {
        self.store.select_symbol(symbol);
    }

    /// Open `helper` with a fresh context. Returns whether it opened.
    ///
    /// Stock info is a phone-only drawer; elsewhere the side panel shows the
    /// same content, so the request only selects the symbol.
    pub fn open(&mut self, helper: HelperId, ctx: HelperContext) -> bool {
        if !self.admit(helper, &ctx) {
            return false;
        }
        self.remember_focus();
        self.store.set_active_helper(helper, ctx);
        true
    }

    /// Open `helper` keeping the previous helper's context underneath `extra`.
    pub fn open_spread(&mut self, helper: HelperId, extra: HelperContext) -> bool {
        if !self.admit(helper, &extra) {
            return false;
        }
        self.remember_focus();
        self.store.open_helper_spread(helper, extra);
        true
    }

    /// String entry point for links and assistant actions. Unknown names are
    /// logged and ignored.
    pub fn open_by_name(&mut self, name: &str, ctx: HelperContext) -> bool {
        match name.parse::<HelperId>() {
            Ok(helper) => self.open(helper, ctx),
            Err(e) => {
                warn!("Ignoring helper request: {}", e);
                false
            }
        }
    }

    pub fn set_context(&self, partial: HelperContext) {
        self.store.set_helper_context(partial);
    }

    /// Close whatever is open. Safe to call repeatedly.
    pub fn close(&mut self) -> KeyOutcome {
        let mode = self.mode();
        let Some(closed) = self.store.clear_helper() else {
            return KeyOutcome::Ignored;
        };
        self.trap = FocusTrap::default();
        let saved = self.return_focus.take();
        let restore_focus = if mode.is_some_and(|m| m.is_drawer()) {
            saved
        } else {
            None
        };
        if restore_focus.is_some() {
            self.focused = restore_focus.clone();
        }
        debug!("Closed {} (focus → {:?})", closed, restore_focus);
        KeyOutcome::Closed { restore_focus }
    }

    /// Viewport changed. Presentation is re-derived on read; the only side
    /// effect is closing stock info once the viewport is no longer a phone.
    pub fn resize(&mut self, width: u32) -> Option<HelperId> {
        let was_mobile = self.breakpoints.is_mobile(self.width);
        self.width = width;
        let open = self.store.snapshot().active_helper;
        if open == Some(HelperId::StockInfo) && !self.breakpoints.is_mobile(width) {
            info!(
                "Closing stock info: viewport {}px is not mobile (was mobile: {})",
                width, was_mobile
            );
            self.close();
            return Some(HelperId::StockInfo);
        }
        None
    }

    fn admit(&self, helper: HelperId, ctx: &HelperContext) -> bool {
        if helper == HelperId::StockInfo && !self.breakpoints.is_mobile(self.width) {
            debug!("Stock info declined at {}px; using side panel", self.width);
            if let Some(symbol) = ctx.symbol() {
                self.store.select_symbol(Some(symbol));
            }
            return false;
        }
        true
    }

    fn remember_focus(&mut self) {
        if self.store.snapshot().active_helper.is_none() {
            self.return_focus = self.focused.clone();
        }
    }

    // ── Focus ─────────────────────────────────────────────────────────────────

    /// Record where keyboard focus currently is.
    pub fn note_focus(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.trap.focus(&id);
        self.focused = Some(id);
    }

    /// Focusable elements of the open helper, in tab order.
    pub fn set_focus_order<I, S>(&mut self, order: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trap = FocusTrap::new(order);
    }

    pub fn handle_key(&mut self, key: Key) -> KeyOutcome {
        if key == Key::Escape {
            return self.close();
        }
        if !self.mode().is_some_and(|m| m.is_drawer()) || self.store.snapshot().active_helper.is_none() {
            return KeyOutcome::Ignored;
        }
        let next = match key {
            Key::Tab => self.trap.next(),
            Key::ShiftTab => self.trap.prev(),
            Key::Escape => None,
        };
        match next.map(str::to_string) {
            Some(id) => {
                self.focused = Some(id.clone());
                KeyOutcome::Focus(id)
            }
            None => KeyOutcome::Ignored,
        }
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    /// Body for the open helper, or `None` when nothing is open.
    pub fn current_view(&mut self) -> Option<ResolvedView> {
        let sel = self.store.snapshot();
        let helper = sel.active_helper?;
        Some(self.factory.resolve(
            helper,
            &sel.helper_context,
            sel.selected_symbol.as_deref(),
            sel.experience,
        ))
    }

    pub fn factory(&self) -> &ViewFactory {
        &self.factory
    }
}
