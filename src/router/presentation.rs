use crate::context::HelperId;
use serde::{Deserialize, Serialize};

/// Viewport widths (px) separating phone, tablet and desktop layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoints {
    /// First width that is no longer a phone.
    pub mobile_max: u32,
    /// First desktop width.
    pub desktop_min: u32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            mobile_max: 768,
            desktop_min: 1024,
        }
    }
}

impl Breakpoints {
    pub fn is_mobile(&self, width: u32) -> bool {
        width < self.mobile_max
    }

    pub fn is_desktop(&self, width: u32) -> bool {
        width >= self.desktop_min
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresentationMode {
    MobileDrawer,
    TabletPanel,
    DesktopModal,
    DesktopSidePanel,
}

impl PresentationMode {
    /// Drawer presentations trap focus and hand it back on close.
    pub fn is_drawer(&self) -> bool {
        matches!(self, PresentationMode::MobileDrawer | PresentationMode::TabletPanel)
    }
}

/// The only place viewport width is turned into a presentation decision.
///
/// With a helper open: phones get a drawer, tablets the hybrid panel, desktops
/// a modal. With nothing open, tablets and desktops keep a side panel for the
/// selected symbol; phones show nothing.
pub fn derive_presentation_mode(
    width: u32,
    active: Option<HelperId>,
    breakpoints: &Breakpoints,
) -> Option<PresentationMode> {
    let desktop = breakpoints.is_desktop(width);
    let mobile = breakpoints.is_mobile(width);
    match active {
        Some(_) if desktop => Some(PresentationMode::DesktopModal),
        Some(_) if mobile => Some(PresentationMode::MobileDrawer),
        Some(_) => Some(PresentationMode::TabletPanel),
        None if desktop => Some(PresentationMode::DesktopSidePanel),
        None if mobile => None,
        None => Some(PresentationMode::TabletPanel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_modes_by_width() {
        let bp = Breakpoints::default();
        let open = Some(HelperId::Charting);
        assert_eq!(derive_presentation_mode(375, open, &bp), Some(PresentationMode::MobileDrawer));
        assert_eq!(derive_presentation_mode(767, open, &bp), Some(PresentationMode::MobileDrawer));
        assert_eq!(derive_presentation_mode(768, open, &bp), Some(PresentationMode::TabletPanel));
        assert_eq!(derive_presentation_mode(1023, open, &bp), Some(PresentationMode::TabletPanel));
        assert_eq!(derive_presentation_mode(1024, open, &bp), Some(PresentationMode::DesktopModal));
    }

    #[test]
    fn test_side_panel_without_helper() {
        let bp = Breakpoints::default();
        assert_eq!(derive_presentation_mode(500, None, &bp), None);
        assert_eq!(derive_presentation_mode(900, None, &bp), Some(PresentationMode::TabletPanel));
        assert_eq!(
            derive_presentation_mode(1440, None, &bp),
            Some(PresentationMode::DesktopSidePanel)
        );
    }

    #[test]
    fn test_custom_breakpoints() {
        let bp = Breakpoints {
            mobile_max: 600,
            desktop_min: 1200,
        };
        let open = Some(HelperId::List);
        assert_eq!(derive_presentation_mode(700, open, &bp), Some(PresentationMode::TabletPanel));
        assert_eq!(derive_presentation_mode(1100, open, &bp), Some(PresentationMode::TabletPanel));
        assert!(PresentationMode::TabletPanel.is_drawer());
        assert!(!PresentationMode::DesktopModal.is_drawer());
    }
}
