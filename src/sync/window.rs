/// Server-side pagination state for lists that grow by re-querying a larger
/// top-N window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    page_size: usize,
    server_max: usize,
    current_limit: usize,
    last_fetch_size: Option<usize>,
}

impl PageWindow {
    pub fn new(page_size: usize, server_max: usize) -> Self {
        let server_max = server_max.max(1);
        let page_size = page_size.clamp(1, server_max);
        Self {
            page_size,
            server_max,
            current_limit: page_size,
            last_fetch_size: None,
        }
    }

    pub fn current_limit(&self) -> usize {
        self.current_limit
    }

    pub fn initial_limit(&self) -> usize {
        self.page_size
    }

    /// More rows exist only below the ceiling and only if the last fetch filled
    /// the window it asked for. Unknown until the first fetch lands.
    pub fn has_more(&self) -> bool {
        match self.last_fetch_size {
            Some(n) => self.current_limit < self.server_max && n >= self.current_limit,
            None => false,
        }
    }

    pub fn record_fetch(&mut self, rows: usize) {
        self.last_fetch_size = Some(rows);
    }

    /// Limit for the next grow request, without committing to it.
    pub fn next_limit(&self) -> Option<usize> {
        self.has_more()
            .then(|| (self.current_limit + self.page_size).min(self.server_max))
    }

    /// Commit a grown limit once its fetch has landed. Never shrinks.
    pub fn commit_limit(&mut self, limit: usize) {
        self.current_limit = self.current_limit.max(limit.min(self.server_max));
    }

    pub fn reset(&mut self) {
        self.current_limit = self.page_size;
        self.last_fetch_size = None;
    }
}

/// Client-side reveal window over a list that arrives whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleWindow {
    increment: usize,
    margin: usize,
    visible: usize,
}

impl VisibleWindow {
    pub fn new(increment: usize, margin: usize) -> Self {
        let increment = increment.max(1);
        Self {
            increment,
            margin,
            visible: increment,
        }
    }

    pub fn visible(&self, total: usize) -> usize {
        self.visible.min(total)
    }

    pub fn has_more(&self, total: usize) -> bool {
        self.visible < total
    }

    pub fn reveal_more(&mut self, total: usize) -> bool {
        if !self.has_more(total) {
            return false;
        }
        self.visible = (self.visible + self.increment).min(total);
        true
    }

    /// Reveal the next step when the consumer has scrolled within `margin` rows
    /// of the last visible one.
    pub fn on_scroll(&mut self, last_seen_index: usize, total: usize) -> bool {
        let shown = self.visible(total);
        if shown > 0 && last_seen_index + self.margin + 1 >= shown {
            return self.reveal_more(total);
        }
        false
    }

    pub fn reset(&mut self) {
        self.visible = self.increment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_grows_monotonically_to_ceiling() {
        let mut w = PageWindow::new(8, 20);
        let mut seen = vec![w.current_limit()];
        w.record_fetch(8);
        while let Some(next) = w.next_limit() {
            w.commit_limit(next);
            w.record_fetch(next);
            seen.push(w.current_limit());
        }
        assert_eq!(seen, [8, 16, 20]);
        assert!(!w.has_more());
        w.commit_limit(5);
        assert_eq!(w.current_limit(), 20);
    }

    #[test]
    fn test_short_fetch_ends_list() {
        let mut w = PageWindow::new(10, 20);
        assert!(!w.has_more());
        w.record_fetch(7);
        assert!(!w.has_more());
        assert_eq!(w.next_limit(), None);
    }

    #[test]
    fn test_page_size_clamped_to_ceiling() {
        let w = PageWindow::new(50, 20);
        assert_eq!(w.current_limit(), 20);
    }

    #[test]
    fn test_visible_window_reveals_near_end() {
        let mut v = VisibleWindow::new(20, 5);
        assert_eq!(v.visible(45), 20);
        assert!(!v.on_scroll(10, 45));
        assert!(v.on_scroll(14, 45));
        assert_eq!(v.visible(45), 40);
        assert!(v.on_scroll(39, 45));
        assert_eq!(v.visible(45), 45);
        assert!(!v.reveal_more(45));
    }
}
