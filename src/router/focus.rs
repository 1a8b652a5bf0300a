/// Tab order inside an open drawer. Moving past either end wraps around.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusTrap {
    order: Vec<String>,
    current: Option<usize>,
}

impl FocusTrap {
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: order.into_iter().map(Into::into).collect(),
            current: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.map(|i| self.order[i].as_str())
    }

    /// Sync with focus that moved by other means (click). Unknown ids are ignored.
    pub fn focus(&mut self, id: &str) -> bool {
        match self.order.iter().position(|o| o == id) {
            Some(i) => {
                self.current = Some(i);
                true
            }
            None => false,
        }
    }

    pub fn next(&mut self) -> Option<&str> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }
        let i = self.current.map_or(0, |i| (i + 1) % len);
        self.current = Some(i);
        self.current()
    }

    pub fn prev(&mut self) -> Option<&str> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }
        let i = self.current.map_or(len - 1, |i| (i + len - 1) % len);
        self.current = Some(i);
        self.current()
    }
}
