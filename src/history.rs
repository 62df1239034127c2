//! Session history with scope-restoration state.

/// State recorded when a scope navigation is pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub url: String,
    pub state: Option<NavigationState>,
}

#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl HistoryStack {
    pub fn new(initial_url: &str) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: initial_url.to_string(),
                state: None,
            }],
            index: 0,
        }
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Drops forward entries and appends a new current entry.
    pub fn push(&mut self, url: &str, state: Option<NavigationState>) {
        self.entries.truncate(self.index + 1);
        self.entries.push(HistoryEntry {
            url: url.to_string(),
            state,
        });
        self.index = self.entries.len() - 1;
    }

    /// Moves by `delta`; out-of-range moves are ignored and return `None`.
    pub fn go(&mut self, delta: i64) -> Option<&HistoryEntry> {
        if delta == 0 {
            return None;
        }
        let target = self.index as i64 + delta;
        if target < 0 || target >= self.entries.len() as i64 {
            return None;
        }
        self.index = target as usize;
        Some(&self.entries[self.index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_truncates_forward_entries() {
        let mut history = HistoryStack::new("https://a.test/");
        history.push("https://a.test/1", None);
        history.push("https://a.test/2", None);
        assert_eq!(history.go(-2).map(|entry| entry.url.as_str()), Some("https://a.test/"));
        history.push("https://a.test/3", None);
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.go(1), None);
        assert_eq!(history.current().url, "https://a.test/3");
    }
}
