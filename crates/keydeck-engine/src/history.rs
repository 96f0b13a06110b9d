//! Page navigation history.

use std::collections::VecDeque;

use config::HISTORY_LIMIT;

/// Most-recent-first list of activated page names.
///
/// Pushing the name already at the front is a no-op, and only the latest
/// [`HISTORY_LIMIT`] entries are kept.
#[derive(Debug, Clone, Default)]
pub struct PageHistory {
    /// Entries, most recent first.
    entries: VecDeque<String>,
}

impl PageHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an activation of `name`.
    pub fn push(&mut self, name: &str) {
        if self.front() == Some(name) {
            return;
        }
        self.entries.push_front(name.to_string());
        self.entries.truncate(HISTORY_LIMIT);
    }

    /// Most recent entry.
    pub fn front(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    /// Entry `n` steps back; `back(0)` is the front.
    pub fn back(&self, n: usize) -> Option<&str> {
        self.entries.get(n).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of all entries, most recent first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_push_is_noop() {
        let mut h = PageHistory::new();
        h.push("a");
        h.push("a");
        assert_eq!(h.entries(), vec!["a"]);
        h.push("b");
        h.push("a");
        assert_eq!(h.entries(), vec!["a", "b", "a"]);
    }

    #[test]
    fn keeps_most_recent_entries() {
        let mut h = PageHistory::new();
        for i in 0..150 {
            h.push(&format!("p{}", i));
        }
        assert_eq!(h.len(), HISTORY_LIMIT);
        assert_eq!(h.front(), Some("p149"));
        assert_eq!(h.back(99), Some("p50"));
        assert_eq!(h.back(100), None);
    }
}
