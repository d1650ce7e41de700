//! Suggestion items and the (single) suggestion list with its highlight.

use serde::{Deserialize, Serialize};

/// One completion candidate. Lives until the next query or a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionItem {
    /// Full tag text, e.g. `&alice.boop`.
    pub tag: String,
    pub username: String,
    pub soundname: String,
    pub display_text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionList {
    items: Vec<SuggestionItem>,
    highlighted: Option<usize>,
    open: bool,
}

impl SuggestionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents, capped at `max`, and highlight the first entry.
    /// An empty result leaves the list closed.
    pub fn show(&mut self, mut items: Vec<SuggestionItem>, max: usize) -> bool {
        items.truncate(max);
        self.open = !items.is_empty();
        self.highlighted = if self.open { Some(0) } else { None };
        self.items = items;
        self.open
    }

    pub fn close(&mut self) {
        self.items.clear();
        self.highlighted = None;
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn items(&self) -> &[SuggestionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn highlighted_item(&self) -> Option<&SuggestionItem> {
        self.highlighted.and_then(|i| self.items.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&SuggestionItem> {
        self.items.get(index)
    }

    pub fn highlight(&mut self, index: usize) -> Option<&SuggestionItem> {
        if index < self.items.len() {
            self.highlighted = Some(index);
        }
        self.highlighted_item()
    }

    /// Down: next entry, wrapping to the top.
    pub fn highlight_next(&mut self) {
        let n = self.items.len();
        if n == 0 {
            return;
        }
        self.highlighted = Some(match self.highlighted {
            Some(i) => (i + 1) % n,
            None => 0,
        });
    }

    /// Up: previous entry, wrapping to the bottom.
    pub fn highlight_prev(&mut self) {
        let n = self.items.len();
        if n == 0 {
            return;
        }
        self.highlighted = Some(match self.highlighted {
            Some(0) | None => n - 1,
            Some(i) => i - 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(tag: &str) -> SuggestionItem {
        let (user, sound) = tag.trim_start_matches('&').split_once('.').unwrap();
        SuggestionItem {
            tag: tag.to_string(),
            username: user.to_string(),
            soundname: sound.to_string(),
            display_text: format!("{} by {}", sound, user),
        }
    }

    #[test]
    fn test_show_highlights_first_and_caps() {
        let mut list = SuggestionList::new();
        let items: Vec<_> = (0..12).map(|i| item(&format!("&u.s{}", i))).collect();
        assert!(list.show(items, 10));
        assert_eq!(list.len(), 10);
        assert_eq!(list.highlighted(), Some(0));
    }

    #[test]
    fn test_empty_result_stays_closed() {
        let mut list = SuggestionList::new();
        assert!(!list.show(vec![], 10));
        assert!(!list.is_open());
        assert_eq!(list.highlighted_item(), None);
    }

    #[test]
    fn test_highlight_wraps_both_ways() {
        let mut list = SuggestionList::new();
        list.show(vec![item("&a.x1"), item("&a.x2"), item("&a.x3")], 10);

        list.highlight_prev();
        assert_eq!(list.highlighted(), Some(2));
        list.highlight_next();
        assert_eq!(list.highlighted(), Some(0));
        list.highlight_next();
        list.highlight_next();
        list.highlight_next();
        assert_eq!(list.highlighted(), Some(0));
    }

    #[test]
    fn test_highlight_out_of_range_is_ignored() {
        let mut list = SuggestionList::new();
        list.show(vec![item("&a.x1"), item("&a.x2")], 10);
        assert_eq!(list.highlight(1).map(|i| i.tag.as_str()), Some("&a.x2"));
        assert_eq!(list.highlight(7).map(|i| i.tag.as_str()), Some("&a.x2"));
    }
}
