//! A list that can be supplied either as a delimited string or as an array.
//!
//! Exactly one form is canonical at any time. The other form is derived on
//! first read and cached until the next write, which clears it.

use crate::names::{NameListFormat, NamingConvention};

#[derive(Debug, Clone, Default, PartialEq)]
enum Canonical {
    #[default]
    Unset,
    Items(Vec<String>),
    Text(String),
}

/// Name or expression list with lazy string ⇄ array synchronization.
#[derive(Debug, Clone, Default)]
pub struct DualList {
    canonical: Canonical,
    /// Parsed form of a canonical string, `Some(None)` if it held no tokens
    parsed: Option<Option<Vec<String>>>,
    /// Formatted form of a canonical array
    formatted: Option<Option<String>>,
    parses: usize,
}

impl DualList {
    /// Creates an unset list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the array form canonical. `None` unsets the list.
    pub fn set_items(&mut self, items: Option<Vec<String>>) {
        self.canonical = items.map_or(Canonical::Unset, Canonical::Items);
        self.clear_derived();
    }

    /// Makes the string form canonical. `None` unsets the list.
    pub fn set_text(&mut self, text: Option<String>) {
        self.canonical = text.map_or(Canonical::Unset, Canonical::Text);
        self.clear_derived();
    }

    fn clear_derived(&mut self) {
        self.parsed = None;
        self.formatted = None;
    }

    /// True if either form has been written.
    pub fn is_defined(&self) -> bool {
        self.canonical != Canonical::Unset
    }

    /// True if the string form was written last.
    pub fn is_text_canonical(&self) -> bool {
        matches!(self.canonical, Canonical::Text(_))
    }

    /// Number of times the string form has been parsed.
    pub fn parse_count(&self) -> usize {
        self.parses
    }

    /// Array form, parsing the canonical string on first read.
    pub fn items(&mut self, format: &NameListFormat) -> Option<&[String]> {
        if let Canonical::Text(text) = &self.canonical {
            if self.parsed.is_none() {
                self.parses += 1;
                self.parsed = Some(format.parse(text));
            }
        }
        match &self.canonical {
            Canonical::Unset => None,
            Canonical::Items(items) => Some(items),
            Canonical::Text(_) => self.parsed.as_ref().and_then(|parsed| parsed.as_deref()),
        }
    }

    /// String form, formatting the canonical array on first read.
    pub fn text(&mut self, format: &NameListFormat) -> Option<&str> {
        if let Canonical::Items(items) = &self.canonical {
            if self.formatted.is_none() {
                self.formatted = Some(format.format(items));
            }
        }
        match &self.canonical {
            Canonical::Unset => None,
            Canonical::Text(text) => Some(text),
            Canonical::Items(_) => self
                .formatted
                .as_ref()
                .and_then(|formatted| formatted.as_deref()),
        }
    }

    /// Array form if it is available without parsing.
    pub fn peek_items(&self) -> Option<&[String]> {
        match &self.canonical {
            Canonical::Items(items) => Some(items),
            Canonical::Text(_) => self.parsed.as_ref().and_then(|parsed| parsed.as_deref()),
            Canonical::Unset => None,
        }
    }

    /// Brings the list in line with `count`.
    ///
    /// A list whose length already matches is left alone. Otherwise, when the
    /// list was written after `count` (`count_is_newer == false`) and is
    /// non-empty, `count` adopts its length. In every other case the list is
    /// replaced with generated names, keeping non-empty entries at matching
    /// indices if `keep_existing` is set.
    ///
    /// Returns `true` if the list or `count` changed.
    pub fn reconcile(
        &mut self,
        format: &NameListFormat,
        count: &mut usize,
        count_is_newer: bool,
        convention: &NamingConvention,
        keep_existing: bool,
    ) -> bool {
        let current_len = self.items(format).map(<[String]>::len);
        match current_len {
            Some(len) if len == *count => false,
            Some(len) if len > 0 && !count_is_newer => {
                *count = len;
                true
            }
            _ => {
                let existing = match (keep_existing, self.items(format)) {
                    (true, Some(items)) => items.to_vec(),
                    _ => Vec::new(),
                };
                self.set_items(Some(convention.fill(*count, &existing)));
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> NameListFormat {
        NameListFormat::default()
    }

    #[test]
    fn test_text_is_parsed_once() {
        let mut list = DualList::new();
        list.set_text(Some("a; b".into()));
        assert_eq!(list.parse_count(), 0);
        assert_eq!(list.peek_items(), None);

        assert_eq!(list.items(&format()).unwrap(), ["a", "b"]);
        assert_eq!(list.items(&format()).unwrap(), ["a", "b"]);
        assert_eq!(list.parse_count(), 1);
        assert_eq!(list.text(&format()), Some("a; b"));
    }

    #[test]
    fn test_items_are_formatted_lazily() {
        let mut list = DualList::new();
        list.set_items(Some(vec!["x".into(), "y".into()]));
        assert_eq!(list.text(&format()), Some("x; y"));
        assert_eq!(list.parse_count(), 0);
        assert!(!list.is_text_canonical());
    }

    #[test]
    fn test_write_clears_other_form() {
        let mut list = DualList::new();
        list.set_items(Some(vec!["x".into()]));
        assert_eq!(list.text(&format()), Some("x"));

        list.set_text(Some("p; q".into()));
        assert!(list.is_text_canonical());
        assert_eq!(list.items(&format()).unwrap(), ["p", "q"]);

        list.set_items(None);
        assert!(!list.is_defined());
        assert_eq!(list.items(&format()), None);
        assert_eq!(list.text(&format()), None);
    }

    #[test]
    fn test_blank_text_has_no_items() {
        let mut list = DualList::new();
        list.set_text(Some(" ; ".into()));
        assert!(list.is_defined());
        assert_eq!(list.items(&format()), None);
        assert_eq!(list.parse_count(), 1);
    }

    #[test]
    fn test_reconcile_adopts_newer_list() {
        let mut list = DualList::new();
        list.set_text(Some("a; b; c".into()));
        let mut count = 2;
        assert!(list.reconcile(&format(), &mut count, false, &NamingConvention::parameters(), false));
        assert_eq!(count, 3);
        assert_eq!(list.items(&format()).unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_reconcile_regenerates_for_newer_count() {
        let mut list = DualList::new();
        list.set_items(Some(vec!["a".into(), "b".into()]));
        let mut count = 3;
        let convention = NamingConvention::parameters();

        assert!(list.reconcile(&format(), &mut count, true, &convention, true));
        assert_eq!(list.items(&format()).unwrap(), ["a", "b", "x2"]);

        assert!(list.reconcile(&format(), &mut 1, true, &convention, false));
        assert_eq!(list.items(&format()).unwrap(), ["x0"]);

        assert!(!list.reconcile(&format(), &mut 1, true, &convention, false));
    }

    #[test]
    fn test_reconcile_unset_generates_defaults() {
        let mut list = DualList::new();
        let mut count = 2;
        list.reconcile(&format(), &mut count, false, &NamingConvention::functions(), true);
        assert_eq!(count, 2);
        assert_eq!(list.items(&format()).unwrap(), ["f0", "f1"]);
    }
}
