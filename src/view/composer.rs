//! Input box, retrieval-mode toggle and citation panel state.

use crate::core::{MessageId, Transcript};
use std::collections::HashSet;

/// Message input with the retrieval-mode toggle.
///
/// The toggle starts from the configured default each time a composer is
/// created and is never persisted.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    input: String,
    use_tables: bool,
}

impl Composer {
    #[must_use]
    pub fn new(use_tables: bool) -> Self {
        Self {
            input: String::new(),
            use_tables,
        }
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: &str) {
        self.input = input.to_string();
    }

    #[must_use]
    pub fn use_tables(&self) -> bool {
        self.use_tables
    }

    /// Flip the retrieval-mode flag. Returns the new value.
    pub fn toggle_tables(&mut self) -> bool {
        self.use_tables = !self.use_tables;
        self.use_tables
    }

    /// Send is enabled only with non-blank input and no send outstanding.
    #[must_use]
    pub fn can_send(&self, transcript: &Transcript) -> bool {
        !self.input.trim().is_empty() && !transcript.is_sending()
    }

    /// Take the input for sending, leaving the box empty.
    pub fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input)
    }
}

/// Which messages have their citation panel expanded.
///
/// Panels start collapsed and toggle independently.
#[derive(Debug, Clone, Default)]
pub struct CitationPanels {
    expanded: HashSet<MessageId>,
}

impl CitationPanels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle one panel. Returns whether it is now expanded.
    pub fn toggle(&mut self, id: MessageId) -> bool {
        if self.expanded.remove(&id) {
            false
        } else {
            self.expanded.insert(id);
            true
        }
    }

    #[must_use]
    pub fn is_expanded(&self, id: MessageId) -> bool {
        self.expanded.contains(&id)
    }

    /// Collapse everything (thread switch).
    pub fn clear(&mut self) {
        self.expanded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_disabled_for_blank_input() {
        let mut composer = Composer::new(false);
        let transcript = Transcript::new();
        assert!(!composer.can_send(&transcript));

        composer.set_input("   ");
        assert!(!composer.can_send(&transcript));

        composer.set_input("hello");
        assert!(composer.can_send(&transcript));
    }

    #[test]
    fn send_disabled_while_in_flight() {
        let mut transcript = Transcript::new();
        let ticket = transcript.begin_load(1);
        transcript.finish_load(&ticket, Some(vec![]));
        transcript.begin_send(1, "first", false).unwrap();

        let mut composer = Composer::new(false);
        composer.set_input("second");
        assert!(!composer.can_send(&transcript));
    }

    #[test]
    fn take_input_clears_box() {
        let mut composer = Composer::new(false);
        composer.set_input("hello");
        assert_eq!(composer.take_input(), "hello");
        assert_eq!(composer.input(), "");
    }

    #[test]
    fn tables_toggle() {
        let mut composer = Composer::new(false);
        assert!(composer.toggle_tables());
        assert!(composer.use_tables());
        assert!(!composer.toggle_tables());

        assert!(Composer::new(true).use_tables());
    }

    #[test]
    fn panels_start_collapsed_and_toggle_independently() {
        let mut panels = CitationPanels::new();
        let a = MessageId::Confirmed(1);
        let b = MessageId::Confirmed(2);
        assert!(!panels.is_expanded(a));

        assert!(panels.toggle(a));
        assert!(panels.is_expanded(a));
        assert!(!panels.is_expanded(b));

        assert!(!panels.toggle(a));
        assert!(!panels.is_expanded(a));
    }

    #[test]
    fn clear_collapses_all() {
        let mut panels = CitationPanels::new();
        panels.toggle(MessageId::Pending(7));
        panels.clear();
        assert!(!panels.is_expanded(MessageId::Pending(7)));
    }
}
