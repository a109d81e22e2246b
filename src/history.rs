//! History log: the ordered sequence of display items forming the transcript.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Source tag for standard output text items
pub const STDOUT: &str = "stdout";
/// Source tag for standard error text items
pub const STDERR: &str = "stderr";

/// One discrete unit of transcript content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HistoryItem {
    /// Formatted one-way output (stdout/stderr/echoed input)
    Text { source: String, html: String },
    /// Rich payload passed through verbatim
    Annotation { data: Value },
    /// Raw traceback plus its per-line markup rendering
    PythonError {
        name: String,
        value: String,
        traceback: Vec<String>,
        stacktrace: Vec<String>,
    },
    /// Boundary between kernel status transitions
    PageBreak,
    /// Transient suggestion overlay, at most one per log
    Autocomplete { matches: Vec<String> },
}

impl HistoryItem {
    pub fn text(source: impl Into<String>, html: impl Into<String>) -> Self {
        Self::Text {
            source: source.into(),
            html: html.into(),
        }
    }

    pub fn stdout(html: impl Into<String>) -> Self {
        Self::text(STDOUT, html)
    }

    pub fn stderr(html: impl Into<String>) -> Self {
        Self::text(STDERR, html)
    }

    pub fn is_autocomplete(&self) -> bool {
        matches!(self, Self::Autocomplete { .. })
    }
}

/// Append-mostly log of history items.
///
/// Cloning is cheap: clones share the same backing sequence, and every
/// operation that changes the log copies it first if anyone else still
/// holds it. A snapshot handed to a reader is never mutated under it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    items: Arc<Vec<HistoryItem>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<HistoryItem>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }

    /// Returns a log with `item` added at the end.
    pub fn append(mut self, item: HistoryItem) -> Self {
        Arc::make_mut(&mut self.items).push(item);
        self
    }

    /// Returns a log without its final element.
    ///
    /// The log must not be empty; popping nothing is a caller bug.
    pub fn remove_last(mut self) -> Self {
        let removed = Arc::make_mut(&mut self.items).pop();
        debug_assert!(removed.is_some(), "remove_last on an empty history log");
        self
    }

    /// Drops the trailing autocomplete overlay if there is one.
    pub fn without_overlay(self) -> Self {
        if self.has_overlay() {
            self.remove_last()
        } else {
            self
        }
    }

    /// Returns a log whose only overlay is a new one carrying `matches`.
    ///
    /// An earlier overlay is dropped wherever it sits, since output may have
    /// been appended after it.
    pub fn replace_overlay(mut self, matches: Vec<String>) -> Self {
        if self.items.iter().any(HistoryItem::is_autocomplete) {
            Arc::make_mut(&mut self.items).retain(|item| !item.is_autocomplete());
        }
        self.append(HistoryItem::Autocomplete { matches })
    }

    /// Whether the tail of the log is an autocomplete overlay.
    pub fn has_overlay(&self) -> bool {
        self.items.last().is_some_and(HistoryItem::is_autocomplete)
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn last(&self) -> Option<&HistoryItem> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a HistoryLog {
    type Item = &'a HistoryItem;
    type IntoIter = std::slice::Iter<'a, HistoryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
