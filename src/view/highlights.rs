//! Named highlight sets and their colours.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::search::HighlightKind;
use crate::text::range::MatchRange;

macro_rules! app_id {
    () => {
        "find-plus-plus-ed75bf8f-8636-4cec-99d8-f444bb383061"
    };
}

pub const APP_ID: &str = app_id!();
pub const HIGHLIGHT_ALL_ID: &str = concat!(app_id!(), "_all");
pub const HIGHLIGHT_CURRENT_ID: &str = concat!(app_id!(), "_current");
pub const HIGHLIGHT_TEXT_ID: &str = concat!(app_id!(), "_text");

/// Registry name for one syntax-highlight category.
pub fn syntax_highlight_id(kind: HighlightKind) -> String {
    format!("{APP_ID}_{}", kind.as_str())
}

/// The page's highlight overlay: named sets of ranges.
pub trait HighlightRegistry {
    /// Replace the document ranges registered under `name`.
    fn set(&mut self, name: &str, ranges: Vec<MatchRange>);
    /// Replace the query-text spans registered under `name`.
    fn set_spans(&mut self, name: &str, spans: Vec<Range<usize>>);
    fn delete(&mut self, name: &str);
}

/// One call made on a [`MemoryHighlights`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightUpdate {
    Set { name: String, ranges: Vec<MatchRange> },
    SetSpans { name: String, spans: Vec<Range<usize>> },
    Delete { name: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    ranges: HashMap<String, Vec<MatchRange>>,
    spans: HashMap<String, Vec<Range<usize>>>,
    history: Vec<HighlightUpdate>,
}

/// In-memory registry. Clones share state, so a test can keep one handle
/// while the view owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryHighlights {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryHighlights {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<Vec<MatchRange>> {
        self.state().ranges.get(name).cloned()
    }

    pub fn spans(&self, name: &str) -> Option<Vec<Range<usize>>> {
        self.state().spans.get(name).cloned()
    }

    pub fn history(&self) -> Vec<HighlightUpdate> {
        self.state().history.clone()
    }

    pub fn clear_history(&self) {
        self.state().history.clear();
    }
}

impl HighlightRegistry for MemoryHighlights {
    fn set(&mut self, name: &str, ranges: Vec<MatchRange>) {
        let mut state = self.state();
        state.history.push(HighlightUpdate::Set { name: name.to_string(), ranges: ranges.clone() });
        state.ranges.insert(name.to_string(), ranges);
    }

    fn set_spans(&mut self, name: &str, spans: Vec<Range<usize>>) {
        let mut state = self.state();
        state.history.push(HighlightUpdate::SetSpans { name: name.to_string(), spans: spans.clone() });
        state.spans.insert(name.to_string(), spans);
    }

    fn delete(&mut self, name: &str) {
        let mut state = self.state();
        state.history.push(HighlightUpdate::Delete { name: name.to_string() });
        state.ranges.remove(name);
        state.spans.remove(name);
    }
}

/// Colours of the three highlight layers, as CSS colour strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightColors {
    pub all: String,
    pub current: String,
    pub text: String,
}

impl Default for HighlightColors {
    fn default() -> Self {
        Self {
            all: "#ffff0080".into(),
            current: "#ff9632".into(),
            text: "#4a9eff".into(),
        }
    }
}

/// `:root{--<id>: <color>;…}` custom properties for the highlight styles.
pub fn color_stylesheet(colors: &HighlightColors) -> String {
    let vars: String = [
        (HIGHLIGHT_ALL_ID, &colors.all),
        (HIGHLIGHT_CURRENT_ID, &colors.current),
        (HIGHLIGHT_TEXT_ID, &colors.text),
    ]
    .iter()
    .map(|(id, color)| format!("--{id}: {color};"))
    .collect();
    format!(":root {{{vars}}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::text::range::BoundaryPoint;

    fn range() -> MatchRange {
        let node = Document::new().create_text("x");
        let p = BoundaryPoint { node, offset: 0 };
        MatchRange { start: p, end: p }
    }

    #[test]
    fn clones_share_state_and_record_history() {
        let view = MemoryHighlights::new();
        let mut handle = view.clone();
        handle.set(HIGHLIGHT_ALL_ID, vec![range()]);
        handle.set_spans("q", vec![0..2]);
        assert_eq!(view.get(HIGHLIGHT_ALL_ID).unwrap().len(), 1);
        assert_eq!(view.spans("q").unwrap(), vec![0..2]);

        handle.delete(HIGHLIGHT_ALL_ID);
        assert!(view.get(HIGHLIGHT_ALL_ID).is_none());
        assert_eq!(view.history().len(), 3);
        view.clear_history();
        assert!(handle.history().is_empty());
    }

    #[test]
    fn ids_and_stylesheet() {
        assert!(HIGHLIGHT_CURRENT_ID.starts_with(APP_ID));
        assert_eq!(syntax_highlight_id(HighlightKind::Dot), format!("{APP_ID}_Dot"));
        let css = color_stylesheet(&HighlightColors {
            all: "red".into(),
            current: "blue".into(),
            text: "green".into(),
        });
        assert_eq!(
            css,
            format!(":root {{--{APP_ID}_all: red;--{APP_ID}_current: blue;--{APP_ID}_text: green;}}")
        );
    }
}
