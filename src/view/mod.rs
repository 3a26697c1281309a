//! Result view: the current match set, the current index, and what the page
//! and info panel show for them.
//!
//! The controller is the only writer of the highlight registry. Both the
//! registry and the viewport are injected, so the whole view runs headless.

pub mod highlights;
pub mod scroll;

use std::fmt;
use std::str::FromStr;

use crate::dom::Document;
use crate::search::{HighlightKind, HighlightSpan};
use crate::text::range::MatchRange;

use self::highlights::{syntax_highlight_id, HighlightRegistry, HIGHLIGHT_ALL_ID, HIGHLIGHT_CURRENT_ID};
use self::scroll::{scroll_into_view, Viewport};

// ─── View state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    /// No query, or a query that matches nothing meaningful.
    #[default]
    Void,
    Loading,
    Ok { ranges: Vec<MatchRange>, current_index: usize },
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Void,
    Loading,
    Ok,
    Error,
}

impl ViewState {
    pub fn kind(&self) -> ViewKind {
        match self {
            ViewState::Void => ViewKind::Void,
            ViewState::Loading => ViewKind::Loading,
            ViewState::Ok { .. } => ViewKind::Ok,
            ViewState::Error { .. } => ViewKind::Error,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ViewState::Error { message: message.into() }
    }
}

/// Status class of the info panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InfoStatus {
    Ok,
    Error,
    Loading,
    #[default]
    Empty,
}

impl InfoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InfoStatus::Ok => "ok",
            InfoStatus::Error => "error",
            InfoStatus::Loading => "loading",
            InfoStatus::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoPanel {
    pub status: InfoStatus,
    pub message: String,
}

// ─── Index setters ──────────────────────────────────────────────────────────

/// A navigation request against the current match list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSetter {
    /// Jump to an index; negative values count from the end.
    Absolute(i64),
    /// Move by an offset from the current index.
    Relative(i64),
}

impl IndexSetter {
    pub const NEXT: IndexSetter = IndexSetter::Relative(1);
    pub const PREVIOUS: IndexSetter = IndexSetter::Relative(-1);

    fn apply(self, current: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let target = match self {
            IndexSetter::Absolute(i) => i,
            IndexSetter::Relative(d) => (current as i64).saturating_add(d),
        };
        target.rem_euclid(len as i64) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid index setter {0:?}: expected an integer or n+k / n-k")]
pub struct ParseSetIndexError(String);

/// Parse `"3"`, `"-1"`, `"+2"` (absolute) or `"n+1"`, `"n - 2"` (relative).
pub fn parse_set_index(s: &str) -> Result<IndexSetter, ParseSetIndexError> {
    let err = || ParseSetIndexError(s.to_string());

    let digits = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().map(IndexSetter::Absolute).map_err(|_| err());
    }

    let rest = s.trim().strip_prefix('n').ok_or_else(err)?.trim_start();
    let (negative, value) = match rest.chars().next() {
        Some('+') => (false, &rest[1..]),
        Some('-') => (true, &rest[1..]),
        _ => return Err(err()),
    };
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let value: i64 = value.parse().map_err(|_| err())?;
    Ok(IndexSetter::Relative(if negative { -value } else { value }))
}

impl FromStr for IndexSetter {
    type Err = ParseSetIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_set_index(s)
    }
}

impl fmt::Display for IndexSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            IndexSetter::Absolute(i) => write!(f, "{i}"),
            IndexSetter::Relative(d) if d < 0 => write!(f, "n-{}", d.unsigned_abs()),
            IndexSetter::Relative(d) => write!(f, "n+{d}"),
        }
    }
}

// ─── Controller ─────────────────────────────────────────────────────────────

pub struct ViewController<H, V> {
    highlights: H,
    viewport: V,
    state: ViewState,
    info: InfoPanel,
}

impl<H: HighlightRegistry, V: Viewport> ViewController<H, V> {
    pub fn new(highlights: H, viewport: V) -> Self {
        Self {
            highlights,
            viewport,
            state: ViewState::Void,
            info: InfoPanel::default(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn info(&self) -> &InfoPanel {
        &self.info
    }

    pub fn highlights(&self) -> &H {
        &self.highlights
    }

    pub fn highlights_mut(&mut self) -> &mut H {
        &mut self.highlights
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    /// The range of the current match, if any.
    pub fn current_range(&self) -> Option<&MatchRange> {
        match &self.state {
            ViewState::Ok { ranges, current_index } => ranges.get(*current_index),
            _ => None,
        }
    }

    /// Enter `state` and render it.
    pub fn update_view(&mut self, doc: &Document, state: ViewState) {
        self.state = state;
        self.render(doc);
    }

    /// Move the current match. Only meaningful in the `ok` state; returns
    /// whether anything was re-rendered.
    pub fn update_range_index(&mut self, doc: &Document, setter: IndexSetter) -> bool {
        let ViewState::Ok { ranges, current_index } = &mut self.state else {
            return false;
        };
        *current_index = setter.apply(*current_index, ranges.len());
        self.render(doc);
        true
    }

    /// Remove the match highlights, leaving the state alone.
    pub fn clear_highlights(&mut self) {
        self.highlights.delete(HIGHLIGHT_ALL_ID);
        self.highlights.delete(HIGHLIGHT_CURRENT_ID);
    }

    /// Replace the syntax highlighting of the query box.
    pub fn set_query_highlights(&mut self, spans: &[HighlightSpan]) {
        for kind in HighlightKind::ALL {
            let name = syntax_highlight_id(kind);
            let of_kind: Vec<_> = spans.iter().filter(|s| s.kind == kind).map(|s| s.start..s.end).collect();
            if of_kind.is_empty() {
                self.highlights.delete(&name);
            } else {
                self.highlights.set_spans(&name, of_kind);
            }
        }
    }

    fn render(&mut self, doc: &Document) {
        match &mut self.state {
            ViewState::Loading => {
                // Keeps the previous message and highlights.
                self.info.status = InfoStatus::Loading;
            }
            ViewState::Error { message } => {
                self.info = InfoPanel { status: InfoStatus::Error, message: message.clone() };
                self.highlights.delete(HIGHLIGHT_ALL_ID);
                self.highlights.delete(HIGHLIGHT_CURRENT_ID);
            }
            ViewState::Void => {
                self.info = InfoPanel { status: InfoStatus::Empty, message: String::new() };
                self.highlights.delete(HIGHLIGHT_ALL_ID);
                self.highlights.delete(HIGHLIGHT_CURRENT_ID);
            }
            ViewState::Ok { ranges, current_index } if ranges.is_empty() => {
                *current_index = 0;
                self.info = InfoPanel { status: InfoStatus::Empty, message: "No results".into() };
                self.highlights.delete(HIGHLIGHT_ALL_ID);
                self.highlights.delete(HIGHLIGHT_CURRENT_ID);
            }
            ViewState::Ok { ranges, current_index } => {
                *current_index %= ranges.len();
                let current = ranges[*current_index];
                self.highlights.set(HIGHLIGHT_ALL_ID, ranges.clone());
                self.highlights.set(HIGHLIGHT_CURRENT_ID, vec![current]);
                scroll_into_view(&mut self.viewport, doc, &current);
                self.info = InfoPanel {
                    status: InfoStatus::Ok,
                    message: format!("{} of {}", *current_index + 1, ranges.len()),
                };
            }
        }
    }
}
