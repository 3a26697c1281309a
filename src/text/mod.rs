//! Visible-text extraction.
//!
//! Flattens a DOM subtree into the string a reader would see: hidden and
//! ignored elements are skipped, whitespace is collapsed per element
//! `white-space`, and block/table/flex boundaries become separators. Alongside
//! the text, an offset table maps every output byte back to the text node (and
//! byte within it) that produced it.

pub mod range;
pub mod registry;

use crate::dom::css::{ComputedStyle, Display, Visibility, WhiteSpaceCollapse};
use crate::dom::{Document, NodeId, NodeType};

/// How one segment of the output relates to its source text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Output bytes are a verbatim copy of the node's data starting at
    /// `offsets_within[k]`.
    Verbatim,
    /// Output bytes replace the node's data `offsets_within[k]..within_end`
    /// (collapsed whitespace, or a separator tied to the end of the node).
    Substituted { within_end: usize },
}

/// Flattened visible text of a subtree plus its offset table.
///
/// The table is stored as parallel arrays; entry `k` covers output bytes
/// `offsets[k]..offsets[k + 1]` (or to the end of `text`). Entries are never
/// zero-length, so `offsets` is strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleTextSnapshot {
    pub text: String,
    pub nodes: Vec<NodeId>,
    pub offsets: Vec<usize>,
    pub offsets_within: Vec<usize>,
    pub kinds: Vec<SegmentKind>,
    /// Root the snapshot was taken from.
    pub root: Option<NodeId>,
    /// Document generation at capture time.
    pub generation: u64,
}

impl VisibleTextSnapshot {
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.nodes.len()
    }

    /// Index of the unit owning output byte `i`.
    pub fn unit_at(&self, i: usize) -> Option<usize> {
        if i >= self.text.len() {
            return None;
        }
        self.offsets.partition_point(|&o| o <= i).checked_sub(1)
    }

    /// Exclusive end of unit `k` in the output.
    pub fn unit_end(&self, k: usize) -> usize {
        self.offsets.get(k + 1).copied().unwrap_or(self.text.len())
    }

    fn push(&mut self, node: NodeId, within: usize, kind: SegmentKind, s: &str) {
        if s.is_empty() {
            return;
        }
        self.nodes.push(node);
        self.offsets.push(self.text.len());
        self.offsets_within.push(within);
        self.kinds.push(kind);
        self.text.push_str(s);
    }
}

/// Extraction switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Walk into `<textarea>` and `<input>` instead of skipping them.
    pub include_form_controls: bool,
}

const IGNORED_ELEMENTS: &[&str] = &["script", "style"];
const FORM_CONTROLS: &[&str] = &["textarea", "input"];
const DOUBLE_SPACED: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6"];

enum Token {
    TagStart { is_br: bool },
    Text { node: NodeId, white_space: WhiteSpaceCollapse },
    TagEnd { separator: &'static str },
}

/// Extract the visible text of `root`.
pub fn extract(doc: &Document, root: NodeId, opts: ExtractOptions) -> VisibleTextSnapshot {
    let mut snap = VisibleTextSnapshot {
        root: Some(root),
        generation: doc.generation(),
        ..Default::default()
    };
    if !doc.is_element(root) {
        return snap;
    }

    let parent_style = doc
        .parent_element(root)
        .map(|p| crate::dom::css::computed_style(doc, p));
    let mut tokens = Vec::new();
    walk(doc, root, parent_style.as_ref(), opts, &mut tokens);

    // Text nodes seen since the last element start.
    let mut text_node_index = 0usize;
    for token in tokens {
        match token {
            Token::TagStart { is_br } => {
                text_node_index = 0;
                if is_br {
                    push_separator(doc, &mut snap, "\n");
                }
            }
            Token::TagEnd { separator } => push_separator(doc, &mut snap, separator),
            Token::Text { node, white_space } => {
                let first = text_node_index == 0;
                text_node_index += 1;
                push_text(doc, &mut snap, node, white_space, first);
            }
        }
    }
    log::debug!(
        "extracted {} bytes in {} units from {:?}",
        snap.text.len(),
        snap.nodes.len(),
        root
    );
    snap
}

fn is_rejected(doc: &Document, id: NodeId, style: &ComputedStyle, opts: ExtractOptions) -> bool {
    let tag = doc.tag(id).unwrap_or_default();
    if tag == "br" {
        return false;
    }
    IGNORED_ELEMENTS.contains(&tag)
        || (!opts.include_form_controls && FORM_CONTROLS.contains(&tag))
        || style.display == Display::None
        || style.visibility != Visibility::Visible
}

fn walk(
    doc: &Document,
    el: NodeId,
    parent: Option<&ComputedStyle>,
    opts: ExtractOptions,
    out: &mut Vec<Token>,
) {
    let style = ComputedStyle::cascade(doc, el, parent);
    if is_rejected(doc, el, &style, opts) {
        return;
    }
    let tag = doc.tag(el).unwrap_or_default();
    out.push(Token::TagStart { is_br: tag == "br" });
    for &child in doc.children(el) {
        match doc.get(child).map(|n| n.node_type) {
            Some(NodeType::Element) => walk(doc, child, Some(&style), opts, out),
            Some(NodeType::Text) => out.push(Token::Text {
                node: child,
                white_space: style.white_space,
            }),
            _ => {}
        }
    }
    out.push(Token::TagEnd { separator: trailing_separator(tag, &style, parent) });
}

fn trailing_separator(tag: &str, style: &ComputedStyle, parent: Option<&ComputedStyle>) -> &'static str {
    if let Some(parent) = parent.filter(|p| p.display == Display::Flex) {
        return if parent.flex_direction.is_column() { "\n" } else { "\t" };
    }
    match style.display {
        Display::TableCell | Display::TableHeaderGroup => "\t",
        Display::Block
        | Display::ListItem
        | Display::Table
        | Display::TableCaption
        | Display::TableRow
        | Display::Flex => {
            if DOUBLE_SPACED.contains(&tag) {
                "\n\n"
            } else {
                "\n"
            }
        }
        _ => "",
    }
}

/// Append a separator tied to the end of the most recent text unit.
fn push_separator(doc: &Document, snap: &mut VisibleTextSnapshot, sep: &str) {
    let Some(&prev) = snap.nodes.last() else {
        return;
    };
    let end = doc.text(prev).map_or(0, str::len);
    snap.push(prev, end, SegmentKind::Substituted { within_end: end }, sep);
}

fn push_text(
    doc: &Document,
    snap: &mut VisibleTextSnapshot,
    node: NodeId,
    white_space: WhiteSpaceCollapse,
    first_in_element: bool,
) {
    let Some(data) = doc.text(node) else {
        return;
    };
    if data.is_empty() {
        return;
    }

    let prev_is_space = snap
        .text
        .chars()
        .next_back()
        .is_some_and(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let output_was_empty = snap.text.is_empty();

    let mut verbatim_start = 0;
    for (start, end) in collapsible_runs(data, white_space) {
        let replacement = if start == 0 {
            if first_in_element || output_was_empty || prev_is_space {
                ""
            } else {
                " "
            }
        } else {
            " "
        };
        if &data[start..end] == replacement {
            continue;
        }
        snap.push(node, verbatim_start, SegmentKind::Verbatim, &data[verbatim_start..start]);
        snap.push(node, start, SegmentKind::Substituted { within_end: end }, replacement);
        verbatim_start = end;
    }
    snap.push(node, verbatim_start, SegmentKind::Verbatim, &data[verbatim_start..]);
}

/// Byte ranges of the whitespace runs that collapse under `mode`.
fn collapsible_runs(data: &str, mode: WhiteSpaceCollapse) -> Vec<(usize, usize)> {
    let bytes = data.as_bytes();
    let is_space = |b: u8| b == b' ' || b == b'\t';
    let is_break = |b: u8| b == b'\n' || b == b'\r';
    let mut runs = Vec::new();
    let mut i = 0;

    match mode {
        WhiteSpaceCollapse::Preserve => {}
        WhiteSpaceCollapse::Collapse => {
            while i < bytes.len() {
                if is_space(bytes[i]) || is_break(bytes[i]) {
                    let start = i;
                    while i < bytes.len() && (is_space(bytes[i]) || is_break(bytes[i])) {
                        i += 1;
                    }
                    runs.push((start, i));
                } else {
                    i += 1;
                }
            }
        }
        WhiteSpaceCollapse::PreserveBreaks => {
            while i < bytes.len() {
                if is_space(bytes[i]) {
                    let start = i;
                    while i < bytes.len() && is_space(bytes[i]) {
                        i += 1;
                    }
                    runs.push((start, i));
                } else {
                    i += 1;
                }
            }
        }
        WhiteSpaceCollapse::PreserveSpaces => {
            // Line breaks together with the spaces around them.
            while i < bytes.len() {
                if !is_space(bytes[i]) && !is_break(bytes[i]) {
                    i += 1;
                    continue;
                }
                let start = i;
                let mut j = i;
                while j < bytes.len() && is_space(bytes[j]) {
                    j += 1;
                }
                if j < bytes.len() && is_break(bytes[j]) {
                    while j < bytes.len() && is_break(bytes[j]) {
                        j += 1;
                    }
                    while j < bytes.len() && is_space(bytes[j]) {
                        j += 1;
                    }
                    runs.push((start, j));
                    i = j;
                } else {
                    i = j.max(i + 1);
                }
            }
        }
    }
    runs
}
