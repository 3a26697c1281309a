//! Mapping match offsets in a snapshot back onto DOM ranges.

use crate::dom::{Document, NodeId};
use crate::text::{SegmentKind, VisibleTextSnapshot};

/// A position inside a text node: byte `offset` of its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

/// DOM range equivalent for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchRange {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
}

/// The live document no longer agrees with the snapshot the match was found
/// in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("match {start}..{end} lies outside the snapshot text (length {len})")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("match end maps before its start")]
    Inverted,
    #[error("node {0:?} is no longer a connected text node")]
    Detached(NodeId),
    #[error("offset {offset} is not a valid position in node {node:?}")]
    BadOffset { node: NodeId, offset: usize },
    #[error("text of node {0:?} changed since the snapshot")]
    Changed(NodeId),
}

/// Convert the snapshot byte range `start..end` into a [`MatchRange`].
pub fn reconcile(
    doc: &Document,
    snapshot: &VisibleTextSnapshot,
    start: usize,
    end: usize,
) -> Result<MatchRange, RangeError> {
    let len = snapshot.text.len();
    if start > end || end > len || snapshot.nodes.is_empty() {
        return Err(RangeError::OutOfBounds { start, end, len });
    }

    // A zero-length match at the very end belongs to the last unit.
    let start_unit = snapshot
        .unit_at(start)
        .unwrap_or(snapshot.nodes.len() - 1);
    let start_point = point_at_start(snapshot, start_unit, start);

    let (end_unit, end_point) = if start == end {
        (start_unit, start_point)
    } else {
        let end_unit = snapshot
            .unit_at(end - 1)
            .ok_or(RangeError::OutOfBounds { start, end, len })?;
        if end_unit < start_unit {
            return Err(RangeError::Inverted);
        }
        (end_unit, point_at_end(snapshot, end_unit, end))
    };

    validate(doc, snapshot, start_point)?;
    validate(doc, snapshot, end_point)?;
    if start < end {
        verify_unit(doc, snapshot, start_unit, start, end)?;
        if end_unit != start_unit {
            verify_unit(doc, snapshot, end_unit, start, end)?;
        }
    }
    Ok(MatchRange { start: start_point, end: end_point })
}

/// The part of `start..end` inside verbatim unit `k` must still read the same
/// in the node.
fn verify_unit(
    doc: &Document,
    snapshot: &VisibleTextSnapshot,
    k: usize,
    start: usize,
    end: usize,
) -> Result<(), RangeError> {
    if snapshot.kinds[k] != SegmentKind::Verbatim {
        return Ok(());
    }
    let node = snapshot.nodes[k];
    let base = snapshot.offsets[k];
    let (from, to) = (start.max(base), end.min(snapshot.unit_end(k)));
    let within = snapshot.offsets_within[k] + (from - base);
    let expected = snapshot.text.get(from..to);
    let actual = doc.text(node).and_then(|data| data.get(within..within + (to - from)));
    match (expected, actual) {
        (Some(e), Some(a)) if e == a => Ok(()),
        _ => Err(RangeError::Changed(node)),
    }
}

fn point_at_start(snapshot: &VisibleTextSnapshot, k: usize, i: usize) -> BoundaryPoint {
    let node = snapshot.nodes[k];
    let base = snapshot.offsets[k];
    let within = snapshot.offsets_within[k];
    let offset = match snapshot.kinds[k] {
        SegmentKind::Verbatim => within + (i - base),
        SegmentKind::Substituted { .. } if i == base => within,
        SegmentKind::Substituted { within_end } => within_end,
    };
    BoundaryPoint { node, offset }
}

fn point_at_end(snapshot: &VisibleTextSnapshot, k: usize, e: usize) -> BoundaryPoint {
    let node = snapshot.nodes[k];
    let offset = match snapshot.kinds[k] {
        SegmentKind::Verbatim => snapshot.offsets_within[k] + (e - snapshot.offsets[k]),
        SegmentKind::Substituted { within_end } => within_end,
    };
    BoundaryPoint { node, offset }
}

fn validate(doc: &Document, snapshot: &VisibleTextSnapshot, p: BoundaryPoint) -> Result<(), RangeError> {
    let under_root = snapshot
        .root
        .map_or(true, |root| doc.is_inclusive_ancestor(root, p.node));
    let data = doc
        .text(p.node)
        .filter(|_| under_root && doc.is_connected(p.node))
        .ok_or(RangeError::Detached(p.node))?;
    if p.offset > data.len() || !data.is_char_boundary(p.offset) {
        return Err(RangeError::BadOffset { node: p.node, offset: p.offset });
    }
    Ok(())
}

impl MatchRange {
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// The text the range covers, concatenating text nodes in document order.
    pub fn to_text(&self, doc: &Document) -> Option<String> {
        let start_data = doc.text(self.start.node)?;
        if self.start.node == self.end.node {
            return start_data.get(self.start.offset..self.end.offset).map(str::to_string);
        }
        let end_data = doc.text(self.end.node)?;
        let ancestor = doc.common_ancestor(self.start.node, self.end.node)?;

        let mut out = start_data.get(self.start.offset..)?.to_string();
        let mut inside = false;
        for id in doc.descendants(ancestor) {
            if id == self.start.node {
                inside = true;
            } else if id == self.end.node {
                out.push_str(end_data.get(..self.end.offset)?);
                return Some(out);
            } else if inside {
                if let Some(t) = doc.text(id) {
                    out.push_str(t);
                }
            }
        }
        None
    }

    /// Elements containing the start and end boundary points.
    pub fn containers(&self, doc: &Document) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = [self.start.node, self.end.node]
            .iter()
            .filter_map(|&n| doc.element_ancestor(n))
            .collect();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parser::parse_html;
    use crate::text::{extract, ExtractOptions};

    fn setup(html: &str) -> (Document, VisibleTextSnapshot) {
        let doc = parse_html(html, "");
        let snap = extract(&doc, doc.body().unwrap(), ExtractOptions::default());
        (doc, snap)
    }

    fn range_text(doc: &Document, snap: &VisibleTextSnapshot, needle: &str) -> String {
        let start = snap.text.find(needle).unwrap();
        let range = reconcile(doc, snap, start, start + needle.len()).unwrap();
        range.to_text(doc).unwrap()
    }

    #[test]
    fn round_trips_within_and_across_nodes() {
        let (doc, snap) = setup("<body><p>The <b>quick</b> brown fox</p><p>jumps</p></body>");
        for needle in ["The", "quick", "he qu", "quick brown", "brown fox", "jumps"] {
            assert_eq!(range_text(&doc, &snap, needle), needle);
        }
    }

    #[test]
    fn collapsed_whitespace_maps_to_the_whole_run() {
        let (doc, snap) = setup("<body><p>a    b</p></body>");
        assert_eq!(snap.text, "a b\n\n\n");
        let range = reconcile(&doc, &snap, 0, 3).unwrap();
        assert_eq!(range.to_text(&doc).unwrap(), "a    b");
        let space = reconcile(&doc, &snap, 1, 2).unwrap();
        assert_eq!((space.start.offset, space.end.offset), (1, 5));
    }

    #[test]
    fn zero_length_match_is_collapsed() {
        let (doc, snap) = setup("<body><p>abc</p></body>");
        let range = reconcile(&doc, &snap, 1, 1).unwrap();
        assert!(range.is_collapsed());
        assert_eq!(range.start.offset, 1);
        let at_end = reconcile(&doc, &snap, snap.len(), snap.len()).unwrap();
        assert!(at_end.is_collapsed());
    }

    #[test]
    fn detects_mismatch_after_mutation() {
        let (mut doc, snap) = setup("<body><p id='p'>hello world</p></body>");
        let p = doc.element_by_id("p").unwrap();
        let text = doc.children(p)[0];

        doc.set_text(text, "hi").unwrap();
        assert!(matches!(
            reconcile(&doc, &snap, 6, 11),
            Err(RangeError::BadOffset { .. })
        ));

        doc.set_text(text, "hello there").unwrap();
        assert_eq!(reconcile(&doc, &snap, 6, 11), Err(RangeError::Changed(text)));
        assert!(reconcile(&doc, &snap, 0, 5).is_ok());

        doc.remove(text).unwrap();
        let err = reconcile(&doc, &snap, 0, 2).unwrap_err();
        assert!(matches!(err, RangeError::Detached(_)));
    }

    #[test]
    fn rejects_out_of_bounds() {
        let (doc, snap) = setup("<body>abc</body>");
        assert!(matches!(
            reconcile(&doc, &snap, 2, 99),
            Err(RangeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            reconcile(&doc, &snap, 2, 1),
            Err(RangeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn multibyte_offsets_stay_on_char_boundaries() {
        let (doc, snap) = setup("<body><p>chương one</p></body>");
        let start = snap.text.find("one").unwrap();
        let range = reconcile(&doc, &snap, 0, start - 1).unwrap();
        assert_eq!(range.to_text(&doc).unwrap(), "chương");
    }
}
