//! Bringing a match into view.

use crate::dom::css::{computed_style, Position};
use crate::dom::layout::{compute_layout, Layout, LayoutBox};
use crate::dom::{Document, NodeId};
use crate::text::range::MatchRange;

/// Geometry and scrolling of the page, in client (viewport) coordinates.
pub trait Viewport {
    /// Bounding rect of `range`.
    fn range_rect(&self, doc: &Document, range: &MatchRange) -> Option<LayoutBox>;
    /// Topmost element at client point `(x, y)`.
    fn element_from_point(&self, x: f32, y: f32) -> Option<NodeId>;
    fn client_size(&self) -> (f32, f32);
    fn scroll_offset(&self) -> (f32, f32);
    /// Centre `element` within its scroll containers.
    fn scroll_element_into_view(&mut self, doc: &Document, element: NodeId);
    fn scroll_to(&mut self, left: f32, top: f32);
    /// The document was mutated or resized.
    fn document_changed(&mut self, _doc: &Document) {}
}

/// Nearest ancestor of `element` that scrolls, or `None` when that is the
/// document itself.
pub fn scroll_parent(doc: &Document, element: NodeId) -> Option<NodeId> {
    let position = computed_style(doc, element).position;
    if position == Position::Fixed {
        return None;
    }
    let skip_static = position == Position::Absolute;

    let mut current = doc.parent_element(element);
    while let Some(parent) = current {
        let style = computed_style(doc, parent);
        if !(skip_static && style.position == Position::Static) && style.overflow.is_scrollable() {
            return Some(parent);
        }
        current = doc.parent_element(parent);
    }
    None
}

/// Scroll `range` into view unless both corners of its rect already show
/// one of its containers.
pub fn scroll_into_view<V: Viewport + ?Sized>(viewport: &mut V, doc: &Document, range: &MatchRange) {
    let Some(rect) = viewport.range_rect(doc, range) else {
        return;
    };
    let Some(common) = doc
        .common_ancestor(range.start.node, range.end.node)
        .and_then(|n| doc.element_ancestor(n))
    else {
        return;
    };
    let mut containers = range.containers(doc);
    containers.push(common);

    let shows_container = |hit: Option<NodeId>| hit.is_some_and(|h| containers.contains(&h));
    let first = viewport.element_from_point(rect.x, rect.y);
    let last = viewport.element_from_point(rect.right() - 1.0, rect.bottom() - 1.0);
    if !shows_container(first) || !shows_container(last) {
        scroll_to_range(viewport, doc, range, common);
    }
}

fn scroll_to_range<V: Viewport + ?Sized>(viewport: &mut V, doc: &Document, range: &MatchRange, element: NodeId) {
    if scroll_parent(doc, element).is_some() {
        viewport.scroll_element_into_view(doc, element);
    }
    // The element is usually much larger than the range; aim at the range.
    let Some(rect) = viewport.range_rect(doc, range) else {
        return;
    };
    let (width, height) = viewport.client_size();
    let (sx, sy) = viewport.scroll_offset();
    let top = rect.y + sy - height / 2.0 + rect.height / 2.0;
    let left = rect.x + sx - width / 2.0 + rect.width / 2.0;
    log::debug!("scrolling document to ({left:.0}, {top:.0})");
    viewport.scroll_to(left, top);
}

/// Headless viewport over a computed [`Layout`]. Nested scroll containers
/// are not clipped; scrolling an element into view centres it in the
/// document scroll.
#[derive(Debug)]
pub struct LayoutViewport {
    layout: Layout,
    width: f32,
    height: f32,
    scroll_x: f32,
    scroll_y: f32,
    scrolled_elements: Vec<NodeId>,
}

impl LayoutViewport {
    pub fn new(doc: &Document, width: f32, height: f32) -> Self {
        Self {
            layout: compute_layout(doc, width),
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
            scrolled_elements: Vec::new(),
        }
    }

    /// Lay the document out again after it changed.
    pub fn relayout(&mut self, doc: &Document) {
        self.layout = compute_layout(doc, self.width);
        self.clamp_scroll();
    }

    pub fn resize(&mut self, doc: &Document, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.relayout(doc);
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Elements passed to [`Viewport::scroll_element_into_view`], oldest first.
    pub fn scrolled_elements(&self) -> &[NodeId] {
        &self.scrolled_elements
    }

    fn clamp_scroll(&mut self) {
        let max_x = (self.layout.width - self.width).max(0.0);
        let max_y = (self.layout.height - self.height).max(0.0);
        self.scroll_x = self.scroll_x.clamp(0.0, max_x);
        self.scroll_y = self.scroll_y.clamp(0.0, max_y);
    }

    fn document_rect(&self, doc: &Document, range: &MatchRange) -> Option<LayoutBox> {
        let (start, end) = (range.start, range.end);
        if start.node == end.node {
            return self.layout.text_rect(start.node, start.offset, end.offset);
        }
        let ancestor = doc.common_ancestor(start.node, end.node)?;
        let mut rect: Option<LayoutBox> = None;
        let mut inside = false;
        for id in doc.descendants(ancestor) {
            let piece = if id == start.node {
                inside = true;
                let len = doc.text(id).map_or(0, str::len);
                self.layout.text_rect(id, start.offset, len)
            } else if id == end.node {
                self.layout.text_rect(id, 0, end.offset)
            } else if inside {
                doc.text(id).and_then(|t| self.layout.text_rect(id, 0, t.len()))
            } else {
                None
            };
            if let Some(p) = piece {
                rect = Some(rect.map_or(p, |r| r.union(&p)));
            }
            if id == end.node {
                break;
            }
        }
        rect
    }
}

impl Viewport for LayoutViewport {
    fn range_rect(&self, doc: &Document, range: &MatchRange) -> Option<LayoutBox> {
        self.document_rect(doc, range)
            .map(|r| r.translate(-self.scroll_x, -self.scroll_y))
    }

    fn element_from_point(&self, x: f32, y: f32) -> Option<NodeId> {
        let (x, y) = (x + self.scroll_x, y + self.scroll_y);
        if x < self.scroll_x || y < self.scroll_y || x >= self.scroll_x + self.width || y >= self.scroll_y + self.height {
            return None;
        }
        self.layout
            .elements()
            .iter()
            .rev()
            .copied()
            .find(|&id| self.layout.box_of(id).is_some_and(|b| b.contains(x, y)))
    }

    fn client_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn scroll_offset(&self) -> (f32, f32) {
        (self.scroll_x, self.scroll_y)
    }

    fn scroll_element_into_view(&mut self, _doc: &Document, element: NodeId) {
        self.scrolled_elements.push(element);
        if let Some(b) = self.layout.box_of(element) {
            self.scroll_x = b.x + b.width / 2.0 - self.width / 2.0;
            self.scroll_y = b.y + b.height / 2.0 - self.height / 2.0;
            self.clamp_scroll();
        }
    }

    fn scroll_to(&mut self, left: f32, top: f32) {
        self.scroll_x = left;
        self.scroll_y = top;
        self.clamp_scroll();
    }

    fn document_changed(&mut self, doc: &Document) {
        self.relayout(doc);
    }
}
