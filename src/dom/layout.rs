use std::collections::HashMap;

use crate::dom::css::{ComputedStyle, Display, WhiteSpaceCollapse};
use crate::dom::{Document, NodeId, NodeType};

/// Axis-aligned box in document coordinates (CSS pixels, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn union(&self, other: &LayoutBox) -> LayoutBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        LayoutBox {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn intersect(&self, other: &LayoutBox) -> LayoutBox {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        LayoutBox {
            x,
            y,
            width: (self.right().min(other.right()) - x).max(0.0),
            height: (self.bottom().min(other.bottom()) - y).max(0.0),
        }
    }

    pub fn translate(&self, dx: f32, dy: f32) -> LayoutBox {
        LayoutBox { x: self.x + dx, y: self.y + dy, ..*self }
    }
}

/// One line's worth of a text node: bytes `start..end` of its data.
#[derive(Debug, Clone)]
pub struct TextFragment {
    pub start: usize,
    pub end: usize,
    pub rect: LayoutBox,
    pub char_width: f32,
    char_starts: Vec<usize>,
}

impl TextFragment {
    /// Pen x position just before byte `at`.
    fn caret(&self, at: usize) -> f32 {
        let chars = self.char_starts.partition_point(|&b| b < at);
        self.rect.x + chars as f32 * self.char_width
    }
}

/// Result of laying out a document.
#[derive(Debug, Default)]
pub struct Layout {
    boxes: HashMap<NodeId, LayoutBox>,
    styles: HashMap<NodeId, ComputedStyle>,
    fragments: HashMap<NodeId, Vec<TextFragment>>,
    /// Laid-out elements in document order.
    order: Vec<NodeId>,
    pub width: f32,
    pub height: f32,
}

impl Layout {
    pub fn box_of(&self, id: NodeId) -> Option<LayoutBox> {
        self.boxes.get(&id).copied()
    }

    pub fn style_of(&self, id: NodeId) -> Option<&ComputedStyle> {
        self.styles.get(&id)
    }

    /// Elements with a box, in document order.
    pub fn elements(&self) -> &[NodeId] {
        &self.order
    }

    /// Rect covering bytes `start..end` of a text node. A collapsed range
    /// yields a zero-width rect at the caret position.
    pub fn text_rect(&self, node: NodeId, start: usize, end: usize) -> Option<LayoutBox> {
        let frags = self.fragments.get(&node)?;

        let mut rect: Option<LayoutBox> = None;
        for f in frags {
            let lo = start.max(f.start);
            let hi = end.min(f.end);
            let touches = if start == end {
                start >= f.start && start <= f.end
            } else {
                lo < hi
            };
            if !touches {
                continue;
            }
            let x0 = f.caret(lo);
            let x1 = f.caret(hi.max(lo));
            let piece = LayoutBox::new(x0, f.rect.y, x1 - x0, f.rect.height);
            rect = Some(match rect {
                Some(r) => r.union(&piece),
                None => piece,
            });
            if start == end {
                break;
            }
        }
        rect
    }
}

/// Per-tag vertical margins (top, bottom) in pixels.
fn tag_margins(tag: &str) -> (f32, f32) {
    match tag {
        "h1" => (24.0, 16.0),
        "h2" => (20.0, 12.0),
        "h3" | "h4" => (16.0, 10.0),
        "h5" | "h6" => (12.0, 8.0),
        "p" => (4.0, 10.0),
        "ul" | "ol" => (8.0, 8.0),
        "li" => (2.0, 2.0),
        "section" | "article" | "main" => (16.0, 16.0),
        "blockquote" | "pre" => (8.0, 8.0),
        _ => (0.0, 0.0),
    }
}

fn font_size_for(tag: &str, parent: f32) -> f32 {
    match tag {
        "h1" => 32.0,
        "h2" => 24.0,
        "h3" => 20.0,
        "h4" => 18.0,
        "small" => 12.0,
        _ => parent,
    }
}

/// Compute a simple top-to-bottom block layout. Inline content flows into
/// monospaced lines (`0.6em` per char, `1.4em` line height).
pub fn compute_layout(doc: &Document, viewport_width: f32) -> Layout {
    let mut ctx = LayoutCtx {
        doc,
        layout: Layout { width: viewport_width, ..Layout::default() },
        y: 0.0,
        pen: None,
        line_height: 0.0,
    };
    if let Some(html) = doc.document_element() {
        ctx.element(html, 0.0, viewport_width, None, 16.0);
        ctx.break_line();
    }
    let height = ctx.y;
    let mut layout = ctx.layout;
    layout.height = height;
    layout
}

struct LayoutCtx<'a> {
    doc: &'a Document,
    layout: Layout,
    /// Top of the current line (or the next block).
    y: f32,
    /// Pen x position when a line is open.
    pen: Option<f32>,
    line_height: f32,
}

impl LayoutCtx<'_> {
    fn break_line(&mut self) {
        if self.pen.take().is_some() {
            self.y += self.line_height;
        }
    }

    fn element(
        &mut self,
        id: NodeId,
        left: f32,
        width: f32,
        parent: Option<&ComputedStyle>,
        parent_font: f32,
    ) -> Option<LayoutBox> {
        let style = ComputedStyle::cascade(self.doc, id, parent);
        if style.display == Display::None {
            return None;
        }
        let tag = self.doc.tag(id).unwrap_or_default().to_string();
        let font_size = font_size_for(&tag, parent_font);
        let block = style.display.is_block_level() || style.display == Display::TableCell;
        self.layout.styles.insert(id, style);
        self.layout.order.push(id);

        let (margin_top, margin_bottom) = tag_margins(&tag);
        let padding = if block { 4.0 } else { 0.0 };
        if block {
            self.break_line();
            self.y += margin_top;
        }
        let start_y = self.y;
        self.y += padding;

        let child_left = left + padding;
        let child_width = (width - padding * 2.0).max(0.0);
        let mut content: Option<LayoutBox> = None;
        let doc = self.doc;
        for &child in doc.children(id) {
            let child_box = match doc.get(child).map(|n| n.node_type) {
                Some(NodeType::Element) => {
                    self.element(child, child_left, child_width, Some(&style), font_size)
                }
                Some(NodeType::Text) => {
                    self.text(child, child_left, child_width, font_size, style.white_space)
                }
                _ => None,
            };
            if let Some(b) = child_box {
                content = Some(content.map_or(b, |c| c.union(&b)));
            }
        }

        let bounds = if block {
            self.break_line();
            self.y += padding;
            let b = LayoutBox::new(left, start_y, width, self.y - start_y);
            self.y += margin_bottom;
            b
        } else {
            content.unwrap_or_else(|| {
                LayoutBox::new(self.pen.unwrap_or(left), self.y, 0.0, font_size * 1.4)
            })
        };
        self.layout.boxes.insert(id, bounds);
        Some(bounds)
    }

    fn text(
        &mut self,
        id: NodeId,
        left: f32,
        width: f32,
        font_size: f32,
        white_space: WhiteSpaceCollapse,
    ) -> Option<LayoutBox> {
        let doc = self.doc;
        let data = doc.text(id)?;
        if white_space.collapses_breaks() && data.trim().is_empty() {
            return None;
        }
        let char_width = font_size * 0.6;
        let line_height = font_size * 1.4;
        let right = left + width;
        let mut frags: Vec<TextFragment> = Vec::new();
        let mut open: Option<TextFragment> = None;

        for (i, c) in data.char_indices() {
            if self.pen.is_none() {
                self.line_height = line_height;
            }
            let pen = self.pen.unwrap_or(left);
            let hard_break = c == '\n' && !white_space.collapses_breaks();
            let wrap = pen + char_width > right && pen > left;
            if hard_break || wrap {
                if let Some(f) = open.take() {
                    frags.push(f);
                }
                self.pen = Some(left);
                self.break_line();
                if hard_break {
                    continue;
                }
            }
            let pen = self.pen.unwrap_or(left);
            self.line_height = self.line_height.max(line_height);
            let f = open.get_or_insert(TextFragment {
                start: i,
                end: i,
                rect: LayoutBox::new(pen, self.y, 0.0, line_height),
                char_width,
                char_starts: Vec::new(),
            });
            f.char_starts.push(i);
            f.end = i + c.len_utf8();
            f.rect.width += char_width;
            self.pen = Some(pen + char_width);
        }
        if let Some(f) = open {
            frags.push(f);
        }

        let bounds = frags
            .iter()
            .map(|f| f.rect)
            .reduce(|a, b| a.union(&b));
        self.layout.fragments.insert(id, frags);
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parser::parse_html;

    #[test]
    fn blocks_stack_vertically() {
        let doc = parse_html("<body><p id='a'>one</p><p id='b'>two</p></body>", "");
        let layout = compute_layout(&doc, 800.0);
        let a = layout.box_of(doc.element_by_id("a").unwrap()).unwrap();
        let b = layout.box_of(doc.element_by_id("b").unwrap()).unwrap();
        assert!(b.y >= a.bottom());
        assert!(layout.height >= b.bottom());
    }

    #[test]
    fn hidden_elements_have_no_box() {
        let doc = parse_html("<body><div id='h' style='display:none'>x</div></body>", "");
        let layout = compute_layout(&doc, 800.0);
        assert!(layout.box_of(doc.element_by_id("h").unwrap()).is_none());
    }

    #[test]
    fn text_rect_covers_substring() {
        let doc = parse_html("<body><p id='p'>hello world</p></body>", "");
        let layout = compute_layout(&doc, 800.0);
        let p = doc.element_by_id("p").unwrap();
        let text = doc.children(p)[0];
        let whole = layout.text_rect(text, 0, 11).unwrap();
        let world = layout.text_rect(text, 6, 11).unwrap();
        assert!(world.x > whole.x);
        assert!((world.right() - whole.right()).abs() < 0.01);
        let caret = layout.text_rect(text, 6, 6).unwrap();
        assert_eq!(caret.width, 0.0);
    }

    #[test]
    fn long_text_wraps() {
        let doc = parse_html("<body><p id='p'>aaaaaaaaaaaaaaaaaaaa</p></body>", "");
        let layout = compute_layout(&doc, 100.0);
        let p = doc.element_by_id("p").unwrap();
        let text = doc.children(p)[0];
        let r = layout.text_rect(text, 0, 20).unwrap();
        assert!(r.height > 16.0 * 1.4);
    }
}
