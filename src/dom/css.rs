//! Lightweight computed-style resolution.
//!
//! Only the properties that affect visible text and scrolling are resolved:
//! a user-agent default table per tag, overridden by declarations in the
//! inline `style=""` attribute, with CSS inheritance for `white-space` and
//! `visibility`.

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    None,
    #[default]
    Inline,
    Block,
    InlineBlock,
    ListItem,
    Table,
    TableRow,
    TableCell,
    TableCaption,
    TableHeaderGroup,
    TableRowGroup,
    Flex,
    InlineFlex,
    Contents,
}

impl Display {
    fn parse(val: &str) -> Option<Self> {
        Some(match val {
            "none" => Self::None,
            "inline" => Self::Inline,
            "block" | "flow-root" | "grid" => Self::Block,
            "inline-block" | "inline-grid" => Self::InlineBlock,
            "list-item" => Self::ListItem,
            "table" | "inline-table" => Self::Table,
            "table-row" => Self::TableRow,
            "table-cell" => Self::TableCell,
            "table-caption" => Self::TableCaption,
            "table-header-group" => Self::TableHeaderGroup,
            "table-row-group" | "table-footer-group" => Self::TableRowGroup,
            "flex" => Self::Flex,
            "inline-flex" => Self::InlineFlex,
            "contents" => Self::Contents,
            _ => return None,
        })
    }

    /// Whether the element generates a block-level box for layout purposes.
    pub fn is_block_level(self) -> bool {
        matches!(
            self,
            Self::Block
                | Self::ListItem
                | Self::Table
                | Self::TableRow
                | Self::TableCaption
                | Self::TableHeaderGroup
                | Self::TableRowGroup
                | Self::Flex
        )
    }
}

/// Resolved `white-space-collapse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteSpaceCollapse {
    #[default]
    Collapse,
    Preserve,
    PreserveBreaks,
    PreserveSpaces,
}

impl WhiteSpaceCollapse {
    /// Accepts both `white-space` shorthand values and
    /// `white-space-collapse` longhand values.
    fn parse(val: &str) -> Option<Self> {
        Some(match val {
            "normal" | "nowrap" | "collapse" => Self::Collapse,
            "pre" | "pre-wrap" | "break-spaces" | "preserve" => Self::Preserve,
            "pre-line" | "preserve-breaks" => Self::PreserveBreaks,
            "preserve-spaces" => Self::PreserveSpaces,
            _ => return None,
        })
    }

    pub fn collapses_spaces(self) -> bool {
        matches!(self, Self::Collapse | Self::PreserveBreaks)
    }

    pub fn collapses_breaks(self) -> bool {
        matches!(self, Self::Collapse | Self::PreserveSpaces)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Collapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlexDirection {
    #[default]
    Row,
    RowReverse,
    Column,
    ColumnReverse,
}

impl FlexDirection {
    pub fn is_column(self) -> bool {
        matches!(self, Self::Column | Self::ColumnReverse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Clip,
    Auto,
    Scroll,
}

impl Overflow {
    pub fn is_scrollable(self) -> bool {
        matches!(self, Self::Auto | Self::Scroll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

/// Inline `style=""` declarations this module understands. `None` means the
/// property was not declared (or its value was not recognised).
#[derive(Debug, Clone, Default)]
pub struct StyleProps {
    pub display: Option<Display>,
    pub white_space: Option<WhiteSpaceCollapse>,
    pub visibility: Option<Visibility>,
    pub flex_direction: Option<FlexDirection>,
    pub overflow: Option<Overflow>,
    pub position: Option<Position>,
}

/// Parse an inline `style="..."` attribute value. Later declarations win.
pub fn parse_inline_style(style: &str) -> StyleProps {
    let mut props = StyleProps::default();
    for decl in style.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let val = val.trim().trim_end_matches("!important").trim().to_ascii_lowercase();
        match prop.as_str() {
            "display" => props.display = Display::parse(&val).or(props.display),
            "white-space" | "white-space-collapse" => {
                props.white_space = WhiteSpaceCollapse::parse(&val).or(props.white_space)
            }
            "visibility" => {
                props.visibility = match val.as_str() {
                    "visible" => Some(Visibility::Visible),
                    "hidden" => Some(Visibility::Hidden),
                    "collapse" => Some(Visibility::Collapse),
                    _ => props.visibility,
                }
            }
            "flex-direction" => {
                props.flex_direction = match val.as_str() {
                    "row" => Some(FlexDirection::Row),
                    "row-reverse" => Some(FlexDirection::RowReverse),
                    "column" => Some(FlexDirection::Column),
                    "column-reverse" => Some(FlexDirection::ColumnReverse),
                    _ => props.flex_direction,
                }
            }
            "overflow" | "overflow-y" => props.overflow = parse_overflow(&val).or(props.overflow),
            "position" => {
                props.position = match val.as_str() {
                    "static" => Some(Position::Static),
                    "relative" => Some(Position::Relative),
                    "absolute" => Some(Position::Absolute),
                    "fixed" => Some(Position::Fixed),
                    "sticky" => Some(Position::Sticky),
                    _ => props.position,
                }
            }
            _ => {}
        }
    }
    props
}

fn parse_overflow(val: &str) -> Option<Overflow> {
    // `overflow: hidden auto` → the second (block-axis) keyword.
    let last = val.split_whitespace().last()?;
    Some(match last {
        "visible" => Overflow::Visible,
        "hidden" => Overflow::Hidden,
        "clip" => Overflow::Clip,
        "auto" | "overlay" => Overflow::Auto,
        "scroll" => Overflow::Scroll,
        _ => return None,
    })
}

/// User-agent default `display` for an element.
pub fn ua_display(tag: &str) -> Display {
    match tag {
        "head" | "title" | "meta" | "link" | "script" | "style" | "template" | "noscript"
        | "base" | "datalist" | "param" | "source" | "track" | "area" | "dialog" => Display::None,
        "html" | "body" | "div" | "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol"
        | "dl" | "dt" | "dd" | "pre" | "blockquote" | "section" | "article" | "nav" | "aside"
        | "header" | "footer" | "main" | "figure" | "figcaption" | "form" | "fieldset"
        | "legend" | "address" | "hr" | "details" | "summary" | "menu" | "listing" | "xmp"
        | "plaintext" | "center" | "hgroup" | "search" | "optgroup" => Display::Block,
        "li" => Display::ListItem,
        "table" => Display::Table,
        "tr" => Display::TableRow,
        "td" | "th" => Display::TableCell,
        "caption" => Display::TableCaption,
        "thead" => Display::TableHeaderGroup,
        "tbody" | "tfoot" => Display::TableRowGroup,
        "img" | "button" | "input" | "select" | "textarea" | "meter" | "progress" => {
            Display::InlineBlock
        }
        _ => Display::Inline,
    }
}

fn ua_white_space(tag: &str) -> Option<WhiteSpaceCollapse> {
    match tag {
        "pre" | "textarea" | "listing" | "xmp" | "plaintext" => Some(WhiteSpaceCollapse::Preserve),
        _ => None,
    }
}

/// Resolved style of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputedStyle {
    pub display: Display,
    pub white_space: WhiteSpaceCollapse,
    pub visibility: Visibility,
    pub flex_direction: FlexDirection,
    pub overflow: Overflow,
    pub position: Position,
}

impl ComputedStyle {
    /// Resolve the style of element `id` given its parent's computed style.
    pub fn cascade(doc: &Document, id: NodeId, parent: Option<&ComputedStyle>) -> Self {
        let inherited = parent.copied().unwrap_or_default();
        let Some(node) = doc.get(id).filter(|n| n.is_element()) else {
            return inherited;
        };
        let props = node.attr("style").map(parse_inline_style).unwrap_or_default();

        let mut display = props.display.unwrap_or_else(|| ua_display(&node.tag));
        if node.attributes.contains_key("hidden") {
            display = Display::None;
        }

        Self {
            display,
            white_space: props
                .white_space
                .or_else(|| ua_white_space(&node.tag))
                .unwrap_or(inherited.white_space),
            visibility: props.visibility.unwrap_or(inherited.visibility),
            flex_direction: props.flex_direction.unwrap_or_default(),
            overflow: props.overflow.unwrap_or_default(),
            position: props.position.unwrap_or_default(),
        }
    }

    pub fn is_flex_container(&self) -> bool {
        matches!(self.display, Display::Flex | Display::InlineFlex)
    }
}

/// Computed style of an arbitrary element, resolving inheritance from the
/// document root down. Non-elements get the style of their parent element.
pub fn computed_style(doc: &Document, id: NodeId) -> ComputedStyle {
    let mut chain = Vec::new();
    let mut cur = doc.element_ancestor(id);
    while let Some(el) = cur {
        chain.push(el);
        cur = doc.parent_element(el);
    }
    chain
        .iter()
        .rev()
        .fold(None, |parent: Option<ComputedStyle>, &el| {
            Some(ComputedStyle::cascade(doc, el, parent.as_ref()))
        })
        .unwrap_or_default()
}

/// Whether `id` and all its ancestors generate boxes and are visible.
pub fn is_rendered(doc: &Document, id: NodeId) -> bool {
    let mut cur = doc.element_ancestor(id);
    while let Some(el) = cur {
        let style = ComputedStyle::cascade(doc, el, None);
        if style.display == Display::None {
            return false;
        }
        cur = doc.parent_element(el);
    }
    computed_style(doc, id).visibility == Visibility::Visible
}

/// Parse a CSS colour into `[r, g, b, a]` bytes. Used to validate configured
/// highlight colours.
pub fn parse_css_color(val: &str) -> Option<[u8; 4]> {
    let v = val.trim().to_ascii_lowercase();

    let named = match v.as_str() {
        "black" => Some([0, 0, 0, 255]),
        "white" => Some([255, 255, 255, 255]),
        "red" => Some([255, 0, 0, 255]),
        "green" => Some([0, 128, 0, 255]),
        "blue" => Some([0, 0, 255, 255]),
        "yellow" => Some([255, 255, 0, 255]),
        "orange" => Some([255, 165, 0, 255]),
        "purple" => Some([128, 0, 128, 255]),
        "gray" | "grey" => Some([128, 128, 128, 255]),
        "transparent" => Some([0, 0, 0, 0]),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    if let Some(hex) = v.strip_prefix('#') {
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        let nibble = |i: usize| byte(hex.get(i..i + 1)?).map(|n| n * 17);
        let pair = |i: usize| byte(hex.get(i..i + 2)?);
        return match hex.len() {
            3 => Some([nibble(0)?, nibble(1)?, nibble(2)?, 255]),
            4 => Some([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?]),
            6 => Some([pair(0)?, pair(2)?, pair(4)?, 255]),
            8 => Some([pair(0)?, pair(2)?, pair(4)?, pair(6)?]),
            _ => None,
        };
    }

    if let Some(inner) = v
        .strip_prefix("rgba(")
        .or_else(|| v.strip_prefix("rgb("))
        .and_then(|s| s.strip_suffix(')'))
    {
        let nums: Vec<f32> = inner
            .split([',', ' ', '/'])
            .filter(|s| !s.is_empty())
            .map(|s| s.trim().parse::<f32>().ok())
            .collect::<Option<_>>()?;
        if nums.len() < 3 {
            return None;
        }
        let channel = |n: f32| n.clamp(0.0, 255.0).round() as u8;
        let alpha = nums.get(3).map_or(255, |a| (a.clamp(0.0, 1.0) * 255.0).round() as u8);
        return Some([channel(nums[0]), channel(nums[1]), channel(nums[2]), alpha]);
    }

    None
}
