//! Syntax highlighting for regex queries.
//!
//! The query is parsed with `regex-syntax` and every AST node with a span
//! becomes a [`HighlightSpan`]. Spans nest: a quantifier span contains the
//! span of the atom it repeats. Queries the parser rejects get no spans.

use regex_syntax::ast::{self, Ast, ClassSet, ClassSetItem, LiteralKind};

use crate::search::compile::parse_literal;

/// Highlight categories, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HighlightKind {
    Flags,
    Alternative,
    Quantifier,
    Group,
    CapturingGroup,
    CharacterClass,
    Assertion,
    CharacterSet,
    Dot,
    EscapedCharacter,
    Literal,
}

impl HighlightKind {
    pub const ALL: [HighlightKind; 11] = [
        HighlightKind::Flags,
        HighlightKind::Alternative,
        HighlightKind::Quantifier,
        HighlightKind::Group,
        HighlightKind::CapturingGroup,
        HighlightKind::CharacterClass,
        HighlightKind::Assertion,
        HighlightKind::CharacterSet,
        HighlightKind::Dot,
        HighlightKind::EscapedCharacter,
        HighlightKind::Literal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HighlightKind::Flags => "Flags",
            HighlightKind::Alternative => "Alternative",
            HighlightKind::Quantifier => "Quantifier",
            HighlightKind::Group => "Group",
            HighlightKind::CapturingGroup => "CapturingGroup",
            HighlightKind::CharacterClass => "CharacterClass",
            HighlightKind::Assertion => "Assertion",
            HighlightKind::CharacterSet => "CharacterSet",
            HighlightKind::Dot => "Dot",
            HighlightKind::EscapedCharacter => "EscapedCharacter",
            HighlightKind::Literal => "Literal",
        }
    }
}

/// Byte range `start..end` of the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub kind: HighlightKind,
    pub start: usize,
    pub end: usize,
}

/// Spans for a pattern source.
pub fn highlight_pattern(source: &str) -> Vec<HighlightSpan> {
    let mut out = Vec::new();
    match ast::parse::Parser::new().parse(source) {
        Ok(ast) => walk(&ast, &mut out),
        Err(e) => log::debug!("no syntax highlighting for {:?}: {}", source, e),
    }
    out
}

/// Spans for the query box. Full literals are highlighted in place, with
/// their flag letters.
pub fn highlight_query(query: &str, is_full: bool) -> Vec<HighlightSpan> {
    if !is_full {
        return highlight_pattern(query);
    }
    let Some((source, flags)) = parse_literal(query) else {
        return Vec::new();
    };
    let base = query.len() - query.trim_start().len() + 1;
    let mut out: Vec<HighlightSpan> = highlight_pattern(source)
        .into_iter()
        .map(|s| HighlightSpan { start: s.start + base, end: s.end + base, ..s })
        .collect();
    if !flags.is_empty() {
        let start = base + source.len() + 1;
        out.push(HighlightSpan { kind: HighlightKind::Flags, start, end: start + flags.len() });
    }
    out
}

fn push(out: &mut Vec<HighlightSpan>, kind: HighlightKind, span: &ast::Span) {
    out.push(HighlightSpan { kind, start: span.start.offset, end: span.end.offset });
}

fn literal(out: &mut Vec<HighlightSpan>, lit: &ast::Literal) {
    let kind = match lit.kind {
        LiteralKind::Verbatim => HighlightKind::Literal,
        _ => HighlightKind::EscapedCharacter,
    };
    push(out, kind, &lit.span);
}

fn walk(node: &Ast, out: &mut Vec<HighlightSpan>) {
    match node {
        Ast::Empty(_) => {}
        Ast::Flags(f) => push(out, HighlightKind::Flags, &f.span),
        Ast::Literal(lit) => literal(out, lit),
        Ast::Dot(span) => push(out, HighlightKind::Dot, span),
        Ast::Assertion(a) => push(out, HighlightKind::Assertion, &a.span),
        Ast::ClassUnicode(c) => push(out, HighlightKind::CharacterSet, &c.span),
        Ast::ClassPerl(c) => push(out, HighlightKind::CharacterSet, &c.span),
        Ast::ClassBracketed(c) => {
            push(out, HighlightKind::CharacterClass, &c.span);
            class_set(&c.kind, out);
        }
        Ast::Repetition(rep) => {
            push(out, HighlightKind::Quantifier, &rep.span);
            walk(&rep.ast, out);
        }
        Ast::Group(group) => {
            let kind = match group.capture_index() {
                Some(_) => HighlightKind::CapturingGroup,
                None => HighlightKind::Group,
            };
            push(out, kind, &group.span);
            walk(&group.ast, out);
        }
        Ast::Alternation(alt) => {
            for branch in &alt.asts {
                push(out, HighlightKind::Alternative, branch.span());
                walk(branch, out);
            }
        }
        Ast::Concat(concat) => {
            for item in &concat.asts {
                walk(item, out);
            }
        }
    }
}

fn class_set(set: &ClassSet, out: &mut Vec<HighlightSpan>) {
    match set {
        ClassSet::Item(item) => class_item(item, out),
        ClassSet::BinaryOp(op) => {
            class_set(&op.lhs, out);
            class_set(&op.rhs, out);
        }
    }
}

fn class_item(item: &ClassSetItem, out: &mut Vec<HighlightSpan>) {
    match item {
        ClassSetItem::Empty(_) => {}
        ClassSetItem::Literal(lit) => literal(out, lit),
        ClassSetItem::Range(range) => {
            literal(out, &range.start);
            literal(out, &range.end);
        }
        ClassSetItem::Ascii(c) => push(out, HighlightKind::CharacterSet, &c.span),
        ClassSetItem::Unicode(c) => push(out, HighlightKind::CharacterSet, &c.span),
        ClassSetItem::Perl(c) => push(out, HighlightKind::CharacterSet, &c.span),
        ClassSetItem::Bracketed(c) => {
            push(out, HighlightKind::CharacterClass, &c.span);
            class_set(&c.kind, out);
        }
        ClassSetItem::Union(union) => {
            for item in &union.items {
                class_item(item, out);
            }
        }
    }
}
