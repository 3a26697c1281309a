//! Query box input: pasted/dropped data and keys pressed while typing.

use crate::dom::parser::fragment_text;
use crate::view::IndexSetter;

/// Clipboard flavours accepted on paste or drop, most preferred first.
const PASTE_CONVERTERS: [(&str, fn(&str) -> String); 2] = [
    ("text/plain", str::to_string),
    ("text/html", fragment_text),
];

/// Text to insert for pasted or dropped data, given `(mime, data)` pairs.
/// `None` leaves the default paste behaviour alone.
pub fn paste_text<'a>(data: impl IntoIterator<Item = (&'a str, &'a str)> + Clone) -> Option<String> {
    PASTE_CONVERTERS.iter().find_map(|&(mime, convert)| {
        let value = data
            .clone()
            .into_iter()
            .find(|&(m, v)| m == mime && !v.is_empty())?
            .1;
        Some(normalize_newlines(&convert(value)))
    })
}

/// CRLF and CR become LF; leading and trailing newlines are dropped.
pub fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n").trim_matches('\n').to_string()
}

/// A key press in the query box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Plain typing; keep it away from page shortcuts.
    Type,
    InsertNewline,
    Navigate(IndexSetter),
    /// Let the key through unchanged.
    Pass,
}

pub fn query_key_action(key: &KeyPress) -> KeyAction {
    let modified = key.ctrl || key.alt || key.meta;
    if key.key.chars().count() == 1 && !modified {
        return KeyAction::Type;
    }
    if key.key == "Enter" {
        if key.ctrl {
            return KeyAction::InsertNewline;
        }
        return KeyAction::Navigate(if key.shift { IndexSetter::PREVIOUS } else { IndexSetter::NEXT });
    }
    KeyAction::Pass
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_preferred() {
        let data = [("text/html", "<b>bold</b>"), ("text/plain", "plain\r\n")];
        assert_eq!(paste_text(data).as_deref(), Some("plain"));
    }

    #[test]
    fn html_falls_back_to_text_content() {
        let data = [("text/plain", ""), ("text/html", "<p>one\r\n<i>two</i></p>\n")];
        assert_eq!(paste_text(data).as_deref(), Some("one\ntwo"));
        assert_eq!(paste_text([("image/png", "...")]), None);
    }

    #[test]
    fn newlines_are_normalized() {
        assert_eq!(normalize_newlines("\n\na\r\nb\rc\n"), "a\nb\nc");
        assert_eq!(normalize_newlines(" x "), " x ");
    }

    #[test]
    fn enter_navigates_and_ctrl_enter_breaks_lines() {
        assert_eq!(query_key_action(&KeyPress::new("Enter")), KeyAction::Navigate(IndexSetter::NEXT));
        assert_eq!(
            query_key_action(&KeyPress::new("Enter").with_shift()),
            KeyAction::Navigate(IndexSetter::PREVIOUS)
        );
        assert_eq!(query_key_action(&KeyPress::new("Enter").with_ctrl()), KeyAction::InsertNewline);
        assert_eq!(query_key_action(&KeyPress::new("e")), KeyAction::Type);
        assert_eq!(query_key_action(&KeyPress::new("e").with_ctrl()), KeyAction::Pass);
    }
}
