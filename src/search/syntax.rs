//! Pattern dialect translation.
//!
//! Users write JavaScript-flavoured patterns in one of three matching modes.
//! [`translate`] rewrites a pattern into the syntax `fancy-regex` accepts while
//! keeping the mode's meaning: literal brackets and braces where the legacy
//! grammar allows them, ASCII `\d \w \b`, `\cX` and `\uXXXX` escapes, and the
//! empty and universal classes `[]` / `[^]`.

/// Pattern matching mode, from most to least capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// `v`: class set operations (`&&`, `--`, nested classes) and property escapes.
    UnicodeSets,
    /// `u`: property escapes, strict escapes.
    Unicode,
    /// No mode letter: lenient legacy grammar.
    Legacy,
}

impl MatchMode {
    /// Order in which modes are attempted.
    pub const LADDER: [MatchMode; 3] = [MatchMode::UnicodeSets, MatchMode::Unicode, MatchMode::Legacy];

    pub fn letter(self) -> &'static str {
        match self {
            MatchMode::UnicodeSets => "v",
            MatchMode::Unicode => "u",
            MatchMode::Legacy => "",
        }
    }

    pub fn from_flags(flags: &str) -> Self {
        if flags.contains('v') {
            MatchMode::UnicodeSets
        } else if flags.contains('u') {
            MatchMode::Unicode
        } else {
            MatchMode::Legacy
        }
    }

    pub fn is_unicode(self) -> bool {
        self != MatchMode::Legacy
    }
}

const WORD_CLASS: &str = "[0-9A-Za-z_]";
const NOT_WORD_CLASS: &str = "[^0-9A-Za-z_]";
const WORD_IN_CLASS: &str = "0-9A-Za-z_";
const NOT_WORD_IN_CLASS: &str = r"\x00-/:-@\[-\^\x60\{-\x{10FFFF}";
const NOT_DIGIT_IN_CLASS: &str = r"\x00-/:-\x{10FFFF}";
const WORD_BOUNDARY: &str =
    r"(?:(?<=[0-9A-Za-z_])(?![0-9A-Za-z_])|(?<![0-9A-Za-z_])(?=[0-9A-Za-z_]))";
const NOT_WORD_BOUNDARY: &str =
    r"(?:(?<=[0-9A-Za-z_])(?=[0-9A-Za-z_])|(?<![0-9A-Za-z_])(?![0-9A-Za-z_]))";
const NOTHING: &str = r"[^\s\S]";
const ANYTHING: &str = r"[\s\S]";

/// Rewrite `source` for the engine. Errors carry a short message in the
/// style of the pattern grammar (`"Invalid escape"`, …).
pub fn translate(source: &str, mode: MatchMode) -> Result<String, String> {
    let mut t = Translator {
        chars: source.chars().collect(),
        i: 0,
        out: String::with_capacity(source.len() + 8),
        mode,
        class_depth: 0,
        has_named_groups: has_named_groups(source),
    };
    t.run()?;
    Ok(t.out)
}

fn has_named_groups(source: &str) -> bool {
    source
        .match_indices("(?<")
        .any(|(i, _)| !matches!(source[i + 3..].chars().next(), Some('=' | '!') | None))
}

struct Translator {
    chars: Vec<char>,
    i: usize,
    out: String,
    mode: MatchMode,
    class_depth: usize,
    has_named_groups: bool,
}

impl Translator {
    fn peek(&self, k: usize) -> Option<char> {
        self.chars.get(self.i + k).copied()
    }

    fn run(&mut self) -> Result<(), String> {
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => self.escape()?,
                '[' => self.open_class(),
                ']' => self.close_bracket()?,
                '{' | '}' if self.class_depth == 0 => self.brace(c)?,
                '&' | '-' | '~'
                    if self.class_depth > 0
                        && self.mode != MatchMode::UnicodeSets
                        && self.peek(1) == Some(c) =>
                {
                    // Set operators in the engine's grammar, literal here.
                    self.out.push('\\');
                    self.out.push(c);
                    self.out.push('\\');
                    self.out.push(c);
                    self.i += 2;
                }
                _ => {
                    self.out.push(c);
                    self.i += 1;
                }
            }
        }
        Ok(())
    }

    fn open_class(&mut self) {
        if self.class_depth > 0 && self.mode != MatchMode::UnicodeSets {
            self.out.push_str(r"\[");
            self.i += 1;
            return;
        }
        if self.peek(1) == Some(']') {
            self.out.push_str(NOTHING);
            self.i += 2;
            return;
        }
        if self.peek(1) == Some('^') && self.peek(2) == Some(']') {
            self.out.push_str(ANYTHING);
            self.i += 3;
            return;
        }
        self.out.push('[');
        self.i += 1;
        self.class_depth += 1;
        if self.peek(0) == Some('^') {
            self.out.push('^');
            self.i += 1;
        }
    }

    fn close_bracket(&mut self) -> Result<(), String> {
        self.i += 1;
        if self.class_depth > 0 {
            self.class_depth -= 1;
            self.out.push(']');
            return Ok(());
        }
        if self.mode.is_unicode() {
            return Err("Lone quantifier brackets".into());
        }
        self.out.push_str(r"\]");
        Ok(())
    }

    /// Length of a `{n}`, `{n,}` or `{n,m}` quantifier starting here.
    fn quantifier_len(&self) -> Option<usize> {
        let mut k = 1;
        let digits = |k: &mut usize| {
            let start = *k;
            while self.peek(*k).is_some_and(|c| c.is_ascii_digit()) {
                *k += 1;
            }
            *k > start
        };
        if !digits(&mut k) {
            return None;
        }
        if self.peek(k) == Some(',') {
            k += 1;
            digits(&mut k);
        }
        (self.peek(k) == Some('}')).then_some(k + 1)
    }

    fn brace(&mut self, c: char) -> Result<(), String> {
        if c == '{' {
            if let Some(len) = self.quantifier_len() {
                self.out.extend(&self.chars[self.i..self.i + len]);
                self.i += len;
                return Ok(());
            }
        }
        if self.mode.is_unicode() {
            return Err(if c == '{' { "Incomplete quantifier" } else { "Lone quantifier brackets" }.into());
        }
        self.out.push('\\');
        self.out.push(c);
        self.i += 1;
        Ok(())
    }

    /// An escape the strict grammar does not know: a literal character in
    /// legacy mode, an error otherwise.
    fn identity(&mut self, c: char) -> Result<(), String> {
        if self.mode.is_unicode() {
            return Err("Invalid escape".into());
        }
        self.push_literal(c);
        Ok(())
    }

    fn push_literal(&mut self, c: char) {
        if c.is_ascii_alphanumeric() || !c.is_ascii() || c == '<' || c == '>' || c.is_ascii_whitespace() {
            self.out.push(c);
        } else {
            self.out.push('\\');
            self.out.push(c);
        }
    }

    fn push_code_point(&mut self, cp: u32) {
        self.out.push_str(&format!(r"\x{{{cp:X}}}"));
    }

    fn hex_digits(&self, from: usize, n: usize) -> Option<u32> {
        let s: String = (0..n).map(|k| self.peek(from + k)).collect::<Option<String>>()?;
        if s.chars().all(|c| c.is_ascii_hexdigit()) {
            u32::from_str_radix(&s, 16).ok()
        } else {
            None
        }
    }

    fn escape(&mut self) -> Result<(), String> {
        let Some(n) = self.peek(1) else {
            return Err(r"\ at end of pattern".into());
        };
        let in_class = self.class_depth > 0;
        self.i += 2;

        match n {
            'd' => self.out.push_str(if in_class { "0-9" } else { "[0-9]" }),
            'D' => self.out.push_str(if in_class { NOT_DIGIT_IN_CLASS } else { "[^0-9]" }),
            'w' => self.out.push_str(if in_class { WORD_IN_CLASS } else { WORD_CLASS }),
            'W' => self.out.push_str(if in_class { NOT_WORD_IN_CLASS } else { NOT_WORD_CLASS }),
            's' | 'S' | 'n' | 'r' | 't' | 'f' | 'v' => {
                self.out.push('\\');
                self.out.push(n);
            }
            'b' if in_class => self.push_code_point(0x08),
            'b' => self.out.push_str(WORD_BOUNDARY),
            'B' if in_class => self.identity('B')?,
            'B' => self.out.push_str(NOT_WORD_BOUNDARY),
            '0' if !self.peek(0).is_some_and(|c| c.is_ascii_digit()) => self.push_code_point(0),
            '1'..='9' if !in_class => {
                self.out.push('\\');
                self.out.push(n);
                while let Some(d) = self.peek(0).filter(|c| c.is_ascii_digit()) {
                    self.out.push(d);
                    self.i += 1;
                }
            }
            'c' => match self.peek(0).filter(|c| c.is_ascii_alphabetic()) {
                Some(letter) => {
                    self.i += 1;
                    self.push_code_point(letter as u32 % 32);
                }
                None if self.mode.is_unicode() => return Err("Invalid unicode escape".into()),
                None => self.out.push_str(r"\\c"),
            },
            'x' => match self.hex_digits(0, 2) {
                Some(cp) => {
                    self.i += 2;
                    self.push_code_point(cp);
                }
                None => self.identity('x')?,
            },
            'u' => self.unicode_escape()?,
            'p' | 'P' if self.mode.is_unicode() => {
                self.out.push('\\');
                self.out.push(n);
                if self.peek(0) == Some('{') {
                    while let Some(c) = self.peek(0) {
                        self.out.push(c);
                        self.i += 1;
                        if c == '}' {
                            break;
                        }
                    }
                }
            }
            'k' if self.mode.is_unicode() || self.has_named_groups => self.out.push_str(r"\k"),
            c if c.is_ascii_alphanumeric() => self.identity(c)?,
            c if c.is_ascii() => self.push_literal(c),
            c => self.identity(c)?,
        }
        Ok(())
    }

    fn unicode_escape(&mut self) -> Result<(), String> {
        if self.mode.is_unicode() && self.peek(0) == Some('{') {
            let mut k = 1;
            while self.peek(k).is_some_and(|c| c.is_ascii_hexdigit()) {
                k += 1;
            }
            let cp = (k > 1 && self.peek(k) == Some('}'))
                .then(|| self.hex_digits(1, k - 1))
                .flatten()
                .filter(|&cp| cp <= 0x10FFFF);
            return match cp {
                Some(cp) => {
                    self.i += k + 1;
                    self.push_surrogate_aware(cp);
                    Ok(())
                }
                None => Err("Invalid Unicode escape".into()),
            };
        }

        let Some(cp) = self.hex_digits(0, 4) else {
            if self.mode.is_unicode() {
                return Err("Invalid Unicode escape".into());
            }
            self.out.push('u');
            return Ok(());
        };
        self.i += 4;
        if (0xD800..0xDC00).contains(&cp) && self.peek(0) == Some('\\') && self.peek(1) == Some('u') {
            if let Some(low) = self.hex_digits(2, 4).filter(|l| (0xDC00..0xE000).contains(l)) {
                self.i += 6;
                self.push_code_point(0x10000 + ((cp - 0xD800) << 10) + (low - 0xDC00));
                return Ok(());
            }
        }
        self.push_surrogate_aware(cp);
        Ok(())
    }

    /// Lone surrogates never occur in UTF-8 text, so they match nothing.
    fn push_surrogate_aware(&mut self, cp: u32) {
        if char::from_u32(cp).is_some() {
            self.push_code_point(cp);
        } else {
            self.out.push_str(NOTHING);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tr(s: &str, mode: MatchMode) -> String {
        translate(s, mode).unwrap()
    }

    #[test]
    fn plain_patterns_pass_through() {
        for mode in MatchMode::LADDER {
            assert_eq!(tr("foo.bar", mode), "foo.bar");
            assert_eq!(tr("a+(b|c)*?$", mode), "a+(b|c)*?$");
            assert_eq!(tr("x{2,3}", mode), "x{2,3}");
        }
    }

    #[test]
    fn ascii_classes() {
        assert_eq!(tr(r"\d+", MatchMode::UnicodeSets), "[0-9]+");
        assert_eq!(tr(r"[\w-]", MatchMode::Legacy), "[0-9A-Za-z_-]");
        assert_eq!(tr(r"[\b]", MatchMode::Unicode), r"[\x{8}]");
        assert!(tr(r"\bx", MatchMode::Legacy).starts_with("(?:(?<="));
    }

    #[test]
    fn empty_and_universal_classes() {
        assert_eq!(tr("a[]b", MatchMode::Unicode), r"a[^\s\S]b");
        assert_eq!(tr("[^]", MatchMode::Legacy), r"[\s\S]");
    }

    #[test]
    fn class_brackets_and_set_operators() {
        assert_eq!(tr("[a[]", MatchMode::Unicode), r"[a\[]");
        assert_eq!(tr("[a&&b]", MatchMode::Legacy), r"[a\&\&b]");
        assert_eq!(tr("[[a-z]&&[^aeiou]]", MatchMode::UnicodeSets), "[[a-z]&&[^aeiou]]");
    }

    #[test]
    fn legacy_is_lenient() {
        assert_eq!(tr("a{", MatchMode::Legacy), r"a\{");
        assert_eq!(tr("a}", MatchMode::Legacy), r"a\}");
        assert_eq!(tr("]", MatchMode::Legacy), r"\]");
        assert_eq!(tr(r"\p{L}", MatchMode::Legacy), "p{L}".replace('{', r"\{").replace('}', r"\}"));
        assert_eq!(tr(r"\q", MatchMode::Legacy), "q");
        assert_eq!(tr(r"\xZZ", MatchMode::Legacy), "xZZ");
        assert_eq!(tr(r"\u12", MatchMode::Legacy), "u12");
    }

    #[test]
    fn unicode_modes_are_strict() {
        for mode in [MatchMode::UnicodeSets, MatchMode::Unicode] {
            assert_eq!(translate("a{", mode), Err("Incomplete quantifier".to_string()));
            assert_eq!(translate("]", mode), Err("Lone quantifier brackets".to_string()));
            assert_eq!(translate(r"\q", mode), Err("Invalid escape".to_string()));
            assert_eq!(translate("a\\", mode), Err(r"\ at end of pattern".to_string()));
            assert_eq!(tr(r"\p{L}", mode), r"\p{L}");
        }
    }

    #[test]
    fn code_point_escapes() {
        assert_eq!(tr(r"\cJ", MatchMode::Legacy), r"\x{A}");
        assert_eq!(tr(r"\x41", MatchMode::Unicode), r"\x{41}");
        assert_eq!(tr(r"\u0041", MatchMode::Legacy), r"\x{41}");
        assert_eq!(tr(r"\u{1F600}", MatchMode::Unicode), r"\x{1F600}");
        assert_eq!(tr(r"\uD83D\uDE00", MatchMode::Unicode), r"\x{1F600}");
        assert_eq!(tr(r"\uD83D", MatchMode::Unicode), NOTHING);
        assert_eq!(tr(r"\0", MatchMode::Unicode), r"\x{0}");
    }

    #[test]
    fn named_backreferences() {
        assert_eq!(tr(r"(?<x>a)\k<x>", MatchMode::Legacy), r"(?<x>a)\k<x>");
        assert_eq!(tr(r"\k<x>", MatchMode::Legacy), "k<x>");
        assert_eq!(tr(r"(a)\1", MatchMode::UnicodeSets), r"(a)\1");
    }
}
