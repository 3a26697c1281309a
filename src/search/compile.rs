//! Search-term compilation: query text plus toggles into a validated pattern.

use std::fmt;

use fancy_regex::{Regex, RegexBuilder};

use crate::search::flags::{combine_flags, Flags, Normalization, VALID_FLAG_LETTERS};
use crate::search::syntax::{translate, MatchMode};

/// Backtracking steps allowed per match attempt before the engine gives up.
pub const DEFAULT_BACKTRACK_LIMIT: usize = 1_000_000;

const UNICODE_WORD: &str = r"[\p{L}\p{M}\p{N}]";

/// A pattern the engine rejected. The message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid regular expression: /{pattern}/{flags}: {message}")]
pub struct PatternSyntaxError {
    pub pattern: String,
    pub flags: String,
    pub message: String,
}

/// A compiled pattern together with the dialect source and flag letters it
/// was built from. The source/flags pair is what travels to the match worker.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str, flags: &str) -> Result<Self, PatternSyntaxError> {
        Self::with_backtrack_limit(source, flags, DEFAULT_BACKTRACK_LIMIT)
    }

    pub fn with_backtrack_limit(
        source: &str,
        flags: &str,
        backtrack_limit: usize,
    ) -> Result<Self, PatternSyntaxError> {
        let regex = build_regex(source, flags, backtrack_limit).map_err(|message| PatternSyntaxError {
            pattern: source.to_string(),
            flags: flags.to_string(),
            message,
        })?;
        Ok(Self { source: source.to_string(), flags: flags.to_string(), regex })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn has_flag(&self, letter: char) -> bool {
        self.flags.contains(letter)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// Translate `source` for the mode its flags select and build the engine
/// regex. `i`, `m` and `s` become inline flags.
pub fn build_regex(source: &str, flags: &str, backtrack_limit: usize) -> Result<Regex, String> {
    let translated = translate(source, MatchMode::from_flags(flags))?;
    let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
    let full = if inline.is_empty() {
        translated
    } else {
        format!("(?{inline}){translated}")
    };
    RegexBuilder::new(&full)
        .backtrack_limit(backtrack_limit)
        .build()
        .map_err(|e| e.to_string())
}

/// Result of compiling a search term.
#[derive(Debug, Clone, PartialEq)]
pub enum RegexConfig {
    /// Built from the term and the toggles.
    SourceOnly {
        pattern: Pattern,
        use_regex: bool,
        empty: bool,
        normalizations: Vec<Normalization>,
    },
    /// The term was a `/source/flags` literal.
    Full {
        pattern: Pattern,
        empty: bool,
        normalizations: Vec<Normalization>,
    },
    Error {
        error: PatternSyntaxError,
        normalizations: Vec<Normalization>,
    },
}

/// How the query box should present a compiled term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPresentation {
    /// Render as code rather than prose.
    pub is_regex: bool,
    /// Tooltip: the effective pattern literal.
    pub title: String,
    /// Flag toggles have no effect on full literals.
    pub flags_hidden: bool,
}

impl RegexConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            RegexConfig::SourceOnly { .. } => "sourceOnly",
            RegexConfig::Full { .. } => "full",
            RegexConfig::Error { .. } => "error",
        }
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        match self {
            RegexConfig::SourceOnly { pattern, .. } | RegexConfig::Full { pattern, .. } => Some(pattern),
            RegexConfig::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PatternSyntaxError> {
        match self {
            RegexConfig::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RegexConfig::SourceOnly { empty, .. } | RegexConfig::Full { empty, .. } => *empty,
            RegexConfig::Error { .. } => false,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, RegexConfig::Full { .. })
    }

    pub fn normalizations(&self) -> &[Normalization] {
        match self {
            RegexConfig::SourceOnly { normalizations, .. }
            | RegexConfig::Full { normalizations, .. }
            | RegexConfig::Error { normalizations, .. } => normalizations,
        }
    }

    pub fn is_regex(&self) -> bool {
        match self {
            RegexConfig::SourceOnly { use_regex, .. } => *use_regex,
            RegexConfig::Full { .. } | RegexConfig::Error { .. } => true,
        }
    }

    pub fn presentation(&self) -> QueryPresentation {
        let is_regex = self.is_regex();
        QueryPresentation {
            is_regex,
            title: match self.pattern() {
                Some(p) if is_regex => p.to_string(),
                _ => String::new(),
            },
            flags_hidden: self.is_full(),
        }
    }
}

/// Split `/source/flags` into its parts.
pub fn parse_literal(term: &str) -> Option<(&str, &str)> {
    let rest = term.trim().strip_prefix('/')?;
    let slash = rest.rfind('/')?;
    let (source, flags) = (&rest[..slash], &rest[slash + 1..]);
    let valid = !source.is_empty() && flags.chars().all(|c| VALID_FLAG_LETTERS.contains(c));
    valid.then_some((source, flags))
}

fn wrap_whole_word(source: &str, mode: MatchMode) -> String {
    if mode.is_unicode() {
        let w = UNICODE_WORD;
        format!(
            r"(?:(?<!{w})(?={w})|(?<!\S)(?=\S))(?:{source})(?:(?<={w})(?!{w})|(?<=\S)(?!\S))"
        )
    } else {
        format!(r"(?:(?<!\w)(?=\w))(?:{source})(?:(?<=\w)(?!\w))")
    }
}

/// Compile `term` under `flags`. Total: malformed input yields
/// [`RegexConfig::Error`].
pub fn compile(term: &str, flags: Flags) -> RegexConfig {
    match parse_literal(term) {
        Some((source, letters)) => compile_full(source, letters),
        None => compile_source_only(term, flags),
    }
}

fn compile_full(source: &str, letters: &str) -> RegexConfig {
    let normalizations = Vec::new();
    if letters.contains('u') && letters.contains('v') {
        let error = PatternSyntaxError {
            pattern: source.to_string(),
            flags: letters.to_string(),
            message: "Invalid flags".into(),
        };
        return RegexConfig::Error { error, normalizations };
    }
    match Pattern::new(source, &combine_flags([letters, "g"])) {
        Ok(pattern) => RegexConfig::Full { pattern, empty: source == "(?:)", normalizations },
        Err(error) => RegexConfig::Error { error, normalizations },
    }
}

fn compile_source_only(term: &str, flags: Flags) -> RegexConfig {
    let normalizations = if flags.normalize_diacritics {
        vec![Normalization::Diacritics]
    } else {
        Vec::new()
    };
    let user = if flags.use_regex {
        term.to_string()
    } else {
        regex_syntax::escape(term)
    };
    let modes: &[MatchMode] = if flags.use_regex {
        &MatchMode::LADDER
    } else {
        &[MatchMode::UnicodeSets]
    };

    let mut first_error = None;
    for &mode in modes {
        // Validate the bare term first so error positions refer to what the
        // user typed.
        let attempt = Pattern::new(&user, mode.letter()).and_then(|_| {
            let source = if flags.whole_word {
                wrap_whole_word(&user, mode)
            } else {
                user.clone()
            };
            let case = if flags.match_case { "" } else { "i" };
            Pattern::new(&source, &combine_flags(["gm", case, mode.letter()]))
        });
        match attempt {
            Ok(pattern) => {
                log::debug!("compiled {} in mode {:?}", pattern, mode);
                return RegexConfig::SourceOnly {
                    pattern,
                    use_regex: flags.use_regex,
                    empty: term.is_empty(),
                    normalizations,
                };
            }
            Err(e) => {
                log::debug!("mode {:?} rejected {:?}: {}", mode, term, e.message);
                first_error.get_or_insert(e);
            }
        }
    }

    let error = first_error.unwrap_or_else(|| PatternSyntaxError {
        pattern: user,
        flags: String::new(),
        message: "No matching mode".into(),
    });
    RegexConfig::Error { error, normalizations }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(config: &RegexConfig, text: &str) -> usize {
        config.pattern().unwrap().regex().find_iter(text).filter(|m| m.is_ok()).count()
    }

    fn flags(use_regex: bool, match_case: bool, whole_word: bool) -> Flags {
        Flags { use_regex, match_case, whole_word, normalize_diacritics: false }
    }

    #[test]
    fn whole_word_boundaries() {
        let on = compile("function", flags(false, false, true));
        let off = compile("function", flags(false, false, false));
        assert_eq!(count(&on, "functionality"), 0);
        assert_eq!(count(&off, "functionality"), 1);
        let m = off.pattern().unwrap().regex().find("functionality").unwrap().unwrap();
        assert_eq!(m.end() - m.start(), 8);

        assert_eq!(count(&on, "a function, (function)"), 2);
        let paren = compile("(x)", flags(false, false, true));
        assert_eq!(count(&paren, "a (x) b"), 1);
        assert_eq!(count(&paren, "a(x)b"), 0);
    }

    #[test]
    fn whole_word_in_legacy_mode() {
        // A bare `\p` is rejected by the strict modes.
        let config = compile(r"a\p", flags(true, false, true));
        assert_eq!(config.pattern().unwrap().flags(), "gim");
        assert_eq!(count(&config, "ap"), 1);
        assert_eq!(count(&config, "apx"), 0);
    }

    #[test]
    fn match_case() {
        let text = "Sensitive SENSITIVE sensitive";
        assert_eq!(count(&compile("Sensitive", flags(false, true, false)), text), 1);
        assert_eq!(count(&compile("Sensitive", flags(false, false, false)), text), 3);
    }

    #[test]
    fn regex_toggle() {
        let literal = compile("foo.bar", flags(false, false, false));
        let regex = compile("foo.bar", flags(true, false, false));
        assert_eq!(count(&literal, "foo.bar"), 1);
        assert_eq!(count(&literal, "foo bar"), 0);
        assert_eq!(count(&regex, "foo.bar"), 1);
        assert_eq!(count(&regex, "foo bar"), 1);
        assert!(!literal.is_regex());
        assert!(regex.is_regex());
    }

    #[test]
    fn full_literal_ignores_toggles() {
        let config = compile("/abc/ui", flags(false, true, true));
        assert_eq!(config.kind(), "full");
        let pattern = config.pattern().unwrap();
        assert_eq!(pattern.source(), "abc");
        assert_eq!(pattern.flags(), "giu");
        assert_eq!(count(&config, "abc ABC abcd"), 3);
        assert!(config.presentation().flags_hidden);
        assert_eq!(config.presentation().title, "/abc/giu");
    }

    #[test]
    fn literal_detection() {
        assert_eq!(parse_literal("  /a/b/gi "), Some(("a/b", "gi")));
        assert_eq!(parse_literal("/a/x"), None);
        assert_eq!(parse_literal("//g"), None);
        assert_eq!(parse_literal("a/b/"), None);
    }

    #[test]
    fn empty_terms() {
        let config = compile("", Flags::default());
        assert!(config.is_empty());
        assert_eq!(config.kind(), "sourceOnly");
        assert!(compile("/(?:)/", Flags::default()).is_empty());
        assert!(!compile("x", Flags::default()).is_empty());
    }

    #[test]
    fn errors_are_structured() {
        let config = compile("\\", flags(true, false, false));
        let error = config.error().unwrap();
        assert_eq!(error.to_string(), r"Invalid regular expression: /\/v: \ at end of pattern");
        assert!(config.is_regex());

        let both = compile("/a/uv", Flags::default());
        assert_eq!(both.error().unwrap().message, "Invalid flags");

        // Escaped, the same term is fine.
        let literal = compile("\\", Flags::default());
        assert_eq!(count(&literal, r"a\b"), 1);
    }

    #[test]
    fn falls_back_to_lenient_modes() {
        let config = compile("a{", flags(true, false, false));
        assert_eq!(config.pattern().unwrap().flags(), "gim");
        assert_eq!(count(&config, "a{"), 1);

        let sets = compile(r"[\p{L}--[a-z]]", flags(true, true, false));
        assert_eq!(sets.kind(), "sourceOnly");
        assert_eq!(sets.pattern().unwrap().flags(), "gmv");
        assert_eq!(count(&sets, "aBc"), 1);
    }

    #[test]
    fn compile_is_total() {
        let terms = ["", "(", ")", "[", "*", "a**", "(?<", r"\k<x>", "/", "//", "/(/", "\u{301}", "[z-a]"];
        for term in terms {
            for bits in 0..16u8 {
                let f = Flags {
                    use_regex: bits & 1 != 0,
                    match_case: bits & 2 != 0,
                    whole_word: bits & 4 != 0,
                    normalize_diacritics: bits & 8 != 0,
                };
                let config = compile(term, f);
                assert!(["sourceOnly", "full", "error"].contains(&config.kind()));
                if !f.use_regex && parse_literal(term).is_none() {
                    assert_eq!(config.kind(), "sourceOnly", "{term:?}");
                }
            }
        }
    }

    #[test]
    fn diacritics_recorded_not_applied() {
        let f = Flags { normalize_diacritics: true, ..Flags::default() };
        let config = compile("_", f);
        assert_eq!(config.normalizations(), &[Normalization::Diacritics]);
        assert_eq!(config.pattern().unwrap().flags(), "gimv");
        assert!(compile("/x/", f).normalizations().is_empty());
    }
}
