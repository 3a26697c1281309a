use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Search toggles chosen by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flags {
    pub use_regex: bool,
    pub match_case: bool,
    pub whole_word: bool,
    pub normalize_diacritics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlagName {
    MatchCase,
    WholeWord,
    UseRegex,
    NormalizeDiacritics,
}

impl FlagName {
    pub const ALL: [FlagName; 4] = [
        FlagName::MatchCase,
        FlagName::WholeWord,
        FlagName::UseRegex,
        FlagName::NormalizeDiacritics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FlagName::MatchCase => "matchCase",
            FlagName::WholeWord => "wholeWord",
            FlagName::UseRegex => "useRegex",
            FlagName::NormalizeDiacritics => "normalizeDiacritics",
        }
    }
}

impl fmt::Display for FlagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Flags {
    pub fn get(&self, name: FlagName) -> bool {
        match name {
            FlagName::MatchCase => self.match_case,
            FlagName::WholeWord => self.whole_word,
            FlagName::UseRegex => self.use_regex,
            FlagName::NormalizeDiacritics => self.normalize_diacritics,
        }
    }

    pub fn set(&mut self, name: FlagName, value: bool) {
        let slot = match name {
            FlagName::MatchCase => &mut self.match_case,
            FlagName::WholeWord => &mut self.whole_word,
            FlagName::UseRegex => &mut self.use_regex,
            FlagName::NormalizeDiacritics => &mut self.normalize_diacritics,
        };
        *slot = value;
    }

    pub fn toggle(&mut self, name: FlagName) {
        self.set(name, !self.get(name));
    }
}

/// Text normalizations applied at match time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    Diacritics,
}

/// Pattern flag letters accepted in `/source/flags` literals.
pub const VALID_FLAG_LETTERS: &str = "dgimsuvy";

/// Merge flag strings into one: unique letters, sorted.
pub fn combine_flags<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(str::chars)
        .collect::<BTreeSet<char>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_sorts_and_dedupes() {
        assert_eq!(combine_flags(["ui", "g", "gu"]), "giu");
        assert_eq!(combine_flags(["", "gvm", "i"]), "gimv");
        assert_eq!(combine_flags(std::iter::empty::<&str>()), "");
    }

    #[test]
    fn toggle_and_serde_names() {
        let mut flags = Flags::default();
        flags.toggle(FlagName::WholeWord);
        assert!(flags.whole_word);
        flags.toggle(FlagName::WholeWord);
        assert!(!flags.whole_word);

        let json = serde_json::to_string(&Flags { use_regex: true, ..Flags::default() }).unwrap();
        assert!(json.contains("\"useRegex\":true"));
        assert_eq!(serde_json::to_string(&Normalization::Diacritics).unwrap(), "\"diacritics\"");
        assert_eq!(FlagName::NormalizeDiacritics.to_string(), "normalizeDiacritics");
    }
}
