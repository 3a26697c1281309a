//! Diacritic folding with an offset map back to the source text.

use unicode_normalization::char::{decompose_canonical, is_combining_mark};
use unicode_segmentation::UnicodeSegmentation;

use crate::search::flags::Normalization;

/// Text after normalization, remembering where every output character came
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    norm_offsets: Vec<usize>,
    orig_offsets: Vec<usize>,
    orig_len: usize,
}

fn is_letter(c: char) -> bool {
    c.is_alphabetic() && !is_combining_mark(c)
}

/// Base character of a letter's canonical decomposition.
fn base_letter(c: char) -> char {
    let mut first = None;
    decompose_canonical(c, |d| {
        first.get_or_insert(d);
    });
    first.unwrap_or(c)
}

/// Fold `text`: a letter followed by combining marks becomes the first
/// character of the letter's canonical decomposition.
pub fn fold_diacritics(text: &str) -> NormalizedText {
    let mut out = NormalizedText {
        text: String::with_capacity(text.len()),
        norm_offsets: Vec::with_capacity(text.len()),
        orig_offsets: Vec::with_capacity(text.len()),
        orig_len: text.len(),
    };

    for (g_start, grapheme) in text.grapheme_indices(true) {
        let mut chars = grapheme.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            out.norm_offsets.push(out.text.len());
            out.orig_offsets.push(g_start + i);
            if is_letter(c) {
                out.text.push(base_letter(c));
                while chars.next_if(|&(_, m)| is_combining_mark(m)).is_some() {}
            } else {
                out.text.push(c);
            }
        }
    }
    out
}

/// Apply `normalizations` in order. `None` when there is nothing to do.
pub fn normalize(text: &str, normalizations: &[Normalization]) -> Option<NormalizedText> {
    normalizations
        .iter()
        .any(|n| *n == Normalization::Diacritics)
        .then(|| fold_diacritics(text))
}

/// Normalize a search term the same way the searched text is.
pub fn normalize_term(term: &str, normalizations: &[Normalization]) -> String {
    normalize(term, normalizations).map_or_else(|| term.to_string(), |n| n.text)
}

impl NormalizedText {
    /// Map a character boundary in the normalized text to the matching
    /// boundary in the source.
    pub fn to_original(&self, offset: usize) -> usize {
        if offset >= self.text.len() {
            return self.orig_len;
        }
        let k = self.norm_offsets.partition_point(|&n| n <= offset).saturating_sub(1);
        self.orig_offsets.get(k).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NFC: &str = "ch\u{1b0}\u{1a1}ng";
    const NFD: &str = "chu\u{31b}o\u{31b}\u{302}ng";

    #[test]
    fn folds_precomposed_and_decomposed_alike() {
        assert_eq!(fold_diacritics(NFC).text, "chuong");
        assert_eq!(fold_diacritics(NFD).text, "chuong");
        assert_eq!(fold_diacritics("Ångström").text, "Angstrom");
    }

    #[test]
    fn leaves_other_characters_alone() {
        assert_eq!(fold_diacritics("a-1 b!").text, "a-1 b!");
        // A mark with no letter in front of it survives.
        assert_eq!(fold_diacritics("\u{301}x").text, "\u{301}x");
    }

    #[test]
    fn maps_offsets_back() {
        let n = fold_diacritics(NFD);
        // "uo" in the folded text spans "u\u{31b}o\u{31b}\u{302}" in the source.
        let start = n.text.find("uo").unwrap();
        let (a, b) = (n.to_original(start), n.to_original(start + 2));
        assert_eq!(&NFD[a..b], "u\u{31b}o\u{31b}\u{302}");
        assert_eq!(n.to_original(n.text.len()), NFD.len());
        assert_eq!(n.to_original(0), 0);
    }

    #[test]
    fn normalize_only_when_asked() {
        assert!(normalize("é", &[]).is_none());
        assert_eq!(normalize_term("é", &[Normalization::Diacritics]), "e");
        assert_eq!(normalize_term("é", &[]), "é");
    }
}
