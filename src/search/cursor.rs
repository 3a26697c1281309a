//! Restartable match iteration with a page buffer.
//!
//! A [`MatchCursor`] holds the state of one lazy scan: the compiled pattern,
//! the haystack, the scan position and every match produced so far. Asking
//! for a page of the same query continues the scan; any change of pattern,
//! flags, normalizations or text starts over.

use std::collections::BTreeMap;
use std::sync::Arc;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

use crate::search::compile::{Pattern, PatternSyntaxError, DEFAULT_BACKTRACK_LIMIT};
use crate::search::flags::Normalization;
use crate::search::normalize::{normalize, normalize_term, NormalizedText};

// ─── Results ────────────────────────────────────────────────────────────────

/// One match, offsets and strings in terms of the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub index: usize,
    /// Whole match followed by every capture group.
    pub arr: Vec<Option<String>>,
    pub groups: Option<BTreeMap<String, Option<String>>>,
    /// Group spans, with the `d` flag only.
    pub indices: Option<Vec<Option<[usize; 2]>>>,
}

impl MatchResult {
    /// Byte length of the whole match.
    pub fn len(&self) -> usize {
        self.arr.first().and_then(|m| m.as_ref()).map_or(0, String::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn end(&self) -> usize {
        self.index + self.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] PatternSyntaxError),
    #[error("match execution failed: {0}")]
    Runtime(String),
}

/// Outcome of [`MatchCursor::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The buffer holds the requested count, or the scan is exhausted.
    Filled,
    /// The stop callback fired first.
    Interrupted,
}

// ─── Cursor ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct CursorKey {
    source: String,
    flags: String,
    normalizations: Vec<Normalization>,
}

#[derive(Debug)]
struct Scan {
    regex: Regex,
    global: bool,
    sticky: bool,
    with_indices: bool,
    group_names: Vec<Option<String>>,
    normalized: Option<NormalizedText>,
    pos: usize,
    exhausted: bool,
}

#[derive(Debug)]
pub struct MatchCursor {
    key: Option<CursorKey>,
    text: Arc<str>,
    scan: Option<Scan>,
    matches: Vec<MatchResult>,
    backtrack_limit: usize,
}

impl Default for MatchCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchCursor {
    pub fn new() -> Self {
        Self::with_backtrack_limit(DEFAULT_BACKTRACK_LIMIT)
    }

    pub fn with_backtrack_limit(backtrack_limit: usize) -> Self {
        Self {
            key: None,
            text: Arc::from(""),
            scan: None,
            matches: Vec::new(),
            backtrack_limit,
        }
    }

    /// Point the cursor at a query. Keeps progress when nothing changed.
    pub fn prepare(
        &mut self,
        source: &str,
        flags: &str,
        text: &Arc<str>,
        normalizations: &[Normalization],
    ) -> Result<(), EngineError> {
        let key = CursorKey {
            source: source.to_string(),
            flags: flags.to_string(),
            normalizations: normalizations.to_vec(),
        };
        let same_text = Arc::ptr_eq(&self.text, text) || *self.text == **text;
        if self.key.as_ref() == Some(&key) && same_text && self.scan.is_some() {
            return Ok(());
        }

        self.reset();
        let pattern = Pattern::with_backtrack_limit(
            &normalize_term(source, normalizations),
            flags,
            self.backtrack_limit,
        )?;
        let group_names = pattern
            .regex()
            .capture_names()
            .map(|name| name.map(str::to_string))
            .collect();
        self.scan = Some(Scan {
            global: pattern.has_flag('g'),
            sticky: pattern.has_flag('y'),
            with_indices: pattern.has_flag('d'),
            regex: pattern.regex().clone(),
            group_names,
            normalized: normalize(text, normalizations),
            pos: 0,
            exhausted: false,
        });
        self.text = Arc::clone(text);
        self.key = Some(key);
        log::debug!("match cursor restarted for /{}/{}", source, flags);
        Ok(())
    }

    /// Drop all progress; the next [`prepare`](Self::prepare) starts afresh.
    pub fn reset(&mut self) {
        self.key = None;
        self.scan = None;
        self.matches.clear();
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.scan.as_ref().map_or(true, |s| s.exhausted)
    }

    /// Scan until `end` matches are buffered or the text is exhausted.
    /// `should_stop` is polled before each match.
    pub fn fill(&mut self, end: usize, mut should_stop: impl FnMut() -> bool) -> Result<Fill, EngineError> {
        while self.matches.len() < end {
            if should_stop() {
                return Ok(Fill::Interrupted);
            }
            match self.next_match()? {
                Some(m) => self.matches.push(m),
                None => break,
            }
        }
        Ok(Fill::Filled)
    }

    /// Buffered matches `start..start + num`, clamped.
    pub fn page(&self, start: usize, num: usize) -> &[MatchResult] {
        let len = self.matches.len();
        &self.matches[start.min(len)..start.saturating_add(num).min(len)]
    }

    /// Prepare, fill and slice in one go.
    pub fn get_page(
        &mut self,
        source: &str,
        flags: &str,
        text: &Arc<str>,
        normalizations: &[Normalization],
        start: usize,
        num: usize,
    ) -> Result<Vec<MatchResult>, EngineError> {
        self.prepare(source, flags, text, normalizations)?;
        self.fill(start.saturating_add(num), || false)?;
        Ok(self.page(start, num).to_vec())
    }

    // ─── Scanning ───────────────────────────────────────────────────────────

    fn next_match(&mut self) -> Result<Option<MatchResult>, EngineError> {
        let text = Arc::clone(&self.text);
        let Some(scan) = self.scan.as_mut() else {
            return Ok(None);
        };
        if scan.exhausted {
            return Ok(None);
        }
        let haystack: &str = scan.normalized.as_ref().map_or(&*text, |n| n.text.as_str());
        if scan.pos > haystack.len() {
            scan.exhausted = true;
            return Ok(None);
        }

        let spans: Vec<Option<(usize, usize)>> = {
            let caps = scan
                .regex
                .captures_from_pos(haystack, scan.pos)
                .map_err(|e| EngineError::Runtime(e.to_string()))?;
            match caps {
                Some(caps) => (0..caps.len())
                    .map(|i| caps.get(i).map(|m| (m.start(), m.end())))
                    .collect(),
                None => Vec::new(),
            }
        };
        let Some(&Some((start, end))) = spans.first() else {
            scan.exhausted = true;
            return Ok(None);
        };
        if scan.sticky && start != scan.pos {
            scan.exhausted = true;
            return Ok(None);
        }

        scan.pos = if start == end {
            end + haystack[end..].chars().next().map_or(1, char::len_utf8)
        } else {
            end
        };
        if !scan.global {
            scan.exhausted = true;
        }

        let to_original = |offset: usize| match &scan.normalized {
            Some(n) => n.to_original(offset),
            None => offset,
        };
        let original: Vec<Option<[usize; 2]>> = spans
            .iter()
            .map(|span| span.map(|(s, e)| [to_original(s), to_original(e)]))
            .collect();
        let arr: Vec<Option<String>> = original
            .iter()
            .map(|span| span.and_then(|[s, e]| text.get(s..e)).map(str::to_string))
            .collect();
        let groups = scan.group_names.iter().any(Option::is_some).then(|| {
            scan.group_names
                .iter()
                .zip(&arr)
                .filter_map(|(name, value)| name.as_ref().map(|n| (n.clone(), value.clone())))
                .collect()
        });

        Ok(Some(MatchResult {
            index: to_original(start),
            arr,
            groups,
            indices: scan.with_indices.then_some(original),
        }))
    }
}
