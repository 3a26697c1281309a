//! Search lifecycle for `FindApp`.
//!
//! Covers compiling the query, starting a worker scan against a snapshot,
//! turning result pages into ranges, and the ways a search ends: results,
//! errors, mismatch recovery, timeout and cancellation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::dom::Document;

use crate::search::compile::parse_literal;
use crate::search::cursor::Fill;
use crate::search::{
    compile, highlight_query, ClientEvent, MatchCursor, MatchQuery, MatchResult, Normalization, RegexConfig,
    WorkerMessage,
};
use crate::text::range::{reconcile, MatchRange, RangeError};
use crate::text::VisibleTextSnapshot;
use crate::view::highlights::HighlightRegistry;
use crate::view::scroll::Viewport;
use crate::view::ViewState;

use super::{read_doc, FindApp, SHOW_SPINNER_DELAY};

const MISMATCH_MESSAGE: &str = "Unable to match text";
const TIMEOUT_MESSAGE: &str = "Timed out";

/// The search whose results may still reach the view.
#[derive(Debug)]
pub(super) struct ActiveSearch {
    request: u64,
    source: String,
    flags: String,
    normalizations: Vec<Normalization>,
    snapshot: Arc<VisibleTextSnapshot>,
    ranges: Vec<MatchRange>,
    started: Instant,
    deadline: Instant,
    show_loading_at: Instant,
    loading_shown: bool,
}

enum PageOutcome {
    More,
    Done(Vec<MatchRange>),
    Mismatch(RangeError),
}

fn reconcile_all(
    doc: &Document,
    snapshot: &VisibleTextSnapshot,
    results: &[MatchResult],
) -> Result<Vec<MatchRange>, RangeError> {
    results
        .par_iter()
        .map(|m| reconcile(doc, snapshot, m.index, m.end()))
        .collect()
}

impl<H: HighlightRegistry, V: Viewport> FindApp<H, V> {
    fn match_cap(&self) -> usize {
        match self.options.max_matches {
            0 => usize::MAX,
            n => n,
        }
    }

    fn budget(&self) -> Duration {
        Duration::from_millis(self.options.max_timeout)
    }

    fn show(&mut self, state: ViewState) {
        let doc = read_doc(&self.doc);
        self.view.update_view(&doc, state);
    }

    pub(super) fn search_deadline(&self) -> Option<Instant> {
        let search = self.search.as_ref()?;
        Some(if search.loading_shown { search.deadline } else { search.show_loading_at.min(search.deadline) })
    }

    /// Recompile the query and start searching for it. Whatever was in
    /// flight is superseded.
    pub(super) fn update_search(&mut self) {
        let started = Instant::now();
        self.run_search_update();
        self.throttle.executed(started, Instant::now());
    }

    fn run_search_update(&mut self) {
        let config = compile(&self.query, self.flags);
        self.presentation = config.presentation();

        let spans = if config.is_regex() && !self.query.is_empty() {
            let full = !matches!(config, RegexConfig::SourceOnly { .. }) && parse_literal(&self.query).is_some();
            highlight_query(&self.query, full)
        } else {
            Vec::new()
        };
        self.view.set_query_highlights(&spans);

        if let Some(error) = config.error() {
            self.cancel_search();
            self.show(ViewState::error(error.to_string()));
            return;
        }
        match config.pattern() {
            Some(pattern) if !config.is_empty() => {
                let (source, flags) = (pattern.source().to_string(), pattern.flags().to_string());
                self.start_search(source, flags, config.normalizations().to_vec());
            }
            _ => {
                self.cancel_search();
                self.show(ViewState::Void);
            }
        }
    }

    fn start_search(&mut self, source: String, flags: String, normalizations: Vec<Normalization>) {
        let snapshot = {
            let doc = read_doc(&self.doc);
            doc.body().map(|root| self.watch.registry().get(&doc, root))
        };
        let Some(snapshot) = snapshot else {
            log::warn!("document lost its root element");
            self.cancel_search();
            return;
        };
        let budget = self.budget();
        let Some(client) = self.client.as_mut() else {
            return;
        };
        let query = MatchQuery {
            source: source.clone(),
            flags: flags.clone(),
            text: Arc::from(snapshot.text.as_str()),
            normalizations: normalizations.clone(),
        };
        let request = client.begin(query, budget);
        let started = Instant::now();
        log::debug!("request {request}: /{source}/{flags} over {} bytes", snapshot.text.len());
        self.search = Some(ActiveSearch {
            request,
            source,
            flags,
            normalizations,
            snapshot,
            ranges: Vec::new(),
            started,
            deadline: started + budget,
            show_loading_at: started + SHOW_SPINNER_DELAY,
            loading_shown: false,
        });
    }

    /// Abandon the active search without touching the view.
    pub(super) fn cancel_search(&mut self) {
        if self.search.take().is_some() {
            if let Some(client) = self.client.as_mut() {
                client.cancel();
            }
        }
    }

    pub(super) fn on_worker_message(&mut self, msg: WorkerMessage) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        let active = self.search.as_ref().map(|s| s.request);
        match client.on_message(msg) {
            ClientEvent::Ignored => {}
            ClientEvent::Page { request_number, .. } | ClientEvent::Failed { request_number, .. }
                if Some(request_number) != active =>
            {
                log::trace!("dropping results of request {request_number}");
            }
            ClientEvent::Failed { message, .. } => {
                log::warn!("match worker failed: {message}");
                self.search = None;
                self.show(ViewState::error(TIMEOUT_MESSAGE));
            }
            ClientEvent::Page { results, .. } => self.on_page(&results),
        }
    }

    fn on_page(&mut self, results: &[MatchResult]) {
        let cap = self.match_cap();
        let outcome = {
            let Some(search) = self.search.as_mut() else {
                return;
            };
            if results.is_empty() {
                PageOutcome::Done(std::mem::take(&mut search.ranges))
            } else {
                let take = results.len().min(cap.saturating_sub(search.ranges.len()));
                let doc = read_doc(&self.doc);
                match reconcile_all(&doc, &search.snapshot, &results[..take]) {
                    Ok(ranges) => {
                        search.ranges.extend(ranges);
                        if search.ranges.len() >= cap {
                            PageOutcome::Done(std::mem::take(&mut search.ranges))
                        } else {
                            PageOutcome::More
                        }
                    }
                    Err(e) => PageOutcome::Mismatch(e),
                }
            }
        };
        match outcome {
            PageOutcome::More => {}
            PageOutcome::Done(ranges) => {
                // The cap may stop the scan before the worker is done.
                self.cancel_search();
                self.show(ViewState::Ok { ranges, current_index: 0 });
            }
            PageOutcome::Mismatch(e) => self.on_mismatch(e),
        }
    }

    /// The document drifted from the snapshot. With enough of the time budget
    /// left, match once more against a fresh snapshot on this thread.
    fn on_mismatch(&mut self, error: RangeError) {
        let Some(search) = self.search.take() else {
            return;
        };
        if let Some(client) = self.client.as_mut() {
            client.cancel();
        }
        let elapsed = search.started.elapsed();
        log::debug!("request {} mismatched after {:?}: {}", search.request, elapsed, error);
        if elapsed >= self.budget() / 2 {
            self.show(ViewState::error(TIMEOUT_MESSAGE));
            return;
        }
        let state = match self.rematch(&search) {
            Ok(ranges) => ViewState::Ok { ranges, current_index: 0 },
            Err(message) => ViewState::error(message),
        };
        self.show(state);
    }

    fn rematch(&self, search: &ActiveSearch) -> Result<Vec<MatchRange>, &'static str> {
        let registry = Arc::clone(self.watch.registry());
        registry.mark_stale();
        let doc = read_doc(&self.doc);
        let root = doc.body().ok_or(MISMATCH_MESSAGE)?;
        let snapshot = registry.get(&doc, root);
        let text: Arc<str> = Arc::from(snapshot.text.as_str());

        let cap = self.match_cap();
        let mut cursor = MatchCursor::new();
        let filled = cursor
            .prepare(&search.source, &search.flags, &text, &search.normalizations)
            .and_then(|()| cursor.fill(cap, || Instant::now() >= search.deadline));
        match filled {
            Ok(Fill::Filled) => {}
            Ok(Fill::Interrupted) => return Err(TIMEOUT_MESSAGE),
            Err(e) => {
                log::warn!("rematch failed: {e}");
                return Err(TIMEOUT_MESSAGE);
            }
        }
        reconcile_all(&doc, &snapshot, cursor.page(0, cap)).map_err(|e| {
            log::debug!("rematch mismatched too: {e}");
            MISMATCH_MESSAGE
        })
    }

    /// Loading display and timeout of the active search.
    pub(super) fn tick_search(&mut self, now: Instant) {
        let Some(search) = self.search.as_mut() else {
            return;
        };
        if now >= search.deadline {
            log::debug!("request {} timed out", search.request);
            self.cancel_search();
            self.show(ViewState::error(TIMEOUT_MESSAGE));
        } else if !search.loading_shown && now >= search.show_loading_at {
            search.loading_shown = true;
            self.show(ViewState::Loading);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::app::commands::CommandEvent;
    use crate::app::options::AppOptions;
    use crate::app::{AppEvent, FindApp};
    use crate::dom::parser::parse_html;
    use crate::text::range::RangeError;
    use crate::view::highlights::{MemoryHighlights, HIGHLIGHT_ALL_ID};
    use crate::view::scroll::LayoutViewport;
    use crate::view::{ViewKind, ViewState};

    type App = FindApp<MemoryHighlights, LayoutViewport>;

    const WAIT: Duration = Duration::from_secs(10);

    fn open_app(html: &str) -> (App, MemoryHighlights) {
        let doc = parse_html(html, "");
        let viewport = LayoutViewport::new(&doc, 800.0, 600.0);
        let highlights = MemoryHighlights::new();
        let mut app = FindApp::new(doc.into_shared(), AppOptions::default(), highlights.clone(), viewport);
        app.handle(AppEvent::Command(CommandEvent::open())).unwrap();
        (app, highlights)
    }

    /// Start a search for `query` without going through the input throttle.
    fn begin(app: &mut App, query: &str) {
        app.query = query.into();
        app.update_search();
        assert!(app.search.is_some());
    }

    fn detached_body(app: &App) -> RangeError {
        let doc = app.document().read().unwrap();
        RangeError::Detached(doc.body().unwrap())
    }

    fn remove_root(app: &App) {
        let mut doc = app.document().write().unwrap();
        let root = doc.document_element().unwrap();
        doc.remove(root).unwrap();
        assert!(doc.body().is_none());
    }

    #[test]
    fn late_mismatch_times_out() {
        let (mut app, _) = open_app("<body><p>late text</p></body>");
        begin(&mut app, "text");
        let search = app.search.as_mut().unwrap();
        search.started = Instant::now().checked_sub(Duration::from_secs(3)).unwrap();

        let error = detached_body(&app);
        app.on_mismatch(error);
        assert!(app.search.is_none());
        assert_eq!(app.view().state(), &ViewState::error("Timed out"));
    }

    #[test]
    fn early_mismatch_recovers_against_the_current_page() {
        let (mut app, _) = open_app("<body><p id='p'>old text</p></body>");
        begin(&mut app, "text");
        {
            let mut doc = app.document().write().unwrap();
            let p = doc.element_by_id("p").unwrap();
            let t = doc.children(p)[0];
            doc.set_text(t, "new text, more text").unwrap();
        }
        let error = detached_body(&app);
        app.on_mismatch(error);

        let doc = app.document().read().unwrap();
        let ViewState::Ok { ranges, .. } = app.view().state() else {
            panic!("expected results, got {:?}", app.view().state());
        };
        let texts: Vec<_> = ranges.iter().map(|r| r.to_text(&doc).unwrap()).collect();
        assert_eq!(texts, ["text", "text"]);
    }

    #[test]
    fn rematch_without_a_page_is_unable_to_match() {
        let (mut app, _) = open_app("<body><p>gone soon</p></body>");
        begin(&mut app, "gone");
        remove_root(&app);

        app.on_mismatch(RangeError::Inverted);
        assert_eq!(app.view().state(), &ViewState::error("Unable to match text"));
    }

    #[test]
    fn rematch_past_the_deadline_times_out() {
        let (mut app, _) = open_app("<body><p>a a a a</p></body>");
        begin(&mut app, "a");
        let search = app.search.as_mut().unwrap();
        // Budget half unspent, but the deadline already passed.
        search.started = Instant::now();
        search.deadline = Instant::now();

        app.on_mismatch(RangeError::Inverted);
        assert_eq!(app.view().state(), &ViewState::error("Timed out"));
    }

    #[test]
    fn missing_page_cancels_the_search_in_flight() {
        let (mut app, _) = open_app("<body><p>first</p></body>");
        begin(&mut app, "first");
        remove_root(&app);

        app.query = "second".into();
        app.update_search();
        assert!(app.search.is_none());
        assert!(!app.is_busy());
    }

    #[test]
    fn fast_results_skip_the_loading_state() {
        let (mut app, _) = open_app("<body><p>quick quick</p></body>");
        begin(&mut app, "quick");
        assert!(app.settle(WAIT).unwrap());
        assert_eq!(app.view().state().kind(), ViewKind::Ok);

        app.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(app.view().state().kind(), ViewKind::Ok);
    }

    #[test]
    fn slow_searches_show_loading_and_keep_highlights() {
        let (mut app, highlights) = open_app("<body><p>alpha beta</p></body>");
        begin(&mut app, "alpha");
        assert!(app.settle(WAIT).unwrap());
        assert!(highlights.get(HIGHLIGHT_ALL_ID).is_some());

        begin(&mut app, "beta");
        let started = app.search.as_ref().unwrap().started;
        app.tick(started + Duration::from_millis(100));
        assert_eq!(app.view().state().kind(), ViewKind::Ok);

        app.tick(started + Duration::from_millis(250));
        assert_eq!(app.view().state(), &ViewState::Loading);
        assert!(highlights.get(HIGHLIGHT_ALL_ID).is_some());
    }
}
