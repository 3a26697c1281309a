//! `FindApp`: the find bar's event loop.
//!
//! This module declares the app state and the loop that drives it. The
//! methods are split across sibling modules:
//!
//! - `matching` for the search lifecycle (compile, worker pages, results)
//! - `toolbar` for the query box, flag toggles, shortcuts and info buttons
//!
//! Everything arrives as an [`AppEvent`] on one channel; the match worker's
//! messages are forwarded into the same channel.

pub mod commands;
pub mod input;
mod matching;
pub mod options;
pub mod throttle;
mod toolbar;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLockReadGuard};
use std::time::{Duration, Instant};

use crate::dom::{Document, SharedDocument};
use crate::search::{Flags, MatchClient, MatchWorker, QueryPresentation, WorkerMessage};
use crate::text::registry::{DomWatch, SnapshotRegistry};
use crate::view::highlights::{color_stylesheet, HighlightRegistry};
use crate::view::scroll::Viewport;
use crate::view::ViewController;

use self::commands::{CommandEvent, CommandTable, Outbound, EXECUTE_ACTION};
use self::input::KeyPress;
use self::matching::ActiveSearch;
use self::options::AppOptions;
use self::throttle::Throttle;

// ─── Timing ─────────────────────────────────────────────────────────────────

/// Results arriving sooner than this never show the loading state.
pub const SHOW_SPINNER_DELAY: Duration = Duration::from_millis(200);
/// How often the document is checked for changes while open.
const WATCH_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_WAIT: Duration = Duration::from_secs(1);

// ─── Events ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum AppEvent {
    Command(CommandEvent),
    OptionsUpdated(AppOptions),
    /// The query text changed.
    Input(String),
    FlagsChanged(Flags),
    /// A key combo pressed anywhere while open.
    Shortkey(String),
    /// A key pressed in the query box.
    QueryKey(KeyPress),
    /// `(mime, data)` pairs pasted or dropped into the query box.
    Paste(Vec<(String, String)>),
    /// An info-panel button's index setter.
    SetIndex(String),
    OpenOptions,
    Close,
    Worker(WorkerMessage),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("document has no root element")]
    NoRoot,
    #[error("failed to start match worker: {0}")]
    Worker(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

// ─── Application state ──────────────────────────────────────────────────────

pub struct FindApp<H, V> {
    doc: SharedDocument,
    options: AppOptions,
    flags: Flags,
    query: String,
    presentation: QueryPresentation,
    stylesheet: String,
    view: ViewController<H, V>,
    watch: DomWatch,
    client: Option<MatchClient>,
    search: Option<ActiveSearch>,
    throttle: Throttle<()>,
    events_tx: Sender<AppEvent>,
    events_rx: Receiver<AppEvent>,
    outbound: Vec<Outbound>,
    initialized: bool,
    is_open: bool,
}

fn read_doc(doc: &SharedDocument) -> RwLockReadGuard<'_, Document> {
    doc.read().unwrap_or_else(|e| e.into_inner())
}

impl<H: HighlightRegistry, V: Viewport> FindApp<H, V> {
    /// `options` is the first options load: it also sets the flag defaults.
    pub fn new(doc: SharedDocument, options: AppOptions, highlights: H, viewport: V) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            doc,
            flags: options.default_flags(),
            stylesheet: color_stylesheet(&options.colors),
            options,
            query: String::new(),
            presentation: QueryPresentation { is_regex: false, title: String::new(), flags_hidden: false },
            view: ViewController::new(highlights, viewport),
            watch: DomWatch::new(Arc::new(SnapshotRegistry::default())),
            client: None,
            search: None,
            throttle: Throttle::new(|previous| previous, true),
            events_tx,
            events_rx,
            outbound: Vec::new(),
            initialized: false,
            is_open: false,
        }
    }

    /// Handle for delivering events from other threads.
    pub fn sender(&self) -> Sender<AppEvent> {
        self.events_tx.clone()
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    pub fn view(&self) -> &ViewController<H, V> {
        &self.view
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn presentation(&self) -> &QueryPresentation {
        &self.presentation
    }

    /// Custom properties carrying the highlight colours.
    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// A search is in flight or an input is waiting on the throttle.
    pub fn is_busy(&self) -> bool {
        self.search.is_some() || self.throttle.next_due().is_some()
    }

    /// Outbound requests since the last call.
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    fn commands() -> CommandTable<Self, AppError> {
        CommandTable::<Self, AppError>::new().register(EXECUTE_ACTION, Self::open_command)
    }

    fn open_command(&mut self, event: &CommandEvent) -> Result<(), AppError> {
        if event.is_test {
            log::debug!("opened by automation");
        }
        self.open()
    }

    // ─── Event loop ─────────────────────────────────────────────────────────

    /// Apply one event.
    pub fn handle(&mut self, event: AppEvent) -> Result<Control, AppError> {
        match event {
            AppEvent::Shutdown => return Ok(Control::Exit),
            AppEvent::Command(command) => {
                if !self.initialized && command.command != EXECUTE_ACTION {
                    log::debug!("ignoring {:?} before initialisation", command.command);
                } else {
                    Self::commands().dispatch(self, &command)?;
                }
            }
            AppEvent::Worker(msg) => self.on_worker_message(msg),
            other if !self.initialized => log::debug!("ignoring {other:?} before initialisation"),
            AppEvent::OptionsUpdated(options) => self.update_options(options),
            AppEvent::Input(query) => self.set_query(query),
            AppEvent::FlagsChanged(flags) => self.set_flags(flags),
            AppEvent::Shortkey(combo) => {
                self.on_shortkey(&combo);
            }
            AppEvent::QueryKey(key) => self.on_query_key(&key),
            AppEvent::Paste(data) => {
                self.on_paste(&data);
            }
            AppEvent::SetIndex(setter) => self.on_set_index(&setter),
            AppEvent::OpenOptions => self.outbound.push(Outbound::OpenOptionsPage),
            AppEvent::Close => self.close(),
        }
        Ok(Control::Continue)
    }

    /// Timers: trailing throttled input, document changes, loading display
    /// and search timeouts.
    pub fn tick(&mut self, now: Instant) {
        if self.throttle.poll(now).is_some() {
            self.update_search();
        }
        if self.is_open {
            let doc = read_doc(&self.doc);
            let size = self.view.viewport().client_size();
            if self.watch.poll(&doc, size) {
                self.view.viewport_mut().document_changed(&doc);
            }
        }
        self.tick_search(now);
    }

    fn next_wakeup(&self, now: Instant) -> Duration {
        let mut wait = if self.is_open { WATCH_INTERVAL } else { IDLE_WAIT };
        let deadlines = [self.throttle.next_due(), self.search_deadline()];
        for due in deadlines.into_iter().flatten() {
            wait = wait.min(due.saturating_duration_since(now));
        }
        wait
    }

    /// Run timers, then wait up to `max_wait` (or the next timer) for one
    /// event and apply it.
    pub fn pump(&mut self, max_wait: Duration) -> Result<Control, AppError> {
        let now = Instant::now();
        self.tick(now);
        let wait = self.next_wakeup(now).min(max_wait);
        match self.events_rx.recv_timeout(wait) {
            Ok(event) => self.handle(event),
            Err(RecvTimeoutError::Timeout) => Ok(Control::Continue),
            Err(RecvTimeoutError::Disconnected) => Ok(Control::Exit),
        }
    }

    /// Pump until nothing is in flight. Returns `false` if `timeout` passed
    /// first.
    pub fn settle(&mut self, timeout: Duration) -> Result<bool, AppError> {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            if self.pump(deadline - now)? == Control::Exit {
                break;
            }
        }
        Ok(true)
    }

    /// Process events until [`AppEvent::Shutdown`].
    pub fn run(&mut self) -> Result<(), AppError> {
        while self.pump(IDLE_WAIT)? == Control::Continue {}
        log::debug!("find app stopped");
        Ok(())
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    fn initialize(&mut self) -> Result<(), AppError> {
        if self.initialized {
            return Ok(());
        }
        if read_doc(&self.doc).body().is_none() {
            return Err(AppError::NoRoot);
        }
        let tx = self.events_tx.clone();
        let worker = MatchWorker::spawn(move |msg| {
            let _ = tx.send(AppEvent::Worker(msg));
        })?;
        self.client = Some(MatchClient::new(worker));
        self.initialized = true;
        log::debug!("find app initialised");
        Ok(())
    }

    /// Show the find bar and search for the current query.
    pub fn open(&mut self) -> Result<(), AppError> {
        self.initialize()?;
        {
            let doc = read_doc(&self.doc);
            self.watch.observe(&doc, self.view.viewport().client_size());
        }
        self.is_open = true;
        self.dispatch_input();
        Ok(())
    }

    /// Hide the find bar: stop watching, drop any search in flight and remove
    /// the match highlights.
    pub fn close(&mut self) {
        self.watch.disconnect();
        self.throttle.flush();
        self.cancel_search();
        self.view.clear_highlights();
        self.is_open = false;
    }

    fn update_options(&mut self, options: AppOptions) {
        self.stylesheet = color_stylesheet(&options.colors);
        self.options = options;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parser::parse_html;
    use crate::view::highlights::{MemoryHighlights, HIGHLIGHT_ALL_ID};
    use crate::view::scroll::LayoutViewport;
    use crate::view::ViewKind;

    const WAIT: Duration = Duration::from_secs(10);

    fn app(html: &str) -> (FindApp<MemoryHighlights, LayoutViewport>, MemoryHighlights) {
        let doc = parse_html(html, "");
        let viewport = LayoutViewport::new(&doc, 800.0, 600.0);
        let highlights = MemoryHighlights::new();
        let app = FindApp::new(doc.into_shared(), AppOptions::default(), highlights.clone(), viewport);
        (app, highlights)
    }

    #[test]
    fn events_before_open_are_ignored() {
        let (mut app, _) = app("<body><p>x</p></body>");
        app.handle(AppEvent::Input("x".into())).unwrap();
        app.handle(AppEvent::Command(CommandEvent::new("other"))).unwrap();
        assert_eq!(app.query(), "");
        assert!(!app.is_open());
    }

    #[test]
    fn open_searches_and_close_clears() {
        let (mut app, highlights) = app("<body><p>one two one</p></body>");
        app.handle(AppEvent::Command(CommandEvent::open())).unwrap();
        assert!(app.is_open());
        app.handle(AppEvent::Input("one".into())).unwrap();
        assert!(app.settle(WAIT).unwrap());
        assert_eq!(app.view().state().kind(), ViewKind::Ok);
        assert_eq!(app.view().info().message, "1 of 2");

        app.handle(AppEvent::Close).unwrap();
        assert!(!app.is_open());
        assert!(highlights.get(HIGHLIGHT_ALL_ID).is_none());
    }

    #[test]
    fn close_discards_throttled_input() {
        let (mut app, highlights) = app("<body><p>one two</p></body>");
        app.throttle = Throttle::new(|_| Duration::from_secs(60), true);
        app.handle(AppEvent::Command(CommandEvent::open())).unwrap();
        app.handle(AppEvent::Input("one".into())).unwrap();
        app.handle(AppEvent::Input("two".into())).unwrap();
        assert!(app.throttle.next_due().is_some());

        app.handle(AppEvent::Close).unwrap();
        assert!(!app.is_busy());
        for _ in 0..3 {
            app.pump(Duration::from_millis(20)).unwrap();
        }
        assert_eq!(app.query(), "two");
        assert_eq!(app.view().state().kind(), ViewKind::Void);
        assert!(highlights.get(HIGHLIGHT_ALL_ID).is_none());
    }

    #[test]
    fn missing_root_aborts_initialisation() {
        let doc = Document::new();
        let viewport = LayoutViewport::new(&doc, 800.0, 600.0);
        let mut app = FindApp::new(doc.into_shared(), AppOptions::default(), MemoryHighlights::new(), viewport);
        let err = app.handle(AppEvent::Command(CommandEvent::open())).unwrap_err();
        assert!(matches!(err, AppError::NoRoot));
    }

    #[test]
    fn options_page_and_colours() {
        let (mut app, _) = app("<body></body>");
        app.handle(AppEvent::Command(CommandEvent::open())).unwrap();
        app.handle(AppEvent::OpenOptions).unwrap();
        assert_eq!(app.take_outbound(), vec![Outbound::OpenOptionsPage]);
        assert!(app.take_outbound().is_empty());

        let mut options = AppOptions::default();
        options.colors.current = "red".into();
        options.flags.values_mut().for_each(|f| f.default = true);
        app.handle(AppEvent::OptionsUpdated(options)).unwrap();
        assert!(app.stylesheet().contains("_current: red;"));
        // Flag defaults only apply on the first load.
        assert_eq!(app.flags(), Flags::default());
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let (mut app, _) = app("<body></body>");
        app.sender().send(AppEvent::Shutdown).unwrap();
        app.run().unwrap();
    }
}
