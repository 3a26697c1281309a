//! Find bar controls: the query box, the flag toggles, shortcuts and the
//! info panel buttons.

use std::time::Instant;

use crate::search::{FlagName, Flags};
use crate::view::highlights::HighlightRegistry;
use crate::view::parse_set_index;
use crate::view::scroll::Viewport;

use super::input::{paste_text, query_key_action, KeyAction, KeyPress};
use super::{read_doc, FindApp};

impl<H: HighlightRegistry, V: Viewport> FindApp<H, V> {
    pub(super) fn set_query(&mut self, query: String) {
        self.query = query;
        self.dispatch_input();
    }

    /// Search for the current query, subject to the input throttle.
    pub(super) fn dispatch_input(&mut self) {
        if self.throttle.call((), Instant::now()).is_some() {
            self.update_search();
        }
    }

    pub(super) fn set_flags(&mut self, flags: Flags) {
        if flags != self.flags {
            self.flags = flags;
            self.dispatch_input();
        }
    }

    /// Flip one flag. Ignored while the bar is closed.
    pub fn toggle_flag(&mut self, name: FlagName) {
        if !self.is_open {
            return;
        }
        let mut flags = self.flags;
        flags.set(name, !flags.get(name));
        log::debug!("{name} toggled to {}", flags.get(name));
        self.set_flags(flags);
    }

    /// React to a key combo pressed while open. Returns whether it was bound.
    pub(super) fn on_shortkey(&mut self, combo: &str) -> bool {
        if !self.is_open {
            return false;
        }
        if combo == self.options.actions.close.shortkey {
            self.close();
            return true;
        }
        let bound = FlagName::ALL
            .into_iter()
            .find(|&name| self.options.shortkey(name) == Some(combo));
        match bound {
            Some(name) => {
                self.toggle_flag(name);
                true
            }
            None => false,
        }
    }

    pub(super) fn on_query_key(&mut self, key: &KeyPress) {
        match query_key_action(key) {
            KeyAction::Navigate(setter) => {
                let doc = read_doc(&self.doc);
                self.view.update_range_index(&doc, setter);
            }
            KeyAction::InsertNewline => {
                self.query.push('\n');
                self.dispatch_input();
            }
            KeyAction::Type | KeyAction::Pass => {}
        }
    }

    /// Append pasted data to the query. Returns `false` when no flavour was
    /// usable.
    pub(super) fn on_paste(&mut self, data: &[(String, String)]) -> bool {
        let Some(text) = paste_text(data.iter().map(|(m, v)| (m.as_str(), v.as_str()))) else {
            return false;
        };
        self.query.push_str(&text);
        self.dispatch_input();
        true
    }

    pub(super) fn on_set_index(&mut self, setter: &str) {
        match parse_set_index(setter) {
            Ok(setter) => {
                let doc = read_doc(&self.doc);
                self.view.update_range_index(&doc, setter);
            }
            Err(e) => log::warn!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::app::commands::CommandEvent;
    use crate::app::input::KeyPress;
    use crate::app::options::AppOptions;
    use crate::app::{AppEvent, FindApp};
    use crate::dom::parser::parse_html;
    use crate::search::{FlagName, Flags};
    use crate::view::highlights::MemoryHighlights;
    use crate::view::scroll::LayoutViewport;
    use crate::view::ViewKind;

    const WAIT: Duration = Duration::from_secs(10);

    fn open_app(html: &str) -> FindApp<MemoryHighlights, LayoutViewport> {
        let doc = parse_html(html, "");
        let viewport = LayoutViewport::new(&doc, 800.0, 600.0);
        let mut app = FindApp::new(doc.into_shared(), AppOptions::default(), MemoryHighlights::new(), viewport);
        app.handle(AppEvent::Command(CommandEvent::open())).unwrap();
        app
    }

    fn search(app: &mut FindApp<MemoryHighlights, LayoutViewport>, query: &str) {
        app.handle(AppEvent::Input(query.into())).unwrap();
        assert!(app.settle(WAIT).unwrap());
    }

    #[test]
    fn flag_shortkeys_toggle_and_research() {
        let mut app = open_app("<body><p>Word word WORD</p></body>");
        search(&mut app, "word");
        assert_eq!(app.view().info().message, "1 of 3");

        app.handle(AppEvent::Shortkey("Alt+C".into())).unwrap();
        assert!(app.flags().match_case);
        assert!(app.settle(WAIT).unwrap());
        assert_eq!(app.view().info().message, "1 of 1");

        app.handle(AppEvent::Shortkey("Alt+Q".into())).unwrap();
        assert!(app.flags().match_case);
    }

    #[test]
    fn toggling_needs_an_open_bar() {
        let mut app = open_app("<body><p>x</p></body>");
        app.handle(AppEvent::Close).unwrap();
        app.toggle_flag(FlagName::UseRegex);
        assert_eq!(app.flags(), Flags::default());
    }

    #[test]
    fn close_shortkey_closes() {
        let mut app = open_app("<body><p>x</p></body>");
        app.handle(AppEvent::Shortkey("Escape".into())).unwrap();
        assert!(!app.is_open());
    }

    #[test]
    fn enter_and_index_buttons_navigate() {
        let mut app = open_app("<body><p>a a a</p></body>");
        search(&mut app, "a");
        app.handle(AppEvent::QueryKey(KeyPress::new("Enter").with_shift())).unwrap();
        assert_eq!(app.view().info().message, "3 of 3");
        app.handle(AppEvent::QueryKey(KeyPress::new("Enter"))).unwrap();
        assert_eq!(app.view().info().message, "1 of 3");

        app.handle(AppEvent::SetIndex("n+2".into())).unwrap();
        assert_eq!(app.view().info().message, "3 of 3");
        app.handle(AppEvent::SetIndex("bogus".into())).unwrap();
        assert_eq!(app.view().info().message, "3 of 3");
    }

    #[test]
    fn paste_appends_to_the_query() {
        let mut app = open_app("<body><p>bold move</p></body>");
        app.handle(AppEvent::Paste(vec![("text/html".into(), "<b>bold</b>\r\n".into())])).unwrap();
        assert_eq!(app.query(), "bold");
        assert!(app.settle(WAIT).unwrap());
        assert_eq!(app.view().state().kind(), ViewKind::Ok);
    }

    #[test]
    fn invalid_regex_reports_the_error() {
        let mut app = open_app("<body><p>x</p></body>");
        app.toggle_flag(FlagName::UseRegex);
        search(&mut app, "a(");
        assert_eq!(app.view().state().kind(), ViewKind::Error);
        assert!(app.view().info().message.starts_with("Invalid regular expression"));
    }
}
