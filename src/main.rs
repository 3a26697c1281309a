use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use find_plus_plus::app::commands::CommandEvent;
use find_plus_plus::app::options::AppOptions;
use find_plus_plus::app::{AppEvent, FindApp};
use find_plus_plus::dom::Document;
use find_plus_plus::net::load_source;
use find_plus_plus::search::{FlagName, Flags};
use find_plus_plus::text::range::MatchRange;
use find_plus_plus::view::highlights::MemoryHighlights;
use find_plus_plus::view::scroll::LayoutViewport;
use find_plus_plus::view::ViewState;

/// Characters of surrounding text shown on each side of a match.
const CONTEXT: usize = 30;

/// Find text in a page by literal, regex, whole-word or diacritic-insensitive
/// search.
#[derive(Parser, Debug)]
#[command(name = "find-plus-plus", version)]
struct Cli {
    /// An http(s) URL or a path to an HTML file.
    source: String,
    /// Search term. `/source/flags` is taken as a regex literal.
    query: String,
    #[arg(short, long)]
    regex: bool,
    #[arg(short = 'c', long)]
    match_case: bool,
    #[arg(short, long)]
    whole_word: bool,
    #[arg(short = 'd', long)]
    normalize_diacritics: bool,
    /// JSON options file.
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,
    /// Index setter applied after the search, such as `3` or `n-1`.
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    select: Option<String>,
    /// Viewport size used for scrolling, as WIDTHxHEIGHT.
    #[arg(long, default_value = "1280x800", value_parser = parse_size)]
    viewport: (f32, f32),
}

fn parse_size(s: &str) -> Result<(f32, f32), String> {
    let (w, h) = s.split_once('x').ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}

impl Cli {
    fn flags(&self, options: &AppOptions) -> Flags {
        let mut flags = options.default_flags();
        for (name, on) in [
            (FlagName::UseRegex, self.regex),
            (FlagName::MatchCase, self.match_case),
            (FlagName::WholeWord, self.whole_word),
            (FlagName::NormalizeDiacritics, self.normalize_diacritics),
        ] {
            if on {
                flags.set(name, true);
            }
        }
        flags
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = match &cli.options {
        Some(path) => AppOptions::load(path)?,
        None => AppOptions::default(),
    };
    let flags = cli.flags(&options);
    let settle_timeout = Duration::from_millis(options.max_timeout) + Duration::from_secs(1);

    let doc = load_source(&cli.source)?;
    let viewport = LayoutViewport::new(&doc, cli.viewport.0, cli.viewport.1);
    let mut app = FindApp::new(doc.into_shared(), options, MemoryHighlights::new(), viewport);

    app.handle(AppEvent::Command(CommandEvent::open()))?;
    app.handle(AppEvent::FlagsChanged(flags))?;
    app.handle(AppEvent::Input(cli.query.clone()))?;
    if !app.settle(settle_timeout)? {
        log::warn!("search still running after {settle_timeout:?}");
    }
    if let Some(setter) = &cli.select {
        app.handle(AppEvent::SetIndex(setter.clone()))?;
    }

    if app.presentation().is_regex && !app.presentation().title.is_empty() {
        println!("pattern: {}", app.presentation().title);
    }
    println!("{}", app.view().info().message);

    let doc = app.document().read().unwrap_or_else(|e| e.into_inner());
    if let ViewState::Ok { ranges, current_index } = app.view().state() {
        for (i, range) in ranges.iter().enumerate() {
            let marker = if i == *current_index { '>' } else { ' ' };
            println!("{marker}{:>5}: {}", i + 1, with_context(&doc, range));
        }
    }
    Ok(())
}

/// The match in brackets with some of the surrounding text of its nodes.
fn with_context(doc: &Document, range: &MatchRange) -> String {
    let matched = range.to_text(doc).unwrap_or_default();
    let before = doc
        .text(range.start.node)
        .and_then(|t| t.get(..range.start.offset))
        .unwrap_or_default();
    let after = doc
        .text(range.end.node)
        .and_then(|t| t.get(range.end.offset..))
        .unwrap_or_default();

    let skip = before.chars().count().saturating_sub(CONTEXT);
    let before: String = before.chars().skip(skip).collect();
    let after: String = after.chars().take(CONTEXT).collect();
    format!("{}[{}]{}", before, matched, after).replace('\n', " ")
}
