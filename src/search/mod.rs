//! Query compilation and matching.
//!
//! A search term plus [`Flags`] compiles to a [`RegexConfig`]. Matching runs
//! on a [`MatchWorker`] thread, driven page by page through a
//! [`MatchClient`], against the text of a visible-text snapshot.

pub mod client;
pub mod compile;
pub mod cursor;
pub mod flags;
pub mod highlight;
pub mod normalize;
pub mod protocol;
pub mod syntax;
pub mod worker;

pub use client::{ClientEvent, MatchClient, MatchQuery, PAGE_SIZE};
pub use compile::{compile, Pattern, PatternSyntaxError, QueryPresentation, RegexConfig};
pub use cursor::{EngineError, MatchCursor, MatchResult};
pub use flags::{FlagName, Flags, Normalization};
pub use highlight::{highlight_query, HighlightKind, HighlightSpan};
pub use protocol::{GetMatchesRequest, HostMessage, WorkerMessage};
pub use worker::MatchWorker;
