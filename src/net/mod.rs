//! Loading pages to search.

pub mod fetch;

pub use fetch::{fetch_url, load_source, FetchError, FetchResult, LoadError};
