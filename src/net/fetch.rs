use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::dom::parser::parse_html;
use crate::dom::Document;

/// Result of fetching a URL
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub html: String,
    pub url: String,
    pub status: u16,
    pub content_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Client error: {0}")]
    Client(reqwest::Error),
    #[error("Request failed: {0}")]
    Request(reqwest::Error),
    #[error("Failed to read body: {0}")]
    Body(reqwest::Error),
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Fetch a URL and return the HTML content (blocking).
pub fn fetch_url(url_str: &str) -> Result<FetchResult, FetchError> {
    let parsed = Url::parse(url_str)?;

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("find-plus-plus/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(15))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(FetchError::Client)?;

    let response = client
        .get(parsed.as_str())
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .send()
        .map_err(FetchError::Request)?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    if !response.status().is_success() {
        return Err(FetchError::Status { url: final_url, status });
    }
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    let html = response.text().map_err(FetchError::Body)?;
    log::debug!("fetched {} bytes of {} from {}", html.len(), content_type, final_url);

    Ok(FetchResult { html, url: final_url, status, content_type })
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to read {path}: {error}")]
    Read { path: String, error: std::io::Error },
}

/// Load a document from an `http(s)` URL or a local HTML file.
pub fn load_source(source: &str) -> Result<Document, LoadError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let page = fetch_url(source)?;
        return Ok(parse_html(&page.html, &page.url));
    }
    let path = Path::new(source);
    let html = std::fs::read_to_string(path).map_err(|error| LoadError::Read { path: source.to_string(), error })?;
    let url = std::fs::canonicalize(path)
        .ok()
        .and_then(|p| Url::from_file_path(p).ok())
        .map(String::from)
        .unwrap_or_default();
    Ok(parse_html(&html, &url))
}
