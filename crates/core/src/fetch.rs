//! Loading saved feed pages from URLs, files, and stdin.
//!
//! A harvest over saved pages treats each loaded page as the next state of
//! the feed. [`load_page`] picks the right loader for an input string.

use std::fs;
use std::path::PathBuf;
#[cfg(feature = "fetch")]
use std::time::Duration;

#[cfg(feature = "fetch")]
use reqwest::Client;
use url::Url;

use crate::{HarvestError, Result};

/// HTTP client configuration for fetching pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: 30, user_agent: format!("feedharvest/{}", env!("CARGO_PKG_VERSION")) }
    }
}

/// Where a page comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageInput {
    Url(Url),
    File(PathBuf),
    Stdin,
}

impl PageInput {
    /// Classifies an input string: `-` is stdin, anything with an http(s)
    /// scheme is a URL, everything else is a file path.
    pub fn parse(input: &str) -> Self {
        if input == "-" {
            return PageInput::Stdin;
        }
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => PageInput::Url(url),
            _ => PageInput::File(PathBuf::from(input)),
        }
    }

    /// Base URL for absolutizing links, when the input has one.
    pub fn base_url(&self) -> Option<Url> {
        match self {
            PageInput::Url(url) => Some(url.clone()),
            _ => None,
        }
    }
}

/// Loads one page from any supported input.
pub async fn load_page(input: &PageInput, config: &FetchConfig) -> Result<String> {
    match input {
        PageInput::Url(url) => fetch_url(url.as_str(), config).await,
        PageInput::File(path) => fetch_file(path),
        PageInput::Stdin => fetch_stdin(),
    }
}

/// Fetches a page over HTTP.
#[cfg(feature = "fetch")]
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = Url::parse(url).map_err(|e| HarvestError::InvalidUrl(e.to_string()))?;

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(HarvestError::HttpError)?;

    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
        .send()
        .await
        .map_err(|e| if e.is_timeout() { HarvestError::Timeout { timeout: config.timeout } } else { HarvestError::HttpError(e) })?;

    let content = response.error_for_status()?.text().await?;
    tracing::debug!(url, bytes = content.len(), "Fetched page");

    Ok(content)
}

/// Without the `fetch` feature URLs cannot be loaded.
#[cfg(not(feature = "fetch"))]
pub async fn fetch_url(url: &str, _config: &FetchConfig) -> Result<String> {
    Err(HarvestError::InvalidUrl(format!("{} (built without the fetch feature)", url)))
}

/// Reads a saved page from a local file.
pub fn fetch_file(path: impl Into<PathBuf>) -> Result<String> {
    let path_buf = path.into();

    if !path_buf.exists() {
        Err(HarvestError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(HarvestError::from)
    }
}

/// Reads a page from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(HarvestError::from)?;

    Ok(buffer)
}
