//! Error types for feedharvest operations.
//!
//! This module defines the main error type [`HarvestError`] which represents
//! the failures a caller can observe: session-state violations, invalid
//! settings or locator files, document loading problems, and storage errors.
//!
//! Extraction problems (a missing container, an absent field, a click that
//! had no effect) are not represented here. The extractor
//! reports those as absent values and the harvester logs and moves on.
//!
//! # Example
//!
//! ```rust
//! use feedharvest_core::{HarvestError, Result};
//!
//! fn require_positive(max_posts: usize) -> Result<usize> {
//!     if max_posts == 0 {
//!         return Err(HarvestError::InvalidSettings("maxPosts must be greater than zero".into()));
//!     }
//!     Ok(max_posts)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harvesting, merging and exporting.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// A session is already running on this harvester.
    ///
    /// Returned by `start` while a previous session has not terminated.
    /// The running session is left untouched.
    #[error("A harvesting session is already active")]
    AlreadyActive,

    /// No session is running.
    ///
    /// Returned by `stop` (and by `run`) when the harvester is idle.
    #[error("No harvesting session is active")]
    NotActive,

    /// Settings failed validation (for example `maxPosts = 0`).
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// HTTP request errors from reqwest.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A document could not be used as a feed snapshot.
    #[error("Failed to load document: {0}")]
    DocumentError(String),

    /// An invalid CSS selector was supplied in a locator set.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// Locator file errors.
    ///
    /// Returned when parsing a locator file fails.
    #[error("Locator configuration error: {0}")]
    LocatorError(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors from serde_json.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store failures that are not plain I/O.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unknown export target.
    #[error("Unsupported export type: {0}")]
    UnsupportedExport(String),

    /// The control channel was closed while a command was in flight.
    #[error("Control channel closed")]
    ChannelClosed,
}

/// Result type alias for HarvestError.
pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarvestError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_session_errors() {
        assert!(HarvestError::AlreadyActive.to_string().contains("already active"));
        assert!(HarvestError::NotActive.to_string().contains("No harvesting session"));
    }

    #[test]
    fn test_invalid_selector_error() {
        let err = HarvestError::InvalidSelector { selector: "[[".to_string(), message: "unexpected token".to_string() };
        assert!(err.to_string().contains("[["));
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_timeout_error() {
        let err = HarvestError::Timeout { timeout: 30 };
        assert!(err.to_string().contains("30"));
    }
}
