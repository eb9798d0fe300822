//! Harvest settings and settle timings.
//!
//! [`HarvestSettings`] is what a control surface sends with a `start`
//! command. [`Timing`] holds the fixed settle delays used at the explicit
//! suspension points of the harvester and extractor.
//!
//! # Example
//!
//! ```rust
//! use feedharvest_core::HarvestSettings;
//!
//! let settings = HarvestSettings::builder()
//!     .scroll_delay_ms(500)
//!     .max_posts(25)
//!     .collect_profiles(false)
//!     .build();
//! assert!(settings.validate().is_ok());
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{HarvestError, Result};

/// Default delay after each scroll, in milliseconds.
pub const DEFAULT_SCROLL_DELAY_MS: u64 = 2000;

/// Which collections a harvest contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collect {
    pub posts: bool,
    pub comments: bool,
    pub profiles: bool,
}

impl Default for Collect {
    fn default() -> Self {
        Self { posts: true, comments: true, profiles: true }
    }
}

/// Settings for one harvesting session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarvestSettings {
    /// Delay after each scroll before the next scan (default: 2000).
    pub scroll_delay_ms: u64,
    /// Stop once this many posts were found (default: unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_posts: Option<usize>,
    /// Collections to fill (default: all).
    pub collect: Collect,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self { scroll_delay_ms: DEFAULT_SCROLL_DELAY_MS, max_posts: None, collect: Collect::default() }
    }
}

impl HarvestSettings {
    /// Creates a new builder for HarvestSettings.
    pub fn builder() -> HarvestSettingsBuilder {
        HarvestSettingsBuilder::new()
    }

    /// Rejects settings a session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_posts == Some(0) {
            return Err(HarvestError::InvalidSettings("maxPosts must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    /// Loads settings persisted as JSON, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Persists settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Builder for HarvestSettings.
pub struct HarvestSettingsBuilder {
    settings: HarvestSettings,
}

impl HarvestSettingsBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { settings: HarvestSettings::default() }
    }

    /// Sets the post-scroll settle delay.
    pub fn scroll_delay_ms(mut self, value: u64) -> Self {
        self.settings.scroll_delay_ms = value;
        self
    }

    /// Sets the post limit.
    pub fn max_posts(mut self, value: usize) -> Self {
        self.settings.max_posts = Some(value);
        self
    }

    /// Sets whether posts are collected.
    pub fn collect_posts(mut self, value: bool) -> Self {
        self.settings.collect.posts = value;
        self
    }

    /// Sets whether comments are collected.
    pub fn collect_comments(mut self, value: bool) -> Self {
        self.settings.collect.comments = value;
        self
    }

    /// Sets whether profiles are collected.
    pub fn collect_profiles(mut self, value: bool) -> Self {
        self.settings.collect.profiles = value;
        self
    }

    /// Builds the settings.
    pub fn build(self) -> HarvestSettings {
        self.settings
    }
}

impl Default for HarvestSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Settle delays at the suspension points of a session.
///
/// These give the external document time to update after an interaction.
/// They are not used for any other synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// After clicking a detail affordance (default: 2s).
    pub detail_open: Duration,
    /// After clicking the close affordance (default: 500ms).
    pub detail_close: Duration,
    /// After each expand-comments / expand-replies click (default: 1s).
    pub expand: Duration,
    /// After clicking a "see more" affordance (default: 500ms).
    pub see_more: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            detail_open: Duration::from_millis(2000),
            detail_close: Duration::from_millis(500),
            expand: Duration::from_millis(1000),
            see_more: Duration::from_millis(500),
        }
    }
}

impl Timing {
    /// No settling at all; for in-memory documents that update synchronously.
    pub fn immediate() -> Self {
        Self {
            detail_open: Duration::ZERO,
            detail_close: Duration::ZERO,
            expand: Duration::ZERO,
            see_more: Duration::ZERO,
        }
    }
}
