//! Deduplicating merge and persistence of the harvested dataset.
//!
//! [`merge`] is the pure part: it folds a batch into a dataset, keeping the
//! first record seen for every id. [`Store`] owns the authoritative dataset
//! and writes it through a [`StorageBackend`] before making a merge visible,
//! so a failed write leaves the previous dataset in place.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::analytics::{AnalyticsOptions, AnalyticsSnapshot};
use crate::fingerprint::Keyed;
use crate::model::{CanonicalTimestamp, Dataset};
use crate::normalize::format_canonical;
use crate::{HarvestError, Result, analytics};

pub const DATASET_FILE: &str = "dataset.json";
pub const ANALYTICS_FILE: &str = "analytics.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Folds `batch` into `current` and returns the result.
///
/// For each collection, incoming records are walked in order and appended
/// only when no record with the same id is already present. Earlier records
/// always win, including over later duplicates within the same batch.
/// Records without an id get their fingerprint.
pub fn merge(current: &Dataset, batch: &Dataset) -> Dataset {
    Dataset {
        posts: merge_collection(&current.posts, &batch.posts),
        comments: merge_collection(&current.comments, &batch.comments),
        profiles: merge_collection(&current.profiles, &batch.profiles),
    }
}

fn merge_collection<T: Keyed + Clone>(current: &[T], incoming: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(current.len() + incoming.len());
    let mut seen: HashSet<String> = HashSet::with_capacity(current.len() + incoming.len());

    for item in current.iter().chain(incoming) {
        let key = item.key();
        if seen.insert(key.clone()) {
            let mut item = item.clone();
            if item.id().is_empty() {
                item.set_id(key);
            }
            merged.push(item);
        }
    }

    merged
}

/// Dataset as persisted, with the time of the last successful merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDataset {
    #[serde(flatten)]
    pub dataset: Dataset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<CanonicalTimestamp>,
}

/// Persistent key-value storage for the dataset and its last analytics.
pub trait StorageBackend {
    fn load(&self) -> Result<Option<StoredDataset>>;

    fn save(&mut self, stored: &StoredDataset) -> Result<()>;

    fn load_analytics(&self) -> Result<Option<AnalyticsSnapshot>>;

    fn save_analytics(&mut self, snapshot: &AnalyticsSnapshot) -> Result<()>;

    /// Removes the dataset and the stored analytics.
    fn clear(&mut self) -> Result<()>;
}

/// Stores everything as pretty JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default data directory (`<data dir>/feedharvest`).
    pub fn default_dir() -> Option<PathBuf> {
        Some(dirs::data_dir()?.join("feedharvest"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Writes through a temporary file so a failed write never truncates
    /// the previous contents.
    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{}.tmp", file));
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, file: &str) -> Result<()> {
        let path = self.dir.join(file);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl StorageBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<StoredDataset>> {
        self.read(DATASET_FILE)
    }

    fn save(&mut self, stored: &StoredDataset) -> Result<()> {
        self.write(DATASET_FILE, stored)
    }

    fn load_analytics(&self) -> Result<Option<AnalyticsSnapshot>> {
        self.read(ANALYTICS_FILE)
    }

    fn save_analytics(&mut self, snapshot: &AnalyticsSnapshot) -> Result<()> {
        self.write(ANALYTICS_FILE, snapshot)
    }

    fn clear(&mut self) -> Result<()> {
        self.remove(DATASET_FILE)?;
        self.remove(ANALYTICS_FILE)
    }
}

/// In-memory storage. Can be told to reject writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    stored: Option<StoredDataset>,
    analytics: Option<AnalyticsSnapshot>,
    fail_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose writes all fail with [`HarvestError::Storage`].
    pub fn failing() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(HarvestError::Storage("backend rejected the write".to_string()));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Option<StoredDataset>> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, stored: &StoredDataset) -> Result<()> {
        self.check_writable()?;
        self.stored = Some(stored.clone());
        Ok(())
    }

    fn load_analytics(&self) -> Result<Option<AnalyticsSnapshot>> {
        Ok(self.analytics.clone())
    }

    fn save_analytics(&mut self, snapshot: &AnalyticsSnapshot) -> Result<()> {
        self.check_writable()?;
        self.analytics = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.check_writable()?;
        self.stored = None;
        self.analytics = None;
        Ok(())
    }
}

/// What a merge added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added_posts: usize,
    pub added_comments: usize,
    pub added_profiles: usize,
}

impl MergeOutcome {
    pub fn total(&self) -> usize {
        self.added_posts + self.added_comments + self.added_profiles
    }
}

/// Size and freshness of the stored dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_items: usize,
    pub posts: usize,
    pub comments: usize,
    pub profiles: usize,
    /// Size of the dataset serialized as compact JSON.
    pub estimated_size_bytes: usize,
    pub last_updated: Option<CanonicalTimestamp>,
}

impl StorageStats {
    /// Size in kilobytes with two decimals, e.g. `"12.34 KB"`.
    pub fn estimated_size(&self) -> String {
        format!("{:.2} KB", self.estimated_size_bytes as f64 / 1024.0)
    }
}

/// The authoritative dataset and the backend it is persisted to.
#[derive(Debug)]
pub struct Store<B: StorageBackend> {
    backend: B,
    dataset: Dataset,
    last_updated: Option<CanonicalTimestamp>,
}

impl<B: StorageBackend> Store<B> {
    /// Opens a store, loading whatever the backend holds.
    pub fn open(backend: B) -> Result<Self> {
        let mut store = Self { backend, dataset: Dataset::new(), last_updated: None };
        store.load()?;
        Ok(store)
    }

    /// Reloads the dataset from the backend.
    pub fn load(&mut self) -> Result<&Dataset> {
        let stored = self.backend.load()?.unwrap_or_default();
        self.dataset = stored.dataset;
        self.last_updated = stored.last_updated;
        Ok(&self.dataset)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    /// Merges a batch, persists the result and only then makes it current.
    ///
    /// On a storage error the previous dataset stays authoritative.
    pub fn merge(&mut self, batch: &Dataset) -> Result<MergeOutcome> {
        let merged = merge(&self.dataset, batch);
        let outcome = MergeOutcome {
            added_posts: merged.posts.len() - self.dataset.posts.len(),
            added_comments: merged.comments.len() - self.dataset.comments.len(),
            added_profiles: merged.profiles.len() - self.dataset.profiles.len(),
        };

        let stored =
            StoredDataset { dataset: merged, last_updated: format_canonical(OffsetDateTime::now_utc()) };
        self.backend.save(&stored)?;

        tracing::debug!(
            added_posts = outcome.added_posts,
            added_comments = outcome.added_comments,
            added_profiles = outcome.added_profiles,
            "Merged batch"
        );

        self.dataset = stored.dataset;
        self.last_updated = stored.last_updated;
        Ok(outcome)
    }

    /// Computes analytics over the current dataset and stores them as the
    /// last computed snapshot.
    pub fn analytics(&mut self, options: &AnalyticsOptions) -> Result<AnalyticsSnapshot> {
        let snapshot = analytics::compute_at(&self.dataset, OffsetDateTime::now_utc(), options);
        self.backend.save_analytics(&snapshot)?;
        Ok(snapshot)
    }

    /// The analytics stored by the last [`Store::analytics`] call.
    pub fn stored_analytics(&self) -> Result<Option<AnalyticsSnapshot>> {
        self.backend.load_analytics()
    }

    /// Removes every record and the stored analytics.
    pub fn clear(&mut self) -> Result<()> {
        self.backend.clear()?;
        self.dataset = Dataset::new();
        self.last_updated = None;
        Ok(())
    }

    pub fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_items: self.dataset.len(),
            posts: self.dataset.posts.len(),
            comments: self.dataset.comments.len(),
            profiles: self.dataset.profiles.len(),
            estimated_size_bytes: serde_json::to_vec(&self.dataset)?.len(),
            last_updated: self.last_updated.clone(),
        })
    }
}
