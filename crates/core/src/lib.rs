pub mod analytics;
pub mod control;
pub mod document;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod formatters;
pub mod harvest;
pub mod locators;
pub mod model;
pub mod normalize;
pub mod preprocess;
pub mod search;
pub mod settings;
pub mod snapshot;
pub mod store;

pub use analytics::{AnalyticsOptions, AnalyticsSnapshot, compute, compute_at};
pub use control::{Command, ControlClient, Controller, control_channel};
pub use document::DocumentSource;
#[doc(hidden)]
pub use document::{locate, locate_all, locate_all_visible, locate_outermost, locate_text, locate_visible};
pub use error::{HarvestError, Result};
pub use extract::{ExtractConfig, Extractor};
pub use fetch::{FetchConfig, PageInput, fetch_file, fetch_stdin, fetch_url, load_page};
pub use fingerprint::{Keyed, assign_ids, fingerprint};
pub use formatters::{TextConfig, escape_csv, export_json, summarize, to_csv};
pub use harvest::{
    EventSender, HarvestEvent, HarvestOutcome, HarvestState, Harvester, HarvesterHandle, MAX_SCROLL_ATTEMPTS, Progress,
    SessionStatus, TerminationReason,
};
pub use locators::{LocatorLoader, LocatorLoaderBuilder, LocatorParser, LocatorSet, Role};
pub use model::{Author, Comment, Dataset, EntityKind, Post, Profile, Reply, UNKNOWN_AUTHOR};
pub use normalize::{normalize_author, normalize_count, normalize_post, normalize_text, normalize_timestamp};
#[doc(hidden)]
pub use preprocess::PreprocessConfig;
pub use preprocess::preprocess_html;
pub use search::{SearchQuery, SearchResults, search};
pub use settings::{Collect, HarvestSettings, HarvestSettingsBuilder, Timing};
pub use snapshot::SnapshotSource;
pub use store::{JsonFileBackend, MemoryBackend, MergeOutcome, StorageBackend, StorageStats, Store, merge};
