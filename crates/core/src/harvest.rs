//! The traversal state machine.
//!
//! A session walks the feed in passes: scan the loaded items, open each
//! unvisited one in its detail view, extract, close, and scroll for more
//! when the pass is done. Every loop is bounded, so a session always ends
//! with one of the [`TerminationReason`]s:
//!
//! - `stopped`: a stop was requested (checked after every item)
//! - `maxPosts`: the configured post limit was reached
//! - `scrollLimit`: [`MAX_SCROLL_ATTEMPTS`] scrolls without running dry
//! - `exhausted`: a scroll brought in no new posts
//!
//! Whatever was collected is normalized and merged into the [`Store`] when
//! the session ends, however it ended.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::analytics::AnalyticsOptions;
use crate::document::{DocumentSource, locate, locate_all, locate_visible};
use crate::extract::{ExtractConfig, Extractor, post_id_from_url, settle};
use crate::fingerprint::{assign_ids, fingerprint};
use crate::locators::{LocatorSet, Role};
use crate::model::{Dataset, Post};
use crate::normalize::{normalize_post, normalize_text};
use crate::settings::{HarvestSettings, Timing};
use crate::store::{MergeOutcome, StorageBackend, Store};
use crate::{HarvestError, Result};

/// Scrolls allowed per session before it gives up.
pub const MAX_SCROLL_ATTEMPTS: u32 = 50;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    Stopped,
    MaxPosts,
    ScrollLimit,
    Exhausted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationReason::Stopped => "stopped",
            TerminationReason::MaxPosts => "maxPosts",
            TerminationReason::ScrollLimit => "scrollLimit",
            TerminationReason::Exhausted => "exhausted",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "reason")]
pub enum HarvestState {
    #[default]
    Idle,
    Scanning,
    OpeningDetail,
    ExtractingDetail,
    ClosingDetail,
    Scrolling,
    Terminated(TerminationReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub posts_found: usize,
    pub scroll_attempts: u32,
}

/// What `getState` reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub active: bool,
    pub state: HarvestState,
    pub progress: Progress,
    pub settings: Option<HarvestSettings>,
}

/// Events emitted while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    Progress(Progress),
    Completed { reason: TerminationReason, batch: Dataset },
    Error { context: String, message: String },
}

pub type EventSender = mpsc::UnboundedSender<HarvestEvent>;

/// Result of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestOutcome {
    pub reason: TerminationReason,
    /// The normalized batch handed to the store.
    pub batch: Dataset,
    /// What the merge added, or `None` when persisting failed.
    pub merged: Option<MergeOutcome>,
}

#[derive(Debug, Default)]
struct Shared {
    active: AtomicBool,
    stop: AtomicBool,
    status: Mutex<SessionStatus>,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, SessionStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cloneable handle for observing and stopping a harvester from elsewhere.
#[derive(Debug, Clone)]
pub struct HarvesterHandle {
    shared: Arc<Shared>,
}

impl HarvesterHandle {
    /// Requests a cooperative stop.
    ///
    /// Idempotent while a session is active; the session notices at its next
    /// decision point and finishes the item it is working on first.
    pub fn stop(&self) -> Result<()> {
        if !self.shared.active.load(Ordering::SeqCst) {
            return Err(HarvestError::NotActive);
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        tracing::info!("Stop requested");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SessionStatus {
        let mut status = self.shared.status().clone();
        status.active = self.is_active();
        status
    }
}

/// Session bookkeeping. Never persisted.
#[derive(Debug)]
struct ScrapeSession {
    settings: HarvestSettings,
    visited: HashSet<String>,
    scroll_attempts: u32,
    posts_found: usize,
    batch: Vec<Post>,
}

impl ScrapeSession {
    fn new(settings: HarvestSettings) -> Self {
        Self { settings, visited: HashSet::new(), scroll_attempts: 0, posts_found: 0, batch: Vec::new() }
    }

    fn progress(&self) -> Progress {
        Progress { posts_found: self.posts_found, scroll_attempts: self.scroll_attempts }
    }

    fn limit_reached(&self) -> bool {
        self.settings.max_posts.is_some_and(|max| self.posts_found >= max)
    }
}

/// Drives one document through harvesting sessions, one at a time.
pub struct Harvester<D: DocumentSource, B: StorageBackend> {
    source: D,
    locators: LocatorSet,
    timing: Timing,
    store: Store<B>,
    shared: Arc<Shared>,
    session: Option<ScrapeSession>,
}

impl<D: DocumentSource, B: StorageBackend> Harvester<D, B> {
    pub fn new(source: D, locators: LocatorSet, store: Store<B>) -> Self {
        Self { source, locators, timing: Timing::default(), store, shared: Arc::default(), session: None }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn handle(&self) -> HarvesterHandle {
        HarvesterHandle { shared: Arc::clone(&self.shared) }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn store(&self) -> &Store<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<B> {
        &mut self.store
    }

    pub fn into_store(self) -> Store<B> {
        self.store
    }

    pub fn status(&self) -> SessionStatus {
        self.handle().status()
    }

    /// Begins a session.
    ///
    /// Fails with [`HarvestError::AlreadyActive`] while another session has
    /// not terminated, leaving that session untouched.
    pub fn start(&mut self, settings: HarvestSettings) -> Result<()> {
        if self.shared.active.load(Ordering::SeqCst) {
            return Err(HarvestError::AlreadyActive);
        }
        settings.validate()?;

        tracing::info!(scroll_delay_ms = settings.scroll_delay_ms, max_posts = ?settings.max_posts, "Starting session");
        *self.shared.status() = SessionStatus {
            active: true,
            state: HarvestState::Scanning,
            progress: Progress::default(),
            settings: Some(settings.clone()),
        };
        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.active.store(true, Ordering::SeqCst);
        self.session = Some(ScrapeSession::new(settings));
        Ok(())
    }

    /// Requests a stop. See [`HarvesterHandle::stop`].
    pub fn stop(&self) -> Result<()> {
        self.handle().stop()
    }

    /// Starts a session and runs it to completion without an event consumer.
    pub async fn harvest(&mut self, settings: HarvestSettings) -> Result<HarvestOutcome> {
        self.start(settings)?;
        let (events, _) = mpsc::unbounded_channel();
        self.run(&events).await
    }

    /// Runs the started session until it terminates, then flushes it.
    pub async fn run(&mut self, events: &EventSender) -> Result<HarvestOutcome> {
        let Some(mut session) = self.session.take() else {
            return Err(HarvestError::NotActive);
        };

        let reason = self.traverse(&mut session, events).await;
        tracing::info!(%reason, posts_found = session.posts_found, scroll_attempts = session.scroll_attempts, "Session terminated");
        self.shared.status().progress = session.progress();
        self.set_state(HarvestState::Terminated(reason));

        let outcome = self.flush(session, reason, events);

        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.status().active = false;
        let _ = events.send(HarvestEvent::Completed { reason, batch: outcome.batch.clone() });
        Ok(outcome)
    }

    async fn traverse(&mut self, session: &mut ScrapeSession, events: &EventSender) -> TerminationReason {
        let mut found_before_scroll: Option<usize> = None;

        loop {
            self.set_state(HarvestState::Scanning);
            let items = locate_all(&self.source, &self.locators, None, Role::PostContainer);
            tracing::debug!(items = items.len(), "Scanning feed");

            for item in items {
                if !session.visited.insert(self.item_key(&item)) {
                    continue;
                }

                if let Some(post) = self.process_item(&item, session).await {
                    session.batch.push(post);
                    session.posts_found += 1;
                    self.report(session, events);
                }

                if self.stop_requested() {
                    return TerminationReason::Stopped;
                }
                if session.limit_reached() {
                    return TerminationReason::MaxPosts;
                }
            }

            if found_before_scroll == Some(session.posts_found) {
                return TerminationReason::Exhausted;
            }
            if self.stop_requested() {
                return TerminationReason::Stopped;
            }

            self.set_state(HarvestState::Scrolling);
            if session.scroll_attempts >= MAX_SCROLL_ATTEMPTS {
                return TerminationReason::ScrollLimit;
            }
            found_before_scroll = Some(session.posts_found);
            session.scroll_attempts += 1;

            let height = self.source.current_height();
            if let Err(e) = self.source.scroll_to_bottom() {
                tracing::warn!(error = %e, "Scroll failed");
            }
            tracing::debug!(
                scroll_attempts = session.scroll_attempts,
                height_before = height,
                height_after = self.source.current_height(),
                "Scrolled"
            );
            self.report(session, events);
            settle(session.settings.scroll_delay()).await;
        }
    }

    /// Opens, extracts and closes one feed item.
    async fn process_item(&mut self, item: &D::Element, session: &ScrapeSession) -> Option<Post> {
        let config = ExtractConfig {
            timing: self.timing,
            comments: session.settings.collect.comments,
            ..Default::default()
        };

        self.set_state(HarvestState::OpeningDetail);
        let affordance = locate_visible(&self.source, &self.locators, Some(item), Role::DetailAffordance);

        let Some(affordance) = affordance else {
            self.set_state(HarvestState::ExtractingDetail);
            let extractor = Extractor::with_config(&self.locators, config);
            return extractor.extract_post(&mut self.source, item).await;
        };

        if let Err(e) = self.source.click(&affordance) {
            tracing::warn!(error = %e, "Could not open detail view");
        }
        settle(self.timing.detail_open).await;

        self.set_state(HarvestState::ExtractingDetail);
        let extractor = Extractor::with_config(&self.locators, config);
        let mut post = extractor.extract_detail(&mut self.source).await;
        if post.is_none() {
            tracing::debug!("Detail view missing, skipping item");
        }

        if let Some(post) = post.as_mut()
            && post.url.is_empty()
            && let Some(url) = self.permalink(item)
        {
            post.id = post_id_from_url(&url).unwrap_or_default();
            post.url = url;
        }

        self.set_state(HarvestState::ClosingDetail);
        self.close_detail().await;
        post
    }

    async fn close_detail(&mut self) {
        match locate_visible(&self.source, &self.locators, None, Role::CloseDetail) {
            Some(close) => {
                if let Err(e) = self.source.click(&close) {
                    tracing::warn!(error = %e, "Could not close detail view");
                }
                settle(self.timing.detail_close).await;
            }
            None => tracing::warn!("No close affordance found for detail view"),
        }
    }

    fn permalink(&self, item: &D::Element) -> Option<String> {
        locate(&self.source, &self.locators, Some(item), Role::Permalink)
            .and_then(|link| self.source.attribute(&link, "href"))
    }

    /// Identity of a feed item across scans: the post id from its
    /// permalink, else the permalink, else a fingerprint of its text.
    fn item_key(&self, item: &D::Element) -> String {
        match self.permalink(item) {
            Some(url) => post_id_from_url(&url).unwrap_or(url),
            None => fingerprint(&[&normalize_text(&self.source.text(item))]),
        }
    }

    fn flush(&mut self, session: ScrapeSession, reason: TerminationReason, events: &EventSender) -> HarvestOutcome {
        let now = OffsetDateTime::now_utc();
        let mut posts = session.batch;
        for post in &mut posts {
            normalize_post(post, now);
        }
        assign_ids(&mut posts);
        let batch = Dataset::from_posts(posts, &session.settings.collect);

        let merged = match self.store.merge(&batch) {
            Ok(outcome) => {
                if let Err(e) = self.store.analytics(&AnalyticsOptions::default()) {
                    tracing::warn!(error = %e, "Could not store analytics");
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not persist harvested batch");
                let _ = events.send(HarvestEvent::Error { context: "flush".to_string(), message: e.to_string() });
                None
            }
        };

        HarvestOutcome { reason, batch, merged }
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: HarvestState) {
        self.shared.status().state = state;
    }

    fn report(&self, session: &ScrapeSession, events: &EventSender) {
        let progress = session.progress();
        self.shared.status().progress = progress;
        tracing::debug!(posts_found = progress.posts_found, scroll_attempts = progress.scroll_attempts, "Progress");
        let _ = events.send(HarvestEvent::Progress(progress));
    }
}
