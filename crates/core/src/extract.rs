//! Turning a detail view or feed element into a typed post tree.
//!
//! Every field is located on its own through the [`LocatorSet`]; a field
//! whose locator matches nothing is left absent, it never fails the record.
//! Before comments are read, [`Extractor::expand_all`] clicks the visible
//! "more comments" and "view replies" affordances a bounded number of times.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::document::{
    DocumentSource, locate, locate_all, locate_all_visible, locate_outermost, locate_text, locate_visible,
};
use crate::locators::{LocatorSet, Role};
use crate::model::{Author, Comment, Post};
use crate::normalize::normalize_count;
use crate::settings::Timing;

/// Upper bound on expand passes over one detail view.
pub const EXPAND_ATTEMPTS: usize = 10;

/// Deepest reply level that is still extracted (top-level comments are 0).
pub const MAX_REPLY_DEPTH: usize = 8;

static RE_POST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:/posts/|/permalink/|[?&]story_fbid=)(\d+)").unwrap());
static RE_REPLY_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]reply_comment_id=(\d+)").unwrap());
static RE_COMMENT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]comment_id=(\d+)").unwrap());

/// Attributes holding a timestamp, in order of preference.
const TIMESTAMP_ATTRIBUTES: [&str; 2] = ["datetime", "data-utime"];

/// Configuration for extraction
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Settle delays after clicks
    pub timing: Timing,
    /// Maximum expand passes
    pub expand_attempts: usize,
    /// Maximum reply depth
    pub max_reply_depth: usize,
    /// Whether comments are expanded and extracted at all
    pub comments: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            expand_attempts: EXPAND_ATTEMPTS,
            max_reply_depth: MAX_REPLY_DEPTH,
            comments: true,
        }
    }
}

/// Extracts the post id from a permalink.
pub fn post_id_from_url(url: &str) -> Option<String> {
    RE_POST_ID.captures(url).map(|caps| caps[1].to_string())
}

/// Reply links carry both ids; the reply's own id wins.
fn comment_id_from_url(url: &str) -> Option<String> {
    RE_REPLY_ID
        .captures(url)
        .or_else(|| RE_COMMENT_ID.captures(url))
        .map(|caps| caps[1].to_string())
}

pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Reads posts and comment trees out of a document.
#[derive(Debug, Clone)]
pub struct Extractor<'a> {
    locators: &'a LocatorSet,
    config: ExtractConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(locators: &'a LocatorSet) -> Self {
        Self::with_config(locators, ExtractConfig::default())
    }

    pub fn with_config(locators: &'a LocatorSet, config: ExtractConfig) -> Self {
        Self { locators, config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extracts the post shown in the open detail view.
    ///
    /// Returns `None` when no detail view is present.
    pub async fn extract_detail<D: DocumentSource>(&self, source: &mut D) -> Option<Post> {
        let Some(root) = locate(source, self.locators, None, Role::DetailView) else {
            tracing::debug!("No detail view found");
            return None;
        };
        self.extract_post(source, &root).await
    }

    /// Extracts a post rooted at `root`, a detail view or a feed element.
    ///
    /// Returns `None` when `root` is no longer part of the visible document.
    pub async fn extract_post<D: DocumentSource>(&self, source: &mut D, root: &D::Element) -> Option<Post> {
        if !source.is_visible(root) {
            tracing::debug!(?root, "Post root is not visible");
            return None;
        }

        self.expand_text(source, root).await;

        let mut post = Post {
            text: locate_text(source, self.locators, Some(root), Role::PostText).unwrap_or_default(),
            author: self.author(source, root, Role::PostAuthor, None),
            created_at: self.timestamp(source, root),
            reaction_count: self.count(source, root, Role::ReactionCount),
            comment_count: self.count(source, root, Role::CommentCount),
            share_count: self.count(source, root, Role::ShareCount),
            ..Default::default()
        };

        let permalink = locate(source, self.locators, Some(root), Role::Permalink)
            .and_then(|link| source.attribute(&link, "href"));
        if let Some(url) = permalink {
            post.id = post_id_from_url(&url).unwrap_or_default();
            post.url = url;
        }

        post.comments = self.extract_comments(source, root).await;
        for comment in &mut post.comments {
            set_post_id(comment, &post.id);
        }

        Some(post)
    }

    /// Expands and extracts every comment under `root`.
    pub async fn extract_comments<D: DocumentSource>(&self, source: &mut D, root: &D::Element) -> Vec<Comment> {
        if !self.config.comments {
            return Vec::new();
        }

        let clicks = self.expand_all(source, root).await;
        tracing::debug!(clicks, "Expanded comment threads");

        let source: &D = source;
        let scope = locate(source, self.locators, Some(root), Role::CommentContainer).unwrap_or_else(|| root.clone());
        locate_outermost(source, self.locators, Some(&scope), Role::Comment)
            .iter()
            .map(|element| self.extract_comment(source, element, 0))
            .collect()
    }

    /// Maps one comment element, recursing into its replies.
    pub fn extract_comment<D: DocumentSource>(&self, source: &D, element: &D::Element, depth: usize) -> Comment {
        let nested = locate_all(source, self.locators, Some(element), Role::Reply);

        let text = self
            .own(source, element, Role::CommentText, &nested)
            .map(|text_element| source.text(&text_element))
            .unwrap_or_default();

        let own_timestamp = self.own(source, element, Role::Timestamp, &nested);
        let id = source
            .attribute(element, "data-comment-id")
            .or_else(|| {
                own_timestamp
                    .as_ref()
                    .and_then(|ts| source.attribute(ts, "href"))
                    .and_then(|href| comment_id_from_url(&href))
            })
            .unwrap_or_default();

        let replies = if depth + 1 > self.config.max_reply_depth {
            if !nested.is_empty() {
                tracing::debug!(depth, "Reply depth limit reached, dropping deeper replies");
            }
            Vec::new()
        } else {
            locate_outermost(source, self.locators, Some(element), Role::Reply)
                .iter()
                .map(|reply| self.extract_comment(source, reply, depth + 1))
                .collect()
        };

        Comment {
            id,
            author: self.author(source, element, Role::CommentAuthor, Some(&nested)),
            text,
            created_at: own_timestamp.and_then(|ts| self.timestamp_value(source, &ts)),
            replies,
            ..Default::default()
        }
    }

    /// Clicks visible expand affordances until a pass finds none.
    ///
    /// Each pass clicks the first visible "more comments" affordance and
    /// every visible "view replies" affordance. Returns the number of clicks.
    pub async fn expand_all<D: DocumentSource>(&self, source: &mut D, root: &D::Element) -> usize {
        let mut clicks = 0;

        for attempt in 0..self.config.expand_attempts {
            let mut targets: Vec<D::Element> =
                locate_visible(source, self.locators, Some(root), Role::ExpandComments).into_iter().collect();
            for element in locate_all_visible(source, self.locators, Some(root), Role::ExpandReplies) {
                if !targets.contains(&element) {
                    targets.push(element);
                }
            }

            if targets.is_empty() {
                break;
            }

            tracing::trace!(attempt, targets = targets.len(), "Expanding comments");
            for element in targets {
                if let Err(e) = source.click(&element) {
                    tracing::warn!(error = %e, "Expand click failed");
                }
                clicks += 1;
                settle(self.config.timing.expand).await;
            }
        }

        clicks
    }

    async fn expand_text<D: DocumentSource>(&self, source: &mut D, root: &D::Element) {
        let Some(see_more) = locate_visible(source, self.locators, Some(root), Role::SeeMore) else {
            return;
        };
        match source.click(&see_more) {
            Ok(()) => settle(self.config.timing.see_more).await,
            Err(e) => tracing::warn!(error = %e, "See more click failed"),
        }
    }

    /// First element for `role` under `scope` that is not inside one of
    /// the `nested` elements.
    fn own<D: DocumentSource>(
        &self, source: &D, scope: &D::Element, role: Role, nested: &[D::Element],
    ) -> Option<D::Element> {
        for selector in self.locators.selectors(role) {
            let candidates = source.query_all(Some(scope), selector);
            if candidates.is_empty() {
                continue;
            }
            let inside: Vec<D::Element> = nested
                .iter()
                .flat_map(|n| std::iter::once(n.clone()).chain(source.query_all(Some(n), selector)))
                .collect();
            if let Some(found) = candidates.into_iter().find(|c| !inside.contains(c)) {
                return Some(found);
            }
        }
        None
    }

    fn author<D: DocumentSource>(
        &self, source: &D, scope: &D::Element, role: Role, nested: Option<&[D::Element]>,
    ) -> Author {
        let element = match nested {
            Some(nested) => self.own(source, scope, role, nested),
            None => locate(source, self.locators, Some(scope), role),
        };
        let Some(element) = element else {
            return Author::default();
        };

        let profile_url = source
            .attribute(&element, "href")
            .or_else(|| source.query(Some(&element), "a[href]").and_then(|a| source.attribute(&a, "href")))
            .unwrap_or_default();

        Author { display_name: source.text(&element), profile_url }
    }

    fn timestamp<D: DocumentSource>(&self, source: &D, scope: &D::Element) -> Option<String> {
        let element = locate(source, self.locators, Some(scope), Role::Timestamp)?;
        self.timestamp_value(source, &element)
    }

    /// Raw timestamp text; normalized later.
    fn timestamp_value<D: DocumentSource>(&self, source: &D, element: &D::Element) -> Option<String> {
        TIMESTAMP_ATTRIBUTES
            .iter()
            .find_map(|name| source.attribute(element, name))
            .or_else(|| Some(source.text(element)).filter(|text| !text.trim().is_empty()))
            .or_else(|| source.attribute(element, "aria-label"))
            .or_else(|| source.attribute(element, "title"))
    }

    fn count<D: DocumentSource>(&self, source: &D, scope: &D::Element, role: Role) -> Option<u64> {
        let element = locate(source, self.locators, Some(scope), role)?;
        normalize_count(&source.text(&element))
            .or_else(|| source.attribute(&element, "aria-label").and_then(|label| normalize_count(&label)))
    }
}

fn set_post_id(comment: &mut Comment, post_id: &str) {
    comment.post_id = post_id.to_string();
    for reply in &mut comment.replies {
        set_post_id(reply, post_id);
    }
}
