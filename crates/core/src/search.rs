//! Filtering over a stored dataset.
//!
//! All criteria are optional and combined with AND. The free-text query is
//! matched case-insensitively against an item's id, text, author and URLs.
//! Date bounds apply to `createdAt`, or `scrapedAt` when there is no
//! parseable creation time; items with neither are dropped by a date bound.
//! `minReactions` only applies to posts.

use serde::Serialize;
use time::OffsetDateTime;

use crate::model::{Comment, Dataset, EntityKind, Post, Profile};
use crate::normalize::{normalize_timestamp, parse_canonical};
use crate::{HarvestError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub kind: Option<EntityKind>,
    pub author: Option<String>,
    pub date_from: Option<OffsetDateTime>,
    pub date_to: Option<OffsetDateTime>,
    pub min_reactions: Option<u64>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn date_from(mut self, from: OffsetDateTime) -> Self {
        self.date_from = Some(from);
        self
    }

    pub fn date_to(mut self, to: OffsetDateTime) -> Self {
        self.date_to = Some(to);
        self
    }

    pub fn min_reactions(mut self, min: u64) -> Self {
        self.min_reactions = Some(min);
        self
    }

    /// Parses a date bound in any format the timestamp normalizer accepts.
    pub fn parse_date(raw: &str) -> Result<OffsetDateTime> {
        parse_canonical(&normalize_timestamp(raw))
            .ok_or_else(|| HarvestError::InvalidSettings(format!("unrecognized date '{raw}'")))
    }

    fn includes(&self, kind: EntityKind) -> bool {
        self.kind.is_none_or(|wanted| wanted == kind)
    }

    fn matches_text(&self, fields: &[&str]) -> bool {
        match &self.text {
            Some(query) if !query.is_empty() => {
                let query = query.to_lowercase();
                fields.iter().any(|field| field.to_lowercase().contains(&query))
            }
            _ => true,
        }
    }

    fn matches_author(&self, name: &str) -> bool {
        self.author.as_ref().is_none_or(|author| name.to_lowercase().contains(&author.to_lowercase()))
    }

    fn matches_date(&self, created_at: Option<&str>, scraped_at: Option<&str>) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(at) = created_at.and_then(parse_canonical).or_else(|| scraped_at.and_then(parse_canonical)) else {
            return false;
        };
        self.date_from.is_none_or(|from| at >= from) && self.date_to.is_none_or(|to| at <= to)
    }

    fn matches_post(&self, post: &Post) -> bool {
        self.matches_text(&[&post.id, &post.text, &post.author.display_name, &post.author.profile_url, &post.url])
            && self.matches_author(&post.author.display_name)
            && self.matches_date(post.created_at.as_deref(), post.scraped_at.as_deref())
            && self.min_reactions.is_none_or(|min| post.reaction_count.unwrap_or(0) >= min)
    }

    fn matches_comment(&self, comment: &Comment) -> bool {
        self.matches_text(&[
            &comment.id,
            &comment.post_id,
            &comment.text,
            &comment.author.display_name,
            &comment.author.profile_url,
        ]) && self.matches_author(&comment.author.display_name)
            && self.matches_date(comment.created_at.as_deref(), comment.scraped_at.as_deref())
    }

    fn matches_profile(&self, profile: &Profile) -> bool {
        self.matches_text(&[&profile.id, &profile.name, &profile.profile_url])
            && self.matches_author(&profile.name)
            && self.matches_date(None, profile.scraped_at.as_deref())
    }
}

/// Matching items, borrowed from the searched dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults<'a> {
    pub posts: Vec<&'a Post>,
    pub comments: Vec<&'a Comment>,
    pub profiles: Vec<&'a Profile>,
}

impl SearchResults<'_> {
    pub fn len(&self) -> usize {
        self.posts.len() + self.comments.len() + self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn search<'a>(dataset: &'a Dataset, query: &SearchQuery) -> SearchResults<'a> {
    let mut results = SearchResults::default();

    if query.includes(EntityKind::Posts) {
        results.posts = dataset.posts.iter().filter(|post| query.matches_post(post)).collect();
    }
    if query.includes(EntityKind::Comments) {
        results.comments = dataset.comments.iter().filter(|comment| query.matches_comment(comment)).collect();
    }
    if query.includes(EntityKind::Profiles) {
        results.profiles = dataset.profiles.iter().filter(|profile| query.matches_profile(profile)).collect();
    }

    tracing::debug!(matches = results.len(), "Search complete");
    results
}
