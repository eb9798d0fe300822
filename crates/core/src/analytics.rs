//! Aggregate statistics over a dataset.
//!
//! A snapshot is always recomputed from the whole dataset; nothing is
//! updated incrementally. Posts and comments are dated by `createdAt` when it
//! parses and by `scrapedAt` otherwise.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::model::{Author, Dataset, Post, UNKNOWN_AUTHOR};
use crate::normalize::{format_canonical, parse_canonical};

/// Engagement bands, inclusive upper bounds (the last band is open).
const ENGAGEMENT_BANDS: [(&str, u64); 4] = [("0-10", 10), ("11-50", 50), ("51-200", 200), ("201+", u64::MAX)];
const COMMENT_BANDS: [(&str, u64); 4] = [("0", 0), ("1-5", 5), ("6-20", 20), ("21+", u64::MAX)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsOptions {
    /// Length of the daily activity window, ending today (default: 30).
    pub window_days: u32,
    /// Length of the top author and top commentator lists (default: 10).
    pub top_k: usize,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self { window_days: 30, top_k: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub generated_at: String,
    pub total_posts: usize,
    pub total_comments: usize,
    pub total_profiles: usize,
    /// Sum of reactions, comments and shares over all posts.
    pub total_engagement: u64,
    /// One entry per day of the window, oldest first.
    pub daily: Vec<DailyCount>,
    pub time_stats: TimeStats,
    pub author_stats: AuthorStats,
    pub engagement_histogram: Vec<Band>,
    pub comment_histogram: Vec<Band>,
    pub activity_stats: ActivityStats,
    pub comment_stats: CommentStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    /// `YYYY-MM-DD`
    pub date: String,
    pub posts: usize,
    pub comments: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeStats {
    pub first_post: Option<String>,
    pub last_post: Option<String>,
    /// Calendar span from the first to the last post, both included.
    pub total_days: u64,
    /// Distinct days with at least one post.
    pub active_days: usize,
    pub average_per_active_day: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorStats {
    pub total_authors: usize,
    pub top_authors: Vec<AuthorCount>,
    pub average_posts_per_author: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorCount {
    pub name: String,
    pub posts: usize,
    pub reactions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total_reactions: u64,
    pub total_comments: u64,
    pub total_shares: u64,
    pub average_reactions: f64,
    pub average_comments: f64,
    pub average_shares: f64,
    /// Percentage of posts with at least one of each signal.
    pub engagement_rate: EngagementRate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRate {
    pub reactions: f64,
    pub comments: f64,
    pub shares: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStats {
    pub total_comments: usize,
    pub posts_with_comments: usize,
    pub average_comments_per_post: f64,
    pub top_commentators: Vec<CommentatorCount>,
    pub unique_commentators: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentatorCount {
    pub name: String,
    pub comments: usize,
}

/// Computes a snapshot as of now with default options.
pub fn compute(dataset: &Dataset) -> AnalyticsSnapshot {
    compute_at(dataset, OffsetDateTime::now_utc(), &AnalyticsOptions::default())
}

/// Computes a snapshot as of `now`.
pub fn compute_at(dataset: &Dataset, now: OffsetDateTime, options: &AnalyticsOptions) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        generated_at: format_canonical(now).unwrap_or_default(),
        total_posts: dataset.posts.len(),
        total_comments: dataset.comments.len(),
        total_profiles: dataset.profiles.len(),
        total_engagement: dataset.posts.iter().map(Post::engagement).fold(0, u64::saturating_add),
        daily: daily_counts(dataset, now.date(), options.window_days),
        time_stats: time_stats(&dataset.posts),
        author_stats: author_stats(&dataset.posts, options.top_k),
        engagement_histogram: histogram(&ENGAGEMENT_BANDS, dataset.posts.iter().map(Post::engagement)),
        comment_histogram: histogram(&COMMENT_BANDS, dataset.posts.iter().map(|p| p.comment_count.unwrap_or(0))),
        activity_stats: activity_stats(&dataset.posts),
        comment_stats: comment_stats(dataset, options.top_k),
    }
}

/// The moment an item is attributed to: `createdAt` when it parses,
/// otherwise `scrapedAt`.
fn item_time(created_at: Option<&str>, scraped_at: Option<&str>) -> Option<OffsetDateTime> {
    created_at.and_then(parse_canonical).or_else(|| scraped_at.and_then(parse_canonical))
}

fn daily_counts(dataset: &Dataset, today: Date, window_days: u32) -> Vec<DailyCount> {
    if window_days == 0 {
        return Vec::new();
    }
    let first = today - Duration::days(i64::from(window_days) - 1);

    let mut days: Vec<DailyCount> = (0..window_days)
        .filter_map(|offset| first.checked_add(Duration::days(i64::from(offset))))
        .map(|date| DailyCount { date: date.to_string(), posts: 0, comments: 0 })
        .collect();

    let slot = |at: Option<OffsetDateTime>| -> Option<usize> {
        let date = at?.date();
        if date < first || date > today {
            return None;
        }
        usize::try_from((date - first).whole_days()).ok()
    };

    for post in &dataset.posts {
        if let Some(index) = slot(item_time(post.created_at.as_deref(), post.scraped_at.as_deref()))
            && let Some(day) = days.get_mut(index)
        {
            day.posts += 1;
        }
    }
    for comment in &dataset.comments {
        if let Some(index) = slot(item_time(comment.created_at.as_deref(), comment.scraped_at.as_deref()))
            && let Some(day) = days.get_mut(index)
        {
            day.comments += 1;
        }
    }

    days
}

fn time_stats(posts: &[Post]) -> TimeStats {
    let mut times: Vec<OffsetDateTime> = posts
        .iter()
        .filter_map(|p| item_time(p.created_at.as_deref(), p.scraped_at.as_deref()))
        .collect();
    times.sort();

    let (Some(first), Some(last)) = (times.first().copied(), times.last().copied()) else {
        return TimeStats::default();
    };

    let active_days = times.iter().map(|t| t.date()).collect::<HashSet<_>>().len();
    TimeStats {
        first_post: format_canonical(first),
        last_post: format_canonical(last),
        total_days: u64::try_from((last.date() - first.date()).whole_days()).unwrap_or(0) + 1,
        active_days,
        average_per_active_day: times.len() as f64 / active_days as f64,
    }
}

/// Counts keyed by name, in first-seen order.
struct Tally<V> {
    order: Vec<(String, usize, V)>,
    index: HashMap<String, usize>,
}

impl<V: Default> Tally<V> {
    fn new() -> Self {
        Self { order: Vec::new(), index: HashMap::new() }
    }

    fn entry(&mut self, name: &str) -> (&mut usize, &mut V) {
        let position = *self.index.entry(name.to_string()).or_insert_with(|| {
            self.order.push((name.to_string(), 0, V::default()));
            self.order.len() - 1
        });
        let (_, count, value) = &mut self.order[position];
        (count, value)
    }

    /// Highest counts first; ties keep first-seen order.
    fn top(mut self, k: usize) -> Vec<(String, usize, V)> {
        self.order.sort_by(|a, b| b.1.cmp(&a.1));
        self.order.truncate(k);
        self.order
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

fn is_known(author: &Author) -> bool {
    !author.display_name.is_empty() && author.display_name != UNKNOWN_AUTHOR
}

fn author_stats(posts: &[Post], top_k: usize) -> AuthorStats {
    let mut tally: Tally<u64> = Tally::new();
    for post in posts.iter().filter(|p| is_known(&p.author)) {
        let (count, reactions) = tally.entry(&post.author.display_name);
        *count += 1;
        *reactions = reactions.saturating_add(post.reaction_count.unwrap_or(0));
    }

    let total_authors = tally.len();
    AuthorStats {
        total_authors,
        average_posts_per_author: ratio(posts.len() as f64, total_authors),
        top_authors: tally
            .top(top_k)
            .into_iter()
            .map(|(name, posts, reactions)| AuthorCount { name, posts, reactions })
            .collect(),
    }
}

fn histogram(bands: &[(&str, u64)], values: impl Iterator<Item = u64>) -> Vec<Band> {
    let mut counts = vec![0usize; bands.len()];
    for value in values {
        if let Some(index) = bands.iter().position(|(_, upper)| value <= *upper) {
            counts[index] += 1;
        }
    }
    bands
        .iter()
        .zip(counts)
        .map(|((label, _), count)| Band { label: label.to_string(), count })
        .collect()
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 { 0.0 } else { numerator / denominator as f64 }
}

fn activity_stats(posts: &[Post]) -> ActivityStats {
    let total = |f: fn(&Post) -> Option<u64>| posts.iter().map(|p| f(p).unwrap_or(0)).fold(0, u64::saturating_add);
    let share_with = |f: fn(&Post) -> Option<u64>| {
        ratio(posts.iter().filter(|p| f(p).unwrap_or(0) > 0).count() as f64 * 100.0, posts.len())
    };

    let total_reactions = total(|p| p.reaction_count);
    let total_comments = total(|p| p.comment_count);
    let total_shares = total(|p| p.share_count);

    ActivityStats {
        total_reactions,
        total_comments,
        total_shares,
        average_reactions: ratio(total_reactions as f64, posts.len()),
        average_comments: ratio(total_comments as f64, posts.len()),
        average_shares: ratio(total_shares as f64, posts.len()),
        engagement_rate: EngagementRate {
            reactions: share_with(|p| p.reaction_count),
            comments: share_with(|p| p.comment_count),
            shares: share_with(|p| p.share_count),
        },
    }
}

fn comment_stats(dataset: &Dataset, top_k: usize) -> CommentStats {
    let mut tally: Tally<()> = Tally::new();
    for comment in dataset.comments.iter().filter(|c| is_known(&c.author)) {
        *tally.entry(&comment.author.display_name).0 += 1;
    }

    let posts_with_comments = dataset
        .comments
        .iter()
        .map(|c| c.post_id.as_str())
        .filter(|id| !id.is_empty())
        .collect::<HashSet<_>>()
        .len();

    CommentStats {
        total_comments: dataset.comments.len(),
        posts_with_comments,
        average_comments_per_post: ratio(dataset.comments.len() as f64, dataset.posts.len()),
        unique_commentators: tally.len(),
        top_commentators: tally
            .top(top_k)
            .into_iter()
            .map(|(name, comments, ())| CommentatorCount { name, comments })
            .collect(),
    }
}
