//! Record types for harvested discussions.
//!
//! A harvest produces a tree per post: [`Post`] owns its [`Comment`]s, and a
//! comment owns its replies (replies use the same [`Comment`] type). The
//! [`Dataset`] is the flat, keyed view the store persists: every post, every
//! comment or reply, and every author profile, each collection keyed by `id`.
//!
//! Field names are serialized in camelCase (`postId`, `profileUrl`,
//! `createdAt`) which is also the layout of the persisted dataset and the JSON
//! export.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::HarvestError;
use crate::settings::Collect;

/// Display name used when an author could not be resolved.
pub const UNKNOWN_AUTHOR: &str = "Unknown User";

/// An RFC 3339 timestamp, or the raw text when it could not be parsed.
pub type CanonicalTimestamp = String;

/// A reply is a comment nested under another comment.
pub type Reply = Comment;

/// The author of a post, comment or reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub display_name: String,
    #[serde(default)]
    pub profile_url: String,
}

impl Default for Author {
    fn default() -> Self {
        Self { display_name: UNKNOWN_AUTHOR.to_string(), profile_url: String::new() }
    }
}

/// A comment on a post, or a reply to a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Natural id when the document exposes one, otherwise a fingerprint
    /// assigned before merging. Empty until then.
    #[serde(default)]
    pub id: String,
    /// Id of the post this comment belongs to. Index only.
    #[serde(default)]
    pub post_id: String,
    /// Id of the comment this one replies to, set when flattening.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<CanonicalTimestamp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<CanonicalTimestamp>,
}

impl Comment {
    /// Number of comments in this subtree, including this one.
    pub fn tree_size(&self) -> usize {
        1 + self.replies.iter().map(Comment::tree_size).sum::<usize>()
    }
}

/// A harvested post with its comment tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<CanonicalTimestamp>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_count: Option<u64>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<CanonicalTimestamp>,
}

impl Post {
    /// Sum of reactions, comments and shares. Absent counts contribute zero.
    pub fn engagement(&self) -> u64 {
        [self.reaction_count, self.comment_count, self.share_count]
            .into_iter()
            .flatten()
            .fold(0, u64::saturating_add)
    }

    /// Every comment and reply under this post, depth first.
    pub fn all_comments(&self) -> Vec<&Comment> {
        fn walk<'a>(comments: &'a [Comment], out: &mut Vec<&'a Comment>) {
            for comment in comments {
                out.push(comment);
                walk(&comment.replies, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.comments, &mut out);
        out
    }
}

/// An author profile collected while harvesting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<CanonicalTimestamp>,
}

impl Profile {
    /// Builds a profile from an author; the profile URL doubles as the id.
    pub fn from_author(author: &Author, scraped_at: Option<CanonicalTimestamp>) -> Self {
        Self {
            id: author.profile_url.clone(),
            name: author.display_name.clone(),
            profile_url: author.profile_url.clone(),
            scraped_at,
        }
    }
}

/// One of the three dataset collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Posts,
    Comments,
    Profiles,
}

impl FromStr for EntityKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "posts" => Ok(EntityKind::Posts),
            "comments" => Ok(EntityKind::Comments),
            "profiles" => Ok(EntityKind::Profiles),
            other => Err(HarvestError::UnsupportedExport(other.to_string())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Posts => "posts",
            EntityKind::Comments => "comments",
            EntityKind::Profiles => "profiles",
        })
    }
}

/// The three keyed collections the store persists.
///
/// Each collection keeps insertion order and never holds two entries with
/// the same `id` once it has gone through [`crate::store::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a batch from harvested posts.
    ///
    /// Posts must already carry ids (see [`crate::fingerprint::assign_ids`]).
    /// Comments and replies are flattened into the comments collection with
    /// their `parentId` set and their own reply lists emptied. Profiles are
    /// collected from every author with a profile URL, first occurrence wins.
    pub fn from_posts(posts: Vec<Post>, collect: &Collect) -> Self {
        let mut batch = Dataset::new();

        for post in &posts {
            if collect.comments {
                flatten_comments(&post.comments, None, &mut batch.comments);
            }

            if collect.profiles {
                let authors = std::iter::once(&post.author).chain(post.all_comments().into_iter().map(|c| &c.author));
                for author in authors {
                    if author.profile_url.is_empty() || batch.profiles.iter().any(|p| p.id == author.profile_url) {
                        continue;
                    }
                    batch.profiles.push(Profile::from_author(author, post.scraped_at.clone()));
                }
            }
        }

        if collect.posts {
            batch.posts = posts;
        }

        batch
    }

    /// Total number of records across the three collections.
    pub fn len(&self) -> usize {
        self.posts.len() + self.comments.len() + self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn flatten_comments(comments: &[Comment], parent_id: Option<&str>, out: &mut Vec<Comment>) {
    for comment in comments {
        let mut flat = comment.clone();
        flat.parent_id = parent_id.map(str::to_string);
        flat.replies = Vec::new();
        out.push(flat);
        flatten_comments(&comment.replies, Some(&comment.id), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(name: &str, url: &str) -> Author {
        Author { display_name: name.to_string(), profile_url: url.to_string() }
    }

    fn sample_post() -> Post {
        Post {
            id: "p1".to_string(),
            author: author("Ann", "https://example.com/ann"),
            text: "Hello".to_string(),
            reaction_count: Some(4),
            comment_count: Some(2),
            comments: vec![Comment {
                id: "c1".to_string(),
                post_id: "p1".to_string(),
                author: author("Bob", "https://example.com/bob"),
                text: "First".to_string(),
                replies: vec![Comment {
                    id: "r1".to_string(),
                    post_id: "p1".to_string(),
                    author: author("Ann", "https://example.com/ann"),
                    text: "Thanks".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            scraped_at: Some("2024-05-01T10:00:00Z".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_author_default_is_sentinel() {
        let author = Author::default();
        assert_eq!(author.display_name, UNKNOWN_AUTHOR);
        assert!(author.profile_url.is_empty());
    }

    #[test]
    fn test_engagement_ignores_missing_counts() {
        let post = sample_post();
        assert_eq!(post.engagement(), 6);
        assert_eq!(Post::default().engagement(), 0);
    }

    #[test]
    fn test_all_comments_depth_first() {
        let post = sample_post();
        let ids: Vec<&str> = post.all_comments().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "r1"]);
        assert_eq!(post.comments[0].tree_size(), 2);
    }

    #[test]
    fn test_from_posts_flattens_comments_and_profiles() {
        let batch = Dataset::from_posts(vec![sample_post()], &Collect::default());

        assert_eq!(batch.posts.len(), 1);
        assert_eq!(batch.comments.len(), 2);
        assert_eq!(batch.comments[0].parent_id, None);
        assert_eq!(batch.comments[1].parent_id.as_deref(), Some("c1"));
        assert!(batch.comments.iter().all(|c| c.replies.is_empty()));

        let names: Vec<&str> = batch.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bob"]);
    }

    #[test]
    fn test_from_posts_respects_collect_flags() {
        let collect = Collect { posts: true, comments: false, profiles: false };
        let batch = Dataset::from_posts(vec![sample_post()], &collect);
        assert_eq!(batch.posts.len(), 1);
        assert!(batch.comments.is_empty());
        assert!(batch.profiles.is_empty());
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let json = serde_json::to_string(&sample_post()).unwrap();
        assert!(json.contains(r#""displayName":"Ann""#));
        assert!(json.contains(r#""profileUrl":"https://example.com/ann""#));
        assert!(json.contains(r#""postId":"p1""#));
        assert!(json.contains(r#""reactionCount":4"#));
        assert!(!json.contains("shareCount"));
    }

    #[test]
    fn test_deserialize_tolerates_missing_fields() {
        let post: Post = serde_json::from_str(r#"{"text":"only text"}"#).unwrap();
        assert!(post.id.is_empty());
        assert_eq!(post.author.display_name, UNKNOWN_AUTHOR);
        assert!(post.comments.is_empty());
    }
}
