//! Content fingerprints for records without a natural id.
//!
//! A fingerprint is `fp-` followed by the first 16 hex digits of a SHA-256
//! over the record's structural fields. Timestamps are left out so the same
//! post harvested on two different days gets the same id.

use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::model::{Comment, Post, Profile};

pub const FINGERPRINT_PREFIX: &str = "fp-";

/// Fingerprint of an ordered list of fields.
pub fn fingerprint(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hasher.finalize();

    let mut id = String::with_capacity(FINGERPRINT_PREFIX.len() + 16);
    id.push_str(FINGERPRINT_PREFIX);
    for byte in &digest[..8] {
        let _ = write!(id, "{:02x}", byte);
    }
    id
}

/// A record stored in a keyed dataset collection.
pub trait Keyed {
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Id derived from the record's content.
    fn fingerprint(&self) -> String;

    /// The natural id, or the fingerprint when there is none.
    fn key(&self) -> String {
        if self.id().is_empty() { self.fingerprint() } else { self.id().to_string() }
    }

    /// Fills in the fingerprint when the record has no id.
    fn ensure_id(&mut self) {
        if self.id().is_empty() {
            let id = self.fingerprint();
            self.set_id(id);
        }
    }
}

impl Keyed for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn fingerprint(&self) -> String {
        fingerprint(&[&self.author.display_name, &self.author.profile_url, &self.text, &self.url])
    }
}

impl Keyed for Comment {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn fingerprint(&self) -> String {
        fingerprint(&[
            &self.author.display_name,
            &self.author.profile_url,
            &self.text,
            &self.post_id,
            self.parent_id.as_deref().unwrap_or_default(),
        ])
    }
}

impl Keyed for Profile {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn fingerprint(&self) -> String {
        fingerprint(&[&self.name, &self.profile_url])
    }
}

/// Gives every post, comment and reply in a harvested batch an id.
///
/// Comments and replies also get their `postId`, and replies their
/// `parentId`, before their own fingerprint is taken.
pub fn assign_ids(posts: &mut [Post]) {
    for post in posts.iter_mut() {
        post.ensure_id();
        assign_comment_ids(&mut post.comments, &post.id, None);
    }
}

fn assign_comment_ids(comments: &mut [Comment], post_id: &str, parent_id: Option<&str>) {
    for comment in comments.iter_mut() {
        if comment.post_id.is_empty() {
            comment.post_id = post_id.to_string();
        }
        comment.parent_id = parent_id.map(str::to_string);
        comment.ensure_id();
        assign_comment_ids(&mut comment.replies, post_id, Some(&comment.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;

    fn post(text: &str, scraped_at: &str) -> Post {
        Post {
            author: Author { display_name: "Ann".to_string(), profile_url: "https://example.com/ann".to_string() },
            text: text.to_string(),
            scraped_at: Some(scraped_at.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_fingerprint_format() {
        let id = fingerprint(&["a", "b"]);
        assert!(id.starts_with("fp-"));
        assert_eq!(id.len(), 19);
        assert!(id[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_field_boundaries_matter() {
        assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
    }

    #[test]
    fn test_stable_across_scrape_times() {
        let first = post("Hello", "2024-05-01T10:00:00Z");
        let second = post("Hello", "2024-06-01T10:00:00Z");
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.fingerprint(), post("Other", "2024-05-01T10:00:00Z").fingerprint());
    }

    #[test]
    fn test_natural_id_kept() {
        let mut post = post("Hello", "2024-05-01T10:00:00Z");
        post.id = "123".to_string();
        post.ensure_id();
        assert_eq!(post.id, "123");
        assert_eq!(post.key(), "123");
    }

    #[test]
    fn test_assign_ids_tree() {
        let mut posts = vec![Post {
            comments: vec![Comment {
                text: "First".to_string(),
                replies: vec![Comment { text: "Reply".to_string(), ..Default::default() }],
                ..Default::default()
            }],
            ..post("Hello", "2024-05-01T10:00:00Z")
        }];

        assign_ids(&mut posts);

        let post = &posts[0];
        let comment = &post.comments[0];
        let reply = &comment.replies[0];
        assert!(post.id.starts_with("fp-"));
        assert_eq!(comment.post_id, post.id);
        assert_eq!(reply.post_id, post.id);
        assert_eq!(reply.parent_id.as_deref(), Some(comment.id.as_str()));
        assert_ne!(comment.id, reply.id);
    }
}
