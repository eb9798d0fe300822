//! CSV export, one entity type per file.
//!
//! Fields containing a comma, a double quote or a newline are wrapped in
//! double quotes with inner quotes doubled. Everything else is written as is.

use crate::model::{Dataset, EntityKind};

const POST_HEADERS: [&str; 10] = [
    "ID",
    "Text",
    "Author Name",
    "Author Profile",
    "Timestamp",
    "Reactions",
    "CommentsCount",
    "SharesCount",
    "URL",
    "ScrapedAt",
];
const COMMENT_HEADERS: [&str; 7] = ["ID", "Post ID", "Text", "Author Name", "Author Profile", "Timestamp", "ScrapedAt"];
const PROFILE_HEADERS: [&str; 4] = ["ID", "Name", "Profile URL", "ScrapedAt"];

/// Quotes a field when it contains a comma, quote or line break.
pub fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) { format!("\"{}\"", value.replace('"', "\"\"")) } else { value.to_string() }
}

/// Renders one collection of the dataset as CSV, header first.
pub fn to_csv(dataset: &Dataset, kind: EntityKind) -> String {
    let (headers, rows): (&[&str], Vec<Vec<String>>) = match kind {
        EntityKind::Posts => (
            &POST_HEADERS[..],
            dataset
                .posts
                .iter()
                .map(|post| {
                    vec![
                        escape_csv(&post.id),
                        escape_csv(&post.text),
                        escape_csv(&post.author.display_name),
                        escape_csv(&post.author.profile_url),
                        escape_csv(post.created_at.as_deref().unwrap_or_default()),
                        post.reaction_count.unwrap_or(0).to_string(),
                        post.comment_count.unwrap_or(0).to_string(),
                        post.share_count.unwrap_or(0).to_string(),
                        escape_csv(&post.url),
                        escape_csv(post.scraped_at.as_deref().unwrap_or_default()),
                    ]
                })
                .collect(),
        ),
        EntityKind::Comments => (
            &COMMENT_HEADERS[..],
            dataset
                .comments
                .iter()
                .map(|comment| {
                    vec![
                        escape_csv(&comment.id),
                        escape_csv(&comment.post_id),
                        escape_csv(&comment.text),
                        escape_csv(&comment.author.display_name),
                        escape_csv(&comment.author.profile_url),
                        escape_csv(comment.created_at.as_deref().unwrap_or_default()),
                        escape_csv(comment.scraped_at.as_deref().unwrap_or_default()),
                    ]
                })
                .collect(),
        ),
        EntityKind::Profiles => (
            &PROFILE_HEADERS[..],
            dataset
                .profiles
                .iter()
                .map(|profile| {
                    vec![
                        escape_csv(&profile.id),
                        escape_csv(&profile.name),
                        escape_csv(&profile.profile_url),
                        escape_csv(profile.scraped_at.as_deref().unwrap_or_default()),
                    ]
                })
                .collect(),
        ),
    };

    std::iter::once(headers.join(","))
        .chain(rows.into_iter().map(|row| row.join(",")))
        .collect::<Vec<_>>()
        .join("\n")
}
