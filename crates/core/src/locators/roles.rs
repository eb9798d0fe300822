use crate::error::{HarvestError, Result};
use scraper::Selector;
use std::collections::HashMap;
use std::fmt;

/// Semantic role an element plays in a feed or detail view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// A single item in the feed
    PostContainer,
    PostText,
    PostAuthor,
    Timestamp,
    ReactionCount,
    CommentCount,
    ShareCount,
    /// Link carrying the post's permanent URL (and its id)
    Permalink,

    /// Affordance that opens the detail view of a feed item
    DetailAffordance,
    /// Root of an open detail view
    DetailView,
    /// Affordance that closes the detail view
    CloseDetail,

    CommentContainer,
    Comment,
    CommentText,
    CommentAuthor,
    Reply,

    /// Truncation affordance ("See more")
    SeeMore,
    /// "View more comments" / "View previous comments"
    ExpandComments,
    /// "View replies"
    ExpandReplies,
}

impl Role {
    pub const ALL: [Role; 19] = [
        Role::PostContainer,
        Role::PostText,
        Role::PostAuthor,
        Role::Timestamp,
        Role::ReactionCount,
        Role::CommentCount,
        Role::ShareCount,
        Role::Permalink,
        Role::DetailAffordance,
        Role::DetailView,
        Role::CloseDetail,
        Role::CommentContainer,
        Role::Comment,
        Role::CommentText,
        Role::CommentAuthor,
        Role::Reply,
        Role::SeeMore,
        Role::ExpandComments,
        Role::ExpandReplies,
    ];

    /// Key used for this role in locator files
    pub fn key(self) -> &'static str {
        match self {
            Role::PostContainer => "post_container",
            Role::PostText => "post_text",
            Role::PostAuthor => "post_author",
            Role::Timestamp => "timestamp",
            Role::ReactionCount => "reaction_count",
            Role::CommentCount => "comment_count",
            Role::ShareCount => "share_count",
            Role::Permalink => "permalink",
            Role::DetailAffordance => "detail_affordance",
            Role::DetailView => "detail_view",
            Role::CloseDetail => "close_detail",
            Role::CommentContainer => "comment_container",
            Role::Comment => "comment",
            Role::CommentText => "comment_text",
            Role::CommentAuthor => "comment_author",
            Role::Reply => "reply",
            Role::SeeMore => "see_more",
            Role::ExpandComments => "expand_comments",
            Role::ExpandReplies => "expand_replies",
        }
    }

    pub fn from_key(key: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.key() == key)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Represents a single line of a locator file
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Table version
    Version(u32),
    /// Another query expression for a role, tried after the ones before it
    Locator(Role, String),
    /// Drop every expression for a role (including inherited ones)
    Clear(Role),
}

/// Versioned table of query expressions per role
///
/// Expressions for a role are tried in order until one matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatorSet {
    pub version: u32,
    table: HashMap<Role, Vec<String>>,
    cleared: Vec<Role>,
}

impl LocatorSet {
    /// Create an empty locator set
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in locators for the feed layout this tool was first written against
    pub fn builtin() -> Self {
        let mut set = Self { version: 1, ..Self::default() };
        let entries: &[(Role, &[&str])] = &[
            (
                Role::PostContainer,
                &[r#"div[role="feed"] > div[data-pagelet^="FeedUnit_"]"#, r#"div[role="feed"] > div > div[role="article"]"#],
            ),
            (
                Role::PostText,
                &[r#"div[data-ad-preview="message"]"#, r#"div[data-testid="post_message"]"#, r#"div[dir="auto"]"#],
            ),
            (
                Role::PostAuthor,
                &[
                    r#"h2 strong > span > a[role="link"]"#,
                    r#"strong > span > a[role="link"]"#,
                    r#"a[role="link"][tabindex="0"][href*="facebook.com/"]"#,
                ],
            ),
            (
                Role::Timestamp,
                &[
                    "abbr[data-utime]",
                    "time[datetime]",
                    r#"a[role="link"][tabindex="0"][href*="/posts/"]"#,
                    r#"a[role="link"][tabindex="0"][href*="/permalink/"]"#,
                ],
            ),
            (Role::ReactionCount, &[r#"div[aria-label*="reactions"]"#, r#"span[aria-label*="reactions"]"#]),
            (
                Role::CommentCount,
                &[r#"div[data-testid="UFI2CommentsCount/root"]"#, r#"span[data-testid="UFI2CommentsCount/root"]"#],
            ),
            (
                Role::ShareCount,
                &[r#"div[data-testid="UFI2SharesCount/root"]"#, r#"span[data-testid="UFI2SharesCount/root"]"#],
            ),
            (Role::Permalink, &[r#"a[href*="/posts/"]"#, r#"a[href*="/permalink/"]"#]),
            (
                Role::DetailAffordance,
                &[r#"div[role="button"][aria-label*="comment"]"#, r#"div[role="button"][aria-label*="Comment"]"#],
            ),
            (Role::DetailView, &[r#"div[role="dialog"]"#, r#"div[aria-modal="true"]"#]),
            (
                Role::CloseDetail,
                &[r#"div[aria-label="Close"]"#, r#"div[role="button"][aria-label*="Close"]"#],
            ),
            (
                Role::CommentContainer,
                &[r#"div[role="feed"][aria-label="Comments"]"#, r#"ul[aria-label="Comments"]"#],
            ),
            (
                Role::Comment,
                &[r#"div[role="article"][data-testid="UFI2Comment/root"]"#, r#"div[role="article"][aria-label^="Comment"]"#],
            ),
            (
                Role::CommentText,
                &[r#"div[data-testid="comment-content"] span[dir="auto"]"#, r#"div[dir="auto"]"#],
            ),
            (Role::CommentAuthor, &[r#"a[data-testid="comment-author-link"]"#, r#"a[role="link"]"#]),
            (
                Role::Reply,
                &[r#"div[role="article"][aria-label^="Reply"]"#, r#"div[role="article"][data-testid="UFI2Comment/root"]"#],
            ),
            (Role::SeeMore, &[r#"div[role="button"][tabindex="0"][aria-label*="See more"]"#]),
            (
                Role::ExpandComments,
                &[
                    r#"div[role="button"][aria-label*="View more comments"]"#,
                    r#"div[role="button"][aria-label*="more comments"]"#,
                    r#"div[role="button"][aria-label*="View previous comments"]"#,
                ],
            ),
            (
                Role::ExpandReplies,
                &[r#"div[role="button"][tabindex="0"][aria-label*="replies"]"#, r#"div[role="button"][tabindex="0"][aria-label*="View"]"#],
            ),
        ];

        for (role, selectors) in entries {
            for selector in *selectors {
                set.push(*role, selector);
            }
        }
        set
    }

    /// Add an expression after the existing ones for `role`
    pub fn push(&mut self, role: Role, selector: &str) {
        let selectors = self.table.entry(role).or_default();
        if !selectors.iter().any(|s| s == selector) {
            selectors.push(selector.to_string());
        }
    }

    /// Builder-style variant of [`LocatorSet::push`]
    pub fn with(mut self, role: Role, selector: &str) -> Self {
        self.push(role, selector);
        self
    }

    /// Remove every expression for `role`
    pub fn clear(&mut self, role: Role) {
        self.table.remove(&role);
        if !self.cleared.contains(&role) {
            self.cleared.push(role);
        }
    }

    /// Add a directive to this set
    pub fn add_directive(&mut self, directive: Directive) {
        match directive {
            Directive::Version(version) => self.version = version,
            Directive::Locator(role, selector) => self.push(role, &selector),
            Directive::Clear(role) => self.clear(role),
        }
    }

    /// Expressions for `role`, in the order they are tried
    pub fn selectors(&self, role: Role) -> &[String] {
        self.table.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any expression is configured for `role`
    pub fn has(&self, role: Role) -> bool {
        !self.selectors(role).is_empty()
    }

    /// Overlay another set on top of this one
    ///
    /// The overlay's expressions for a role are tried before this set's, and
    /// roles the overlay clears are dropped here too. A non-zero overlay
    /// version replaces this set's version.
    pub fn merge(&mut self, overlay: &LocatorSet) {
        for role in &overlay.cleared {
            self.clear(*role);
        }

        for (role, selectors) in &overlay.table {
            let existing = self.table.remove(role).unwrap_or_default();
            let mut combined = selectors.clone();
            combined.extend(existing.into_iter().filter(|s| !selectors.contains(s)));
            self.table.insert(*role, combined);
        }

        if overlay.version != 0 {
            self.version = overlay.version;
        }
    }

    /// Check that every expression parses as a CSS selector
    pub fn validate(&self) -> Result<()> {
        for role in Role::ALL {
            for selector in self.selectors(role) {
                Selector::parse(selector).map_err(|e| HarvestError::InvalidSelector {
                    selector: selector.clone(),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Check if this set has no expressions at all
    pub fn is_empty(&self) -> bool {
        self.table.values().all(Vec::is_empty)
    }
}

/// Parse a directive line from a locator file
pub fn parse_directive(line: &str) -> Result<Directive> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Err(HarvestError::LocatorError("Empty or comment line".to_string()));
    }

    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| HarvestError::LocatorError(format!("Invalid directive format: {}", line)))?;
    let key = key.trim();
    let value = value.trim();

    match key {
        "version" => value
            .parse::<u32>()
            .map(Directive::Version)
            .map_err(|_| HarvestError::LocatorError(format!("Invalid version: {}", value))),
        "clear" => Role::from_key(value)
            .map(Directive::Clear)
            .ok_or_else(|| HarvestError::LocatorError(format!("Unknown role: {}", value))),
        _ => {
            let role = Role::from_key(key).ok_or_else(|| HarvestError::LocatorError(format!("Unknown role: {}", key)))?;
            if value.is_empty() {
                return Err(HarvestError::LocatorError(format!("Empty locator for role: {}", key)));
            }
            Ok(Directive::Locator(role, value.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_keys_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_key(role.key()), Some(role));
        }
        assert_eq!(Role::from_key("nope"), None);
    }

    #[test]
    fn test_parse_directive_locator() {
        let directive = parse_directive(r#"post_text: div[data-testid="post_message"]"#).unwrap();
        assert_eq!(directive, Directive::Locator(Role::PostText, r#"div[data-testid="post_message"]"#.to_string()));
    }

    #[test]
    fn test_parse_directive_keeps_colons_in_selector() {
        let directive = parse_directive("comment: li:not(.ad)").unwrap();
        assert_eq!(directive, Directive::Locator(Role::Comment, "li:not(.ad)".to_string()));
    }

    #[test]
    fn test_parse_directive_version_and_clear() {
        assert_eq!(parse_directive("version: 3").unwrap(), Directive::Version(3));
        assert_eq!(parse_directive("clear: detail_affordance").unwrap(), Directive::Clear(Role::DetailAffordance));
    }

    #[test]
    fn test_parse_directive_invalid() {
        assert!(parse_directive("invalid_directive").is_err());
        assert!(parse_directive("unknown_role: div").is_err());
        assert!(parse_directive("version: x").is_err());
        assert!(parse_directive("post_text:").is_err());
    }

    #[test]
    fn test_builtin_is_valid_and_complete() {
        let set = LocatorSet::builtin();
        assert_eq!(set.version, 1);
        set.validate().unwrap();
        for role in Role::ALL {
            assert!(set.has(role), "missing builtin locator for {}", role);
        }
    }

    #[test]
    fn test_push_deduplicates() {
        let mut set = LocatorSet::new();
        set.push(Role::Comment, "li.comment");
        set.push(Role::Comment, "li.comment");
        assert_eq!(set.selectors(Role::Comment).len(), 1);
    }

    #[test]
    fn test_merge_overlay_first() {
        let mut base = LocatorSet::new().with(Role::PostText, "p.base").with(Role::Comment, "li.comment");
        base.version = 1;
        let mut overlay = LocatorSet::new().with(Role::PostText, "p.custom");
        overlay.version = 2;

        base.merge(&overlay);

        assert_eq!(base.selectors(Role::PostText), &["p.custom".to_string(), "p.base".to_string()]);
        assert_eq!(base.selectors(Role::Comment), &["li.comment".to_string()]);
        assert_eq!(base.version, 2);
    }

    #[test]
    fn test_merge_applies_clear() {
        let mut base = LocatorSet::builtin();
        let mut overlay = LocatorSet::new();
        overlay.add_directive(Directive::Clear(Role::DetailAffordance));

        base.merge(&overlay);
        assert!(!base.has(Role::DetailAffordance));
        assert!(base.has(Role::DetailView));
    }

    #[test]
    fn test_validate_rejects_bad_selector() {
        let set = LocatorSet::new().with(Role::Comment, "[[invalid");
        assert!(matches!(set.validate(), Err(HarvestError::InvalidSelector { .. })));
    }
}
