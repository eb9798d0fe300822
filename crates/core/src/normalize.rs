//! Pure normalization of harvested values.
//!
//! Nothing in here fails: input that cannot be understood is passed through
//! unchanged (timestamps), replaced by a default (authors) or reported as
//! absent (counts).

use std::sync::LazyLock;

use regex::Regex;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use url::Url;

use crate::model::{Author, CanonicalTimestamp, Comment, Post, UNKNOWN_AUTHOR};

static RE_RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(\d+)\s*|(an?)\s+)?(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|wks?|w)\.?(?:\s+ago)?$",
    )
    .unwrap()
});
static RE_ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[ T](\d{1,2}):(\d{2})(?::(\d{2}))?)?$").unwrap());
static RE_MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?(?:,?\s+(?:at\s+)?(\d{1,2}):(\d{2})\s*(am|pm)?)?$")
        .unwrap()
});
static RE_DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s+([a-z]+)\.?(?:,?\s+(\d{4}))?(?:,?\s+(?:at\s+)?(\d{1,2}):(\d{2})\s*(am|pm)?)?$").unwrap()
});
static RE_UNIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{9,11}$").unwrap());
static RE_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s*([km])?\b").unwrap());

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Query parameters that identify a profile rather than track the click.
const IDENTIFYING_PARAMS: [&str; 1] = ["id"];

/// Canonicalizes a timestamp relative to the current time.
pub fn normalize_timestamp(raw: &str) -> CanonicalTimestamp {
    normalize_timestamp_at(raw, OffsetDateTime::now_utc())
}

/// Canonicalizes a timestamp to RFC 3339 (UTC).
///
/// RFC 3339 input is returned unchanged. Relative forms ("2h ago",
/// "3 days", "just now", "yesterday") are resolved against `now`. Unix
/// seconds, RFC 2822 and common written dates ("2024-05-01", "May 1, 2024",
/// "1 May 2024 at 14:30") are converted. Anything else comes back as `raw`.
pub fn normalize_timestamp_at(raw: &str, now: OffsetDateTime) -> CanonicalTimestamp {
    let trimmed = raw.trim();
    if trimmed.is_empty() || OffsetDateTime::parse(trimmed, &Rfc3339).is_ok() {
        return raw.to_string();
    }

    let lowered = trimmed.to_lowercase();
    parse_relative(&lowered, now)
        .or_else(|| parse_unix(&lowered))
        .or_else(|| parse_absolute(trimmed, &lowered, now))
        .and_then(format_canonical)
        .unwrap_or_else(|| raw.to_string())
}

/// Parses a canonical (or any RFC 3339) timestamp back into a date-time.
pub fn parse_canonical(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

/// Formats a date-time the way [`normalize_timestamp`] does.
pub fn format_canonical(value: OffsetDateTime) -> Option<CanonicalTimestamp> {
    value
        .to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .ok()?
        .format(&Rfc3339)
        .ok()
}

fn parse_relative(lowered: &str, now: OffsetDateTime) -> Option<OffsetDateTime> {
    match lowered {
        "just now" | "now" => return Some(now),
        "yesterday" => return Some(now - Duration::days(1)),
        _ => {}
    }

    let caps = RE_RELATIVE.captures(lowered)?;
    let amount: i64 = match (caps.get(1), caps.get(2)) {
        (Some(digits), _) => digits.as_str().parse().ok()?,
        (None, Some(_)) => 1,
        (None, None) => 0,
    };

    let unit = match &caps[3] {
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::seconds(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::minutes(1),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::hours(1),
        "d" | "day" | "days" => Duration::days(1),
        _ => Duration::weeks(1),
    };

    now.checked_sub(unit.checked_mul(i32::try_from(amount).ok()?)?)
}

fn parse_unix(lowered: &str) -> Option<OffsetDateTime> {
    if !RE_UNIX.is_match(lowered) {
        return None;
    }
    OffsetDateTime::from_unix_timestamp(lowered.parse().ok()?).ok()
}

fn parse_absolute(trimmed: &str, lowered: &str, now: OffsetDateTime) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc2822) {
        return Some(parsed);
    }

    if let Some(caps) = RE_ISO_DATE.captures(lowered) {
        let month = Month::try_from(caps[2].parse::<u8>().ok()?).ok()?;
        let date = Date::from_calendar_date(caps[1].parse().ok()?, month, caps[3].parse().ok()?).ok()?;
        let hour = caps.get(4).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let minute = caps.get(5).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let second = caps.get(6).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let time = Time::from_hms(hour, minute, second).ok()?;
        return Some(PrimitiveDateTime::new(date, time).assume_utc());
    }

    let (month, day, caps) = if let Some(caps) = RE_MONTH_FIRST.captures(lowered) {
        (month_from_name(&caps[1])?, caps[2].parse::<u8>().ok()?, caps)
    } else if let Some(caps) = RE_DAY_FIRST.captures(lowered) {
        (month_from_name(&caps[2])?, caps[1].parse::<u8>().ok()?, caps)
    } else {
        return None;
    };

    let year = caps.get(3).map_or(Some(now.year()), |m| m.as_str().parse().ok())?;
    let date = Date::from_calendar_date(year, month, day).ok()?;

    let time = match (caps.get(4), caps.get(5)) {
        (Some(hour), Some(minute)) => {
            let hour = to_24_hour(hour.as_str().parse().ok()?, caps.get(6).map(|m| m.as_str()))?;
            Time::from_hms(hour, minute.as_str().parse().ok()?, 0).ok()?
        }
        _ => Time::MIDNIGHT,
    };

    Some(PrimitiveDateTime::new(date, time).assume_utc())
}

fn month_from_name(name: &str) -> Option<Month> {
    if name.len() < 3 {
        return None;
    }
    let index = MONTHS.iter().position(|month| month.starts_with(name))?;
    Month::try_from(index as u8 + 1).ok()
}

fn to_24_hour(hour: u8, meridiem: Option<&str>) -> Option<u8> {
    match meridiem {
        None if hour < 24 => Some(hour),
        Some("am") if (1..=12).contains(&hour) => Some(hour % 12),
        Some("pm") if (1..=12).contains(&hour) => Some(hour % 12 + 12),
        _ => None,
    }
}

/// Builds an [`Author`] from raw name and link text.
///
/// An empty name becomes [`UNKNOWN_AUTHOR`]; the link loses its tracking
/// query and fragment.
pub fn normalize_author(name: &str, profile_url: &str) -> Author {
    let display_name = normalize_text(name);
    Author {
        display_name: if display_name.is_empty() { UNKNOWN_AUTHOR.to_string() } else { display_name },
        profile_url: strip_tracking(profile_url),
    }
}

fn strip_tracking(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(mut url) = Url::parse(trimmed) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| IDENTIFYING_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.set_fragment(None);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        return url.to_string();
    }

    let without_fragment = trimmed.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((path, query)) => {
            let kept: Vec<&str> = query
                .split('&')
                .filter(|pair| IDENTIFYING_PARAMS.contains(&pair.split('=').next().unwrap_or_default()))
                .collect();
            if kept.is_empty() { path.to_string() } else { format!("{}?{}", path, kept.join("&")) }
        }
        None => without_fragment.to_string(),
    }
}

/// Parses an abbreviated count ("1,234", "1.2K", "3M", "15 comments").
pub fn normalize_count(raw: &str) -> Option<u64> {
    let caps = RE_COUNT.captures(raw)?;
    let number = &caps[1];

    let value = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) => {
            let multiplier = if suffix == "k" { 1_000.0 } else { 1_000_000.0 };
            number_with_decimal_comma(number).parse::<f64>().ok()? * multiplier
        }
        None => number.replace(',', "").parse::<f64>().ok()?,
    };

    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.round() as u64)
}

/// Reads a trailing `,` followed by one or two digits as a decimal point
/// ("2,5K"); any other comma is a thousands separator ("1,234K").
fn number_with_decimal_comma(number: &str) -> String {
    match number.rsplit_once(',') {
        Some((head, tail)) if !head.contains([',', '.']) && (1..=2).contains(&tail.len()) => {
            format!("{}.{}", head, tail)
        }
        _ => number.replace(',', ""),
    }
}

/// Collapses runs of whitespace to single spaces and trims.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a harvested post and its comment tree in place.
///
/// `scrapedAt` is set to `now` where it is missing.
pub fn normalize_post(post: &mut Post, now: OffsetDateTime) {
    let scraped_at = format_canonical(now);

    post.text = normalize_text(&post.text);
    post.author = normalize_author(&post.author.display_name, &post.author.profile_url);
    post.created_at = post.created_at.as_deref().map(|raw| normalize_timestamp_at(raw, now));
    if post.scraped_at.is_none() {
        post.scraped_at = scraped_at.clone();
    }

    for comment in &mut post.comments {
        normalize_comment(comment, now, scraped_at.as_ref());
    }
}

fn normalize_comment(comment: &mut Comment, now: OffsetDateTime, scraped_at: Option<&CanonicalTimestamp>) {
    comment.text = normalize_text(&comment.text);
    comment.author = normalize_author(&comment.author.display_name, &comment.author.profile_url);
    comment.created_at = comment.created_at.as_deref().map(|raw| normalize_timestamp_at(raw, now));
    if comment.scraped_at.is_none() {
        comment.scraped_at = scraped_at.cloned();
    }

    for reply in &mut comment.replies {
        normalize_comment(reply, now, scraped_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-10 12:00:00 UTC);

    #[rstest]
    #[case("2h ago", "2024-05-10T10:00:00Z")]
    #[case("2 hours ago", "2024-05-10T10:00:00Z")]
    #[case("45 min", "2024-05-10T11:15:00Z")]
    #[case("30s", "2024-05-10T11:59:30Z")]
    #[case("3 days ago", "2024-05-07T12:00:00Z")]
    #[case("1w", "2024-05-03T12:00:00Z")]
    #[case("an hour ago", "2024-05-10T11:00:00Z")]
    #[case("min ago", "2024-05-10T12:00:00Z")]
    #[case("Just now", "2024-05-10T12:00:00Z")]
    #[case("Yesterday", "2024-05-09T12:00:00Z")]
    fn test_relative_timestamps(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_timestamp_at(raw, NOW), expected);
    }

    #[rstest]
    #[case("2024-03-01", "2024-03-01T00:00:00Z")]
    #[case("2024-03-01 08:15", "2024-03-01T08:15:00Z")]
    #[case("March 5, 2024", "2024-03-05T00:00:00Z")]
    #[case("Mar 5, 2024 at 3:30 PM", "2024-03-05T15:30:00Z")]
    #[case("5 March 2024", "2024-03-05T00:00:00Z")]
    #[case("5 March at 09:05", "2024-03-05T09:05:00Z")]
    #[case("Tue, 1 Jul 2003 10:52:37 +0200", "2003-07-01T08:52:37Z")]
    #[case("1714000000", "2024-04-24T23:06:40Z")]
    fn test_absolute_timestamps(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_timestamp_at(raw, NOW), expected);
    }

    #[rstest]
    #[case("2024-05-01T10:00:00Z")]
    #[case("2024-05-01T10:00:00.5+02:00")]
    #[case("garbage")]
    #[case("15 comments")]
    #[case("am")]
    #[case("ad")]
    #[case("")]
    fn test_timestamps_passed_through(#[case] raw: &str) {
        assert_eq!(normalize_timestamp_at(raw, NOW), raw);
    }

    #[test]
    fn test_relative_against_real_clock() {
        let normalized = normalize_timestamp("2h ago");
        let parsed = parse_canonical(&normalized).unwrap();
        let expected = OffsetDateTime::now_utc() - Duration::hours(2);
        assert!((parsed - expected).abs() <= Duration::seconds(1));
    }

    #[rstest]
    #[case("1,234", Some(1234))]
    #[case("1.2K", Some(1200))]
    #[case("3M", Some(3_000_000))]
    #[case("15 comments", Some(15))]
    #[case("2,5k", Some(2500))]
    #[case("1,234K", Some(1_234_000))]
    #[case("1,25M", Some(1_250_000))]
    #[case("42", Some(42))]
    #[case("no reactions", None)]
    #[case("", None)]
    fn test_normalize_count(#[case] raw: &str, #[case] expected: Option<u64>) {
        assert_eq!(normalize_count(raw), expected);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello \n\t world  "), "Hello world");
        assert_eq!(normalize_text("   "), "");
    }

    #[rstest]
    #[case("https://example.com/ann?__tn__=R&ref=nf#top", "https://example.com/ann")]
    #[case("https://example.com/profile.php?id=42&__cft__=abc", "https://example.com/profile.php?id=42")]
    #[case("/people/ann?fref=nf", "/people/ann")]
    #[case("/profile.php?id=7&ref=x", "/profile.php?id=7")]
    #[case("", "")]
    fn test_author_url_tracking_stripped(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_author("Ann", raw).profile_url, expected);
    }

    #[test]
    fn test_author_defaults() {
        let author = normalize_author("  ", "");
        assert_eq!(author.display_name, UNKNOWN_AUTHOR);
        assert!(author.profile_url.is_empty());
        assert_eq!(normalize_author(" Ann  Lee ", "").display_name, "Ann Lee");
    }

    #[test]
    fn test_normalize_post_tree() {
        let mut post = Post {
            text: " Hello\n world ".to_string(),
            author: Author { display_name: String::new(), profile_url: String::new() },
            created_at: Some("1h".to_string()),
            comments: vec![Comment {
                text: "nice  one".to_string(),
                created_at: Some("garbage".to_string()),
                replies: vec![Comment { text: " thanks ".to_string(), ..Default::default() }],
                ..Default::default()
            }],
            ..Default::default()
        };

        normalize_post(&mut post, NOW);

        assert_eq!(post.text, "Hello world");
        assert_eq!(post.author.display_name, UNKNOWN_AUTHOR);
        assert_eq!(post.created_at.as_deref(), Some("2024-05-10T11:00:00Z"));
        assert_eq!(post.scraped_at.as_deref(), Some("2024-05-10T12:00:00Z"));
        assert_eq!(post.comments[0].text, "nice one");
        assert_eq!(post.comments[0].created_at.as_deref(), Some("garbage"));
        assert_eq!(post.comments[0].replies[0].text, "thanks");
        assert_eq!(post.comments[0].replies[0].scraped_at.as_deref(), Some("2024-05-10T12:00:00Z"));
    }
}
