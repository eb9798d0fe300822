use std::fmt::Write;

use crate::analytics::{AnalyticsSnapshot, Band};

/// Configuration for the plain text summary
#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Include the per-day table
    pub include_daily: bool,

    /// Include the engagement and comment histograms
    pub include_histograms: bool,

    /// Width of histogram bars at the largest band (0 = no bars)
    pub bar_width: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { include_daily: false, include_histograms: true, bar_width: 30 }
    }
}

/// Renders an analytics snapshot as a plain text report.
pub fn summarize(snapshot: &AnalyticsSnapshot, config: &TextConfig) -> String {
    let mut out = String::new();

    section(&mut out, "Totals");
    let _ = writeln!(out, "Posts:      {}", snapshot.total_posts);
    let _ = writeln!(out, "Comments:   {}", snapshot.total_comments);
    let _ = writeln!(out, "Profiles:   {}", snapshot.total_profiles);
    let _ = writeln!(out, "Engagement: {}", snapshot.total_engagement);

    let time = &snapshot.time_stats;
    if let (Some(first), Some(last)) = (&time.first_post, &time.last_post) {
        section(&mut out, "Activity");
        let _ = writeln!(out, "First post: {first}");
        let _ = writeln!(out, "Last post:  {last}");
        let _ = writeln!(
            out,
            "Active on {} of {} days, {:.1} posts per active day",
            time.active_days, time.total_days, time.average_per_active_day
        );
    }

    let activity = &snapshot.activity_stats;
    section(&mut out, "Engagement");
    let _ = writeln!(
        out,
        "Reactions: {} (avg {:.1}, {:.0}% of posts)",
        activity.total_reactions, activity.average_reactions, activity.engagement_rate.reactions
    );
    let _ = writeln!(
        out,
        "Comments:  {} (avg {:.1}, {:.0}% of posts)",
        activity.total_comments, activity.average_comments, activity.engagement_rate.comments
    );
    let _ = writeln!(
        out,
        "Shares:    {} (avg {:.1}, {:.0}% of posts)",
        activity.total_shares, activity.average_shares, activity.engagement_rate.shares
    );

    if !snapshot.author_stats.top_authors.is_empty() {
        section(&mut out, "Top authors");
        for (rank, author) in snapshot.author_stats.top_authors.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>2}. {} ({} posts, {} reactions)",
                rank + 1,
                author.name,
                author.posts,
                author.reactions
            );
        }
    }

    let comments = &snapshot.comment_stats;
    if !comments.top_commentators.is_empty() {
        section(&mut out, "Top commentators");
        for (rank, commentator) in comments.top_commentators.iter().enumerate() {
            let _ = writeln!(out, "{:>2}. {} ({} comments)", rank + 1, commentator.name, commentator.comments);
        }
        let _ = writeln!(
            out,
            "{} unique commentators on {} posts",
            comments.unique_commentators, comments.posts_with_comments
        );
    }

    if config.include_histograms {
        section(&mut out, "Engagement per post");
        histogram(&mut out, &snapshot.engagement_histogram, config.bar_width);
        section(&mut out, "Comments per post");
        histogram(&mut out, &snapshot.comment_histogram, config.bar_width);
    }

    if config.include_daily {
        section(&mut out, "Daily");
        for day in &snapshot.daily {
            let _ = writeln!(out, "{}  {:>4} posts  {:>4} comments", day.date, day.posts, day.comments);
        }
    }

    out.trim_end().to_string()
}

fn section(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.len()));
    out.push('\n');
}

fn histogram(out: &mut String, bands: &[Band], bar_width: usize) {
    let max = bands.iter().map(|band| band.count).max().unwrap_or(0);
    let label_width = bands.iter().map(|band| band.label.len()).max().unwrap_or(0);

    for band in bands {
        let bar = if bar_width == 0 || max == 0 { 0 } else { band.count * bar_width / max };
        let _ = writeln!(out, "{:>label_width$}  {:>5}  {}", band.label, band.count, "#".repeat(bar));
    }
}
