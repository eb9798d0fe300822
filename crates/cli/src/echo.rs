use feedharvest_core::{MergeOutcome, Progress, StorageStats, TerminationReason};
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "feedharvest".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Harvest posts, comments and replies from saved feeds\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print a one-line progress update, overwritten in place
pub fn print_progress(progress: &Progress) {
    eprint!(
        "\r  {} {}  {} {}",
        "Posts:".dimmed(),
        progress.posts_found.to_string().bright_white(),
        "Scrolls:".dimmed(),
        progress.scroll_attempts.to_string().bright_white()
    );
}

/// Print the result of a finished session
pub fn print_outcome(reason: TerminationReason, merged: Option<&MergeOutcome>) {
    eprintln!();
    let reason = match reason {
        TerminationReason::Stopped => "stopped on request",
        TerminationReason::MaxPosts => "post limit reached",
        TerminationReason::ScrollLimit => "scroll limit reached",
        TerminationReason::Exhausted => "feed exhausted",
    };

    match merged {
        Some(merged) => print_success(&format!(
            "Harvest finished ({}): {} new posts, {} new comments, {} new profiles",
            reason, merged.added_posts, merged.added_comments, merged.added_profiles
        )),
        None => print_warning(&format!("Harvest finished ({}) but the batch could not be saved", reason)),
    }
}

/// Print storage statistics
pub fn print_storage(stats: &StorageStats) {
    eprintln!("{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Storage".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());
    eprintln!("  {} {}", "Posts:".dimmed(), stats.posts.to_string().bright_white());
    eprintln!("  {} {}", "Comments:".dimmed(), stats.comments.to_string().bright_white());
    eprintln!("  {} {}", "Profiles:".dimmed(), stats.profiles.to_string().bright_white());
    eprintln!("  {} {}", "Size:".dimmed(), format_size(stats.estimated_size_bytes).bright_white());
    if let Some(last_updated) = &stats.last_updated {
        eprintln!("  {} {}", "Updated:".dimmed(), last_updated.bright_white());
    }
    eprintln!();
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
