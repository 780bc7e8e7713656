//! Shared formatting helpers for CLI commands

use chartstreams_repo::CommitRef;

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// `abcdef12 (2020-09-13 12:26:40 UTC)`
#[must_use]
pub fn describe_commit(commit: &CommitRef) -> String {
    format!(
        "{} ({})",
        commit.short_hash(),
        commit.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )
}
