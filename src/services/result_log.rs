//! Result Logger
//!
//! Formats per-provider result blocks and merges them idempotently into a
//! row's log cell. A log cell holds at most one block per provider
//! identity; re-logging the same provider replaces its block in place and
//! never touches the other providers' blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One provider's formatted result record for a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBlock {
    /// Provider display name; the block's identity within a log cell
    pub provider_label: String,
    /// Model selector used, if any
    pub model: Option<String>,
    /// Source cell location, e.g. "F20"
    pub source: String,
    /// When the prompt was dispatched
    pub sent_at: DateTime<Utc>,
    /// When the response was written back
    pub written_at: DateTime<Utc>,
}

impl LogBlock {
    /// Create a block for one terminal outcome
    pub fn new(
        provider_label: impl Into<String>,
        model: Option<String>,
        source: impl Into<String>,
        sent_at: DateTime<Utc>,
        written_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provider_label: provider_label.into(),
            model,
            source: source.into(),
            sent_at,
            written_at,
        }
    }

    /// Elapsed seconds between dispatch and write-back, clamped at zero
    pub fn elapsed_secs(&self) -> i64 {
        (self.written_at - self.sent_at).num_seconds().max(0)
    }

    /// Render the block, header first
    pub fn format(&self) -> String {
        format!(
            "{}\nModel: {}\nSource: {}\nSent: {}\nWritten: {}\nElapsed: {}s",
            header_for(&self.provider_label),
            self.model.as_deref().unwrap_or("-"),
            self.source,
            self.sent_at.to_rfc3339(),
            self.written_at.to_rfc3339(),
            self.elapsed_secs(),
        )
    }
}

/// Header line identifying a provider's block
fn header_for(provider_label: &str) -> String {
    format!("=== {} ===", provider_label)
}

fn is_header_line(line: &str) -> bool {
    line.starts_with("=== ") && line.trim_end().ends_with(" ===")
}

/// Merge a provider's block into an existing log cell value.
///
/// Empty cell: the new block verbatim. Existing block for the same
/// provider: replaced in place (header to next header). No existing block:
/// appended after a blank line. A replacement that cannot locate the span
/// falls back to append; data is never dropped.
pub fn merge_into(existing: &str, new_block: &str, provider_label: &str) -> String {
    if existing.trim().is_empty() {
        return new_block.to_string();
    }

    let header = header_for(provider_label);
    let lines: Vec<&str> = existing.lines().collect();

    let start = lines.iter().position(|line| line.trim_end() == header);
    match start {
        Some(start) => {
            let end = lines[start + 1..]
                .iter()
                .position(|line| is_header_line(line))
                .map(|offset| start + 1 + offset)
                .unwrap_or(lines.len());

            debug!(provider = provider_label, "replacing existing log block");

            let mut merged: Vec<&str> = Vec::with_capacity(lines.len());
            merged.extend_from_slice(&lines[..start]);
            merged.extend(new_block.lines());
            if end < lines.len() {
                // keep a blank separator before the following block
                merged.push("");
            }
            merged.extend_from_slice(&lines[end..]);
            join_trimmed(&merged)
        }
        None => {
            debug!(provider = provider_label, "appending new log block");
            format!("{}\n\n{}", existing.trim_end(), new_block)
        }
    }
}

/// Join lines, collapsing any trailing blank run left by a replacement
fn join_trimmed(lines: &[&str]) -> String {
    let mut out = lines.join("\n");
    while out.ends_with('\n') {
        out.pop();
    }
    out
}
