//! Output filename generation.

use chrono::{DateTime, Local};

/// Timestamp prefix of capture filenames.
pub const FILENAME_TIME_FORMAT: &str = "%Y-%m-%d %Hh%Mm%Ss";

/// Longest filename, in bytes, accepted by common filesystems.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Keep only alphanumerics, space, `-`, `_` and `.`.
pub fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect()
}

/// `"<timestamp> - <broadcaster> - <title>.<ext>"`, sanitized.
///
/// The timestamp alone keeps the result non-empty whatever the title holds.
/// The title is cut on a character boundary so the whole name fits in
/// [`MAX_FILENAME_BYTES`].
pub fn build_filename(at: DateTime<Local>, broadcaster: &str, title: &str, extension: &str) -> String {
    let head = sanitize_filename(&format!("{} - {} - ", at.format(FILENAME_TIME_FORMAT), broadcaster));
    let tail = sanitize_filename(&format!(".{}", extension));
    let title = sanitize_filename(title);

    let budget = MAX_FILENAME_BYTES.saturating_sub(head.len() + tail.len());
    format!("{}{}{}", head, truncate_bytes(&title, budget), tail)
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char
/// boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
