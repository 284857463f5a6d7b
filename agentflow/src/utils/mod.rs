//! Small helpers shared across modules.

use chrono::Utc;
use uuid::Uuid;

/// A fresh time-ordered run id.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}

/// Current Unix time in whole seconds.
#[must_use]
pub fn unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// The first `limit` characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}
