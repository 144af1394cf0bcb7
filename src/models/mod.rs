//! Data models for the tracker's JSON collections.
//!
//! Field names follow the camelCase layout of the files in the repository.

mod member;
mod report;
mod task;

pub use member::*;
pub use report::*;
pub use task::*;

use chrono::{SecondsFormat, Utc};

/// Current time as an RFC 3339 timestamp with millisecond precision, e.g.
/// `2025-11-01T12:00:00.000Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
