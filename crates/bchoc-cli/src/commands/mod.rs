//! Command implementations.

pub mod evidence;
pub mod show;
pub mod verify;

use chrono::{DateTime, SecondsFormat, Utc};

/// Renders a block timestamp as RFC 3339 UTC.
fn format_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
