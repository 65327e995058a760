//! SQLite persistence for the inventory, users and settings.
//!
//! Every function takes the pool explicitly and answers with [`AppResult`](crate::error::AppResult),
//! so handlers can propagate store failures with `?`.

pub mod alerts;
pub mod caves;
pub mod consumption;
pub mod settings;
pub mod setup;
pub mod users;
pub mod wines;

use chrono::{DateTime, SecondsFormat, Utc};

/// Timestamp format shared with the `strftime` column defaults, so text comparison is
/// chronological.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
