pub mod auth;
pub mod catalog;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod policy;
pub mod reviews;
pub mod router;
pub mod titles;
pub mod users;
pub mod validate;

pub use router::router;

use chrono::{DateTime, Utc};
use tracing::warn;

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert, falling back through the RFC 3339 form.
pub(crate) fn parse_pub_date(raw: &str, what: &str, id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt pub_date '{raw}' on {what} '{id}': {e}");
            DateTime::default()
        })
}
