//! Row → wire model conversions.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use pmap_db::models::{CommentRow, MarkerRow, UserRow};
use pmap_types::{Comment, Marker, MarkerStatus, User};

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC, falling back to RFC 3339 for rows written elsewhere.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn user(row: UserRow) -> User {
    User {
        id: row.id,
        email: row.email,
        created_at: parse_timestamp(&row.created_at),
    }
}

pub fn marker(row: MarkerRow) -> Marker {
    Marker {
        id: row.id,
        user_id: row.user_id,
        text: row.text,
        latitude: row.latitude,
        longitude: row.longitude,
        image_url: row.image_url.filter(|url| !url.is_empty()),
        user_email: row.user_email,
        status: Some(MarkerStatus::parse(&row.status)),
        created_at: parse_timestamp(&row.created_at),
        updated_at: Some(parse_timestamp(&row.updated_at)),
    }
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        marker_id: row.marker_id,
        user_id: row.user_id,
        user_email: row.user_email,
        text: row.text,
        created_at: parse_timestamp(&row.created_at),
    }
}
