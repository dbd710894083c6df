use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ReviewState;

/// Cached, denormalized metadata for one YouTube video plus its review tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub published_at: DateTime<Utc>,
    pub video_url: String,
    /// Always `format_duration(duration_seconds)`.
    pub duration: String,
    pub duration_seconds: i64,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub theme: Option<String>,
    pub state: ReviewState,
    pub last_fetched: DateTime<Utc>,
}

/// Input for `RecordStore::upsert_video`.
///
/// The display duration and the watch URL are derived by the store. A `None` state keeps the
/// stored tag on update and becomes `ReviewState::ToWatch` on create.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoUpsert {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub theme: Option<String>,
    pub state: Option<ReviewState>,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
