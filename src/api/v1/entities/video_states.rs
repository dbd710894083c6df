use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ReviewState;

/// User-owned review data for a video, kept apart from the metadata cache row so a tag
/// change never requires a refetch. Its `state` wins over `VideoRecord::state` for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VideoReviewState {
    pub video_id: String,
    pub state: ReviewState,
    pub duration: Option<String>,
    pub duration_seconds: Option<i64>,
    pub notes: Option<String>,
    pub rating: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
