use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A followed YouTube channel; anchors the freshness decision for its videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub channel_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: Option<i64>,
    /// Label applied to videos synced from this channel.
    pub theme: Option<String>,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for `RecordStore::upsert_channel`. `None` fields keep their stored value on update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelUpsert {
    pub channel_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub theme: Option<String>,
}

impl ChannelUpsert {
    pub fn new(channel_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}
