//! Cache-aside layer over the video table.
//!
//! Freshness is judged on when rows were last fetched from upstream, never on when the videos
//! were published: a channel that has not posted for weeks is still fresh if we asked recently.

use chrono::{DateTime, Duration, Utc};

use crate::api::v1::entities::{VideoRecord, VideoUpsert};
use crate::api::v1::services::record_store::RecordStore;
use crate::errors::AppError;

const UNKNOWN_CHANNEL_TITLE: &str = "Unknown Channel";

/// A channel is stale when it has nothing cached, or when its newest fetch is strictly older
/// than `ttl_hours`. A TTL too large to represent never expires.
pub fn is_stale(now: DateTime<Utc>, newest_last_fetched: Option<DateTime<Utc>>, ttl_hours: i64) -> bool {
    match (newest_last_fetched, Duration::try_hours(ttl_hours)) {
        (None, _) => true,
        (Some(fetched), Some(ttl)) => now.signed_duration_since(fetched) > ttl,
        (Some(_), None) => false,
    }
}

#[derive(Clone, Debug)]
pub struct MetadataCache {
    store: RecordStore,
    ttl_hours: i64,
}

impl MetadataCache {
    pub fn new(store: RecordStore, ttl_hours: i64) -> Self {
        Self { store, ttl_hours }
    }

    pub async fn needs_refresh(&self, channel_id: &str) -> Result<bool, AppError> {
        self.needs_refresh_at(channel_id, Utc::now()).await
    }

    pub async fn needs_refresh_at(&self, channel_id: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let newest = self.store.latest_fetch_for_channel(channel_id).await?;
        Ok(is_stale(now, newest, self.ttl_hours))
    }

    /// Whatever is cached for the channel, newest published first. Never calls upstream.
    pub async fn get_cached_records(&self, channel_id: &str) -> Result<Vec<VideoRecord>, AppError> {
        self.store.videos_for_channel(channel_id).await
    }

    /// Writes a fresh batch through the store and returns the stored rows.
    #[tracing::instrument(name = "Cache channel videos", skip(self, records), fields(count = records.len()))]
    pub async fn cache_records(
        &self,
        records: Vec<VideoUpsert>,
        channel_id: &str,
    ) -> Result<Vec<VideoRecord>, AppError> {
        let fallback_title = records
            .first()
            .map(|r| r.channel_title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_CHANNEL_TITLE)
            .to_string();
        self.store.ensure_channel(channel_id, &fallback_title).await?;

        let mut cached = Vec::with_capacity(records.len());
        for mut record in records {
            record.channel_id = channel_id.to_string();
            if record.channel_title.trim().is_empty() {
                record.channel_title = fallback_title.clone();
            }
            cached.push(self.store.upsert_video(&record).await?);
        }

        tracing::debug!("Cached {} videos for channel {}", cached.len(), channel_id);
        Ok(cached)
    }
}
