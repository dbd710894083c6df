//! YouTube Video Sync Service
//!
//! Cache-aside loading of a channel's videos: serve the cache while it is fresh, otherwise
//! fetch from the provider, normalize, write through the store and serve the stored rows.
//! When the provider fails, whatever is cached is served even if stale.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::v1::entities::{VideoRecord, VideoUpsert};
use crate::api::v1::services::formatting::{decode_html_entities, parse_duration};
use crate::api::v1::services::metadata_cache::MetadataCache;
use crate::api::v1::services::quota::QuotaTracker;
use crate::api::v1::services::record_store::RecordStore;
use crate::api::v1::services::youtube_api::{RawVideo, VideoProvider};
use crate::config::Settings;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Cache,
    Upstream,
    StaleCache,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideos {
    pub channel_id: String,
    pub source: DataSource,
    pub videos: Vec<VideoRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSyncSummary {
    pub channel_id: String,
    pub source: Option<DataSource>,
    pub video_count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub cache_ttl_hours: i64,
    pub min_duration_seconds: i64,
    pub max_results: u32,
    pub upstream_timeout: Duration,
    pub concurrency: usize,
}

impl SyncOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cache_ttl_hours: settings.cache_ttl_hours,
            min_duration_seconds: settings.min_video_duration_seconds,
            max_results: settings.max_results_per_channel,
            upstream_timeout: settings.upstream_timeout,
            concurrency: settings.sync_concurrency,
        }
    }
}

/// Normalizes provider entries into store input.
///
/// Entries shorter than `min_duration_seconds`, or with an unreadable duration or publish
/// date, are dropped. The state is left unset so a refresh never overwrites a user's tag.
pub fn prepare_entries(
    raw: Vec<RawVideo>,
    channel_id: &str,
    theme: Option<&str>,
    min_duration_seconds: i64,
) -> Vec<VideoUpsert> {
    raw.into_iter()
        .filter_map(|entry| {
            let Some(duration_seconds) = parse_duration(&entry.duration) else {
                warn!("Skipping video {}: unreadable duration {:?}", entry.video_id, entry.duration);
                return None;
            };
            if duration_seconds < min_duration_seconds {
                debug!("Skipping short video {} ({}s)", entry.video_id, duration_seconds);
                return None;
            }

            let published_at = match DateTime::parse_from_rfc3339(&entry.published_at) {
                Ok(date) => date.with_timezone(&Utc),
                Err(e) => {
                    warn!("Skipping video {}: invalid published_at {:?}: {}", entry.video_id, entry.published_at, e);
                    return None;
                }
            };

            Some(VideoUpsert {
                video_id: entry.video_id,
                channel_id: channel_id.to_string(),
                channel_title: decode_html_entities(&entry.channel_title),
                title: decode_html_entities(&entry.title),
                description: decode_html_entities(&entry.description),
                thumbnail_url: entry.thumbnail_url,
                published_at,
                duration_seconds,
                view_count: entry.view_count,
                like_count: entry.like_count,
                theme: theme.map(str::to_string),
                state: None,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct VideoSyncService {
    cache: MetadataCache,
    store: RecordStore,
    quota: QuotaTracker,
    provider: Arc<dyn VideoProvider>,
    options: SyncOptions,
}

impl VideoSyncService {
    pub fn new(
        store: RecordStore,
        quota: QuotaTracker,
        provider: Arc<dyn VideoProvider>,
        options: SyncOptions,
    ) -> Self {
        Self {
            cache: MetadataCache::new(store.clone(), options.cache_ttl_hours),
            store,
            quota,
            provider,
            options,
        }
    }

    #[tracing::instrument(name = "Load channel videos", skip(self))]
    pub async fn load_channel_videos(&self, channel_id: &str) -> Result<ChannelVideos, AppError> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(AppError::Validation("Channel ID is required".to_string()));
        }

        if !self.cache.needs_refresh(channel_id).await? {
            let videos = self.cache.get_cached_records(channel_id).await?;
            debug!("Serving {} cached videos for channel {}", videos.len(), channel_id);
            return Ok(ChannelVideos {
                channel_id: channel_id.to_string(),
                source: DataSource::Cache,
                videos,
            });
        }

        match self.refresh_channel(channel_id).await {
            Ok(videos) => Ok(ChannelVideos {
                channel_id: channel_id.to_string(),
                source: DataSource::Upstream,
                videos,
            }),
            Err(e) if e.is_upstream() => {
                let videos = self.cache.get_cached_records(channel_id).await?;
                if videos.is_empty() {
                    error!("No cached videos to fall back on for channel {}: {:?}", channel_id, e);
                    return Err(e);
                }
                warn!(
                    "Upstream unavailable for channel {}, serving {} stale videos: {}",
                    channel_id,
                    videos.len(),
                    e
                );
                Ok(ChannelVideos {
                    channel_id: channel_id.to_string(),
                    source: DataSource::StaleCache,
                    videos,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_channel(&self, channel_id: &str) -> Result<Vec<VideoRecord>, AppError> {
        let theme = self
            .store
            .find_channel(channel_id)
            .await?
            .and_then(|channel| channel.theme);

        let batch = tokio::time::timeout(
            self.options.upstream_timeout,
            self.provider.fetch_channel_videos(channel_id, self.options.max_results),
        )
        .await??;

        if let Err(e) = self.quota.track(batch.quota_units).await {
            error!("Failed to record {} quota units: {:?}", batch.quota_units, e);
        }

        let fetched = batch.entries.len();
        let records = prepare_entries(
            batch.entries,
            channel_id,
            theme.as_deref(),
            self.options.min_duration_seconds,
        );
        info!(
            "Channel {}: kept {} of {} fetched videos",
            channel_id,
            records.len(),
            fetched
        );

        self.cache.cache_records(records, channel_id).await?;
        self.cache.get_cached_records(channel_id).await
    }

    /// Loads every active channel, at most `concurrency` at a time. One channel failing does
    /// not stop the others.
    #[tracing::instrument(name = "Sync active channels", skip(self))]
    pub async fn sync_active_channels(&self) -> Result<Vec<ChannelSyncSummary>, AppError> {
        let channels = self.store.list_channels(true).await?;
        info!("Syncing {} active channels", channels.len());

        let summaries: Vec<ChannelSyncSummary> = stream::iter(channels)
            .map(|channel| async move {
                match self.load_channel_videos(&channel.channel_id).await {
                    Ok(loaded) => ChannelSyncSummary {
                        channel_id: channel.channel_id,
                        source: Some(loaded.source),
                        video_count: loaded.videos.len(),
                        error: None,
                    },
                    Err(e) => {
                        error!("Failed to sync videos for channel {}: {:?}", channel.channel_id, e);
                        ChannelSyncSummary {
                            channel_id: channel.channel_id,
                            source: None,
                            video_count: 0,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let failed = summaries.iter().filter(|s| s.error.is_some()).count();
        info!("Sync finished: {} channels, {} failed", summaries.len(), failed);
        Ok(summaries)
    }
}
