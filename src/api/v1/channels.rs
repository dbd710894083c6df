use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::common::ApiResponse;
use crate::api::v1::entities::{Channel, ChannelUpsert};
use crate::api::v1::services::youtube_video_sync::{ChannelSyncSummary, ChannelVideos, DataSource};
use crate::api::v1::videos::VideoView;
use crate::errors::AppError;
use crate::InnerState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideosView {
    pub channel_id: String,
    pub source: DataSource,
    pub videos: Vec<VideoView>,
}

impl From<ChannelVideos> for ChannelVideosView {
    fn from(loaded: ChannelVideos) -> Self {
        Self {
            channel_id: loaded.channel_id,
            source: loaded.source,
            videos: loaded.videos.into_iter().map(VideoView::from).collect(),
        }
    }
}

#[tracing::instrument(name = "List channels", skip(inner))]
pub async fn all_channels(State(inner): State<InnerState>) -> Result<Json<ApiResponse<Vec<Channel>>>, AppError> {
    let channels = inner.store.list_channels(false).await?;
    Ok(Json(ApiResponse::success(channels)))
}

/// Follows a channel, or refreshes its metadata when already followed.
#[tracing::instrument(name = "Upsert channel", skip(inner, payload))]
pub async fn upsert_channel(
    State(inner): State<InnerState>,
    Json(payload): Json<ChannelUpsert>,
) -> Result<Json<ApiResponse<Channel>>, AppError> {
    let channel = inner.store.upsert_channel(&payload).await?;
    tracing::info!("Channel {} saved", channel.channel_id);
    Ok(Json(ApiResponse::success(channel)))
}

#[tracing::instrument(name = "Get channel videos", skip(inner))]
pub async fn channel_videos(
    State(inner): State<InnerState>,
    Path(channel_id): Path<String>,
) -> Result<Json<ApiResponse<ChannelVideosView>>, AppError> {
    let loaded = inner.sync.load_channel_videos(&channel_id).await?;
    Ok(Json(ApiResponse::success(loaded.into())))
}

#[tracing::instrument(name = "Sync channels", skip(inner))]
pub async fn sync_channels(
    State(inner): State<InnerState>,
) -> Result<Json<ApiResponse<Vec<ChannelSyncSummary>>>, AppError> {
    let summaries = inner.sync.sync_active_channels().await?;
    Ok(Json(ApiResponse::success(summaries)))
}
