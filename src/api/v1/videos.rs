use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::common::ApiResponse;
use crate::api::v1::entities::{ReviewState, Theme, VideoRecord, VideoReviewState};
use crate::api::v1::services::formatting::{format_published_label, parse_display_duration};
use crate::api::v1::services::record_store::{DurationBackfill, VideoDetails, VideoQuery};
use crate::errors::AppError;
use crate::InnerState;

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

/// A cached video as the dashboard renders it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    #[serde(flatten)]
    pub video: VideoRecord,
    pub published_label: String,
}

impl From<VideoRecord> for VideoView {
    fn from(video: VideoRecord) -> Self {
        Self {
            published_label: format_published_label(&video.published_at),
            video,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetailsView {
    pub video: VideoView,
    pub review_state: Option<VideoReviewState>,
    pub themes: Vec<Theme>,
    pub display_state: ReviewState,
}

impl From<VideoDetails> for VideoDetailsView {
    fn from(details: VideoDetails) -> Self {
        Self {
            video: details.video.into(),
            review_state: details.review_state,
            themes: details.themes,
            display_state: details.display_state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListVideosParams {
    pub state: Option<String>,
    pub limit: Option<u32>,
    pub random: Option<bool>,
}

impl ListVideosParams {
    fn into_query(self) -> Result<VideoQuery, AppError> {
        let state = match self.state.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(label) => Some(label.parse::<ReviewState>()?),
        };

        Ok(VideoQuery {
            state,
            limit: self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
            random: self.random.unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStateRequest {
    pub state: Option<String>,
    /// Display form, `H:MM:SS` or `M:SS`.
    pub duration: Option<String>,
    pub duration_seconds: Option<i64>,
}

impl UpdateStateRequest {
    fn parse(self) -> Result<(ReviewState, DurationBackfill), AppError> {
        let state = match self.state.as_deref().map(str::trim) {
            None | Some("") => return Err(AppError::Validation("State is required".to_string())),
            Some(label) => label.parse::<ReviewState>()?,
        };

        let duration_seconds = match (self.duration_seconds, self.duration.as_deref()) {
            (Some(seconds), _) => Some(seconds),
            (None, Some(display)) if !display.trim().is_empty() => Some(
                parse_display_duration(display)
                    .ok_or_else(|| AppError::Validation(format!("Invalid duration: {}", display)))?,
            ),
            _ => None,
        };

        Ok((state, DurationBackfill { duration_seconds }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddThemeRequest {
    pub name: Option<String>,
}

#[tracing::instrument(name = "List videos", skip(inner))]
pub async fn list_videos(
    State(inner): State<InnerState>,
    Query(params): Query<ListVideosParams>,
) -> Result<Json<ApiResponse<Vec<VideoView>>>, AppError> {
    let query = params.into_query()?;
    let videos = inner.store.list_videos(&query).await?;

    tracing::debug!("Listing {} videos", videos.len());
    Ok(Json(ApiResponse::success(videos.into_iter().map(VideoView::from).collect())))
}

#[tracing::instrument(name = "Get video", skip(inner))]
pub async fn get_video(
    State(inner): State<InnerState>,
    Path(video_id): Path<String>,
) -> Result<Json<ApiResponse<VideoDetailsView>>, AppError> {
    let details = inner.store.video_details(&video_id).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[tracing::instrument(name = "Update video state", skip(inner, payload))]
pub async fn update_video_state(
    State(inner): State<InnerState>,
    Path(video_id): Path<String>,
    Json(payload): Json<UpdateStateRequest>,
) -> Result<Json<ApiResponse<VideoReviewState>>, AppError> {
    let (state, backfill) = payload.parse()?;
    let review_state = inner.store.set_video_state(&video_id, state, backfill).await?;
    Ok(Json(ApiResponse::success(review_state)))
}

#[tracing::instrument(name = "Get videos by state", skip(inner))]
pub async fn videos_by_state(
    State(inner): State<InnerState>,
    Path(state): Path<String>,
) -> Result<Json<ApiResponse<Vec<VideoView>>>, AppError> {
    let state: ReviewState = state.parse()?;
    let videos = inner.store.get_by_state(state).await?;
    Ok(Json(ApiResponse::success(videos.into_iter().map(VideoView::from).collect())))
}

#[tracing::instrument(name = "Add theme to video", skip(inner, payload))]
pub async fn add_video_theme(
    State(inner): State<InnerState>,
    Path(video_id): Path<String>,
    Json(payload): Json<AddThemeRequest>,
) -> Result<Json<ApiResponse<Theme>>, AppError> {
    let name = payload
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Theme name is required".to_string()))?;

    let theme = inner.store.add_theme_to_video(&video_id, &name).await?;
    Ok(Json(ApiResponse::success(theme)))
}

#[tracing::instrument(name = "List themes", skip(inner))]
pub async fn all_themes(State(inner): State<InnerState>) -> Result<Json<ApiResponse<Vec<Theme>>>, AppError> {
    let themes = inner.store.list_themes().await?;
    Ok(Json(ApiResponse::success(themes)))
}
