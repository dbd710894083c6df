use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::common::ApiResponse;
use crate::api::v1::entities::ReviewState;
use crate::api::v1::services::quota::QuotaUsage;
use crate::errors::AppError;
use crate::InnerState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCount {
    pub state: ReviewState,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub states: Vec<StateCount>,
    pub total_videos: i64,
    pub active_channels: usize,
}

#[tracing::instrument(name = "Get dashboard", skip(inner))]
pub async fn get_dashboard(State(inner): State<InnerState>) -> Result<Json<ApiResponse<DashboardResponse>>, AppError> {
    let counts = inner.store.count_by_state().await?;
    let active_channels = inner.store.list_channels(true).await?.len();

    let total_videos = counts.iter().map(|(_, count)| count).sum();
    let states = counts
        .into_iter()
        .map(|(state, count)| StateCount { state, count })
        .collect();

    Ok(Json(ApiResponse::success(DashboardResponse {
        states,
        total_videos,
        active_channels,
    })))
}

#[tracing::instrument(name = "Get quota usage", skip(inner))]
pub async fn get_quota(State(inner): State<InnerState>) -> Result<Json<ApiResponse<QuotaUsage>>, AppError> {
    let usage = inner.quota.current_usage().await?;
    Ok(Json(ApiResponse::success(usage)))
}
