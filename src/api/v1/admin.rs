use axum::extract::State;
use axum::Json;

use crate::api::common::ApiResponse;
use crate::api::v1::services::record_store::LegacyMigrationReport;
use crate::errors::AppError;
use crate::InnerState;

/// Rewrites legacy review tags on demand. Guarded by `admin_key_middleware`.
#[tracing::instrument(name = "Migrate video states", skip(inner))]
pub async fn migrate_video_states(
    State(inner): State<InnerState>,
) -> Result<Json<ApiResponse<LegacyMigrationReport>>, AppError> {
    let report = inner.store.migrate_legacy_review_tags().await?;

    let mut response = ApiResponse::success(report.clone());
    response.message = Some(format!("{} review tags migrated", report.total));
    Ok(Json(response))
}
