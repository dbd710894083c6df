use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::common::ApiResponse;
use crate::InnerState;

/// Liveness plus a round trip to the database.
pub async fn health_check(State(inner): State<InnerState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(inner.store.pool()).await {
        Ok(_) => (StatusCode::OK, Json(ApiResponse::success("OK"))),
        Err(e) => {
            tracing::error!("Health check failed to reach the database: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::error("Database unavailable".to_string())),
            )
        }
    }
}
