use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use tracing::{error, warn};

use crate::errors::AppError;
use crate::InnerState;

pub const ADMIN_KEY_HEADER: &str = "x-api-key";

/// Requires `x-api-key` to match `ADMIN_API_KEY` in production. Development passes through.
pub async fn admin_key_middleware(
    State(inner): State<InnerState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !inner.settings.is_production() {
        return Ok(next.run(request).await);
    }

    let expected = inner.settings.admin_api_key.as_ref().ok_or_else(|| {
        error!("ADMIN_API_KEY not set, refusing admin request");
        AppError::Unauthorized("Admin endpoints are disabled".to_string())
    })?;

    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() || provided != expected.expose_secret().as_str() {
        warn!("Rejected admin request to {}", request.uri().path());
        return Err(AppError::Unauthorized("Invalid or missing admin API key".to_string()));
    }

    Ok(next.run(request).await)
}
