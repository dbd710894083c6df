mod api;
mod config;
mod db;
mod errors;
mod system;

use std::error::Error;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::common::tracing::{make_custom_span, on_custom_failure, on_custom_request, on_custom_response};
use crate::api::v1::services::quota::QuotaTracker;
use crate::api::v1::services::record_store::{RecordStore, LEGACY_REVIEW_TAGS_MIGRATION};
use crate::api::v1::services::youtube_api::{VideoProvider, YoutubeApiClient};
use crate::api::v1::services::youtube_video_sync::{SyncOptions, VideoSyncService};
use crate::config::Settings;
use crate::db::init_db;

#[derive(Clone)]
pub struct InnerState {
    pub store: RecordStore,
    pub sync: VideoSyncService,
    pub quota: QuotaTracker,
    pub settings: Arc<Settings>,
}

impl InnerState {
    pub fn new(db: SqlitePool, settings: Settings, provider: Arc<dyn VideoProvider>) -> Self {
        let store = RecordStore::new(db.clone());
        let quota = QuotaTracker::new(db);
        let sync = VideoSyncService::new(
            store.clone(),
            quota.clone(),
            provider,
            SyncOptions::from_settings(&settings),
        );

        Self {
            store,
            sync,
            quota,
            settings: Arc::new(settings),
        }
    }
}

/// Rewrites legacy review tags once per database.
async fn run_pending_data_migrations(store: &RecordStore) -> anyhow::Result<()> {
    if store.data_migration_applied(LEGACY_REVIEW_TAGS_MIGRATION).await? {
        tracing::debug!("Data migration {} already applied", LEGACY_REVIEW_TAGS_MIGRATION);
        return Ok(());
    }

    let report = store.migrate_legacy_review_tags().await?;
    tracing::info!("Applied data migration {}: {} rows", LEGACY_REVIEW_TAGS_MIGRATION, report.total);
    Ok(())
}

/// Assembles every router behind the shared middleware stack. The metrics layer is outermost.
fn build_app(app_state: InnerState) -> Router {
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    Router::new()
        .merge(system::create_system_router(app_state.clone()))
        .merge(api::create_api_router(app_state.clone()))
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(
            ServiceBuilder::new()
                .layer(prometheus_layer)
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(make_custom_span)
                        .on_request(on_custom_request)
                        .on_response(on_custom_response)
                        .on_failure(on_custom_failure),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veille_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = Settings::from_env()?;
    if settings.youtube_api_key.is_none() {
        tracing::warn!("YOUTUBE_API_KEY not set, channels will only be served from cache");
    }

    let db = init_db(&settings.database_url).await?;

    let provider = Arc::new(YoutubeApiClient::new(
        settings.youtube_api_key.take(),
        settings.upstream_timeout,
    )?);

    let bind_address = settings.bind_address.clone();
    let app_state = InnerState::new(db, settings, provider);

    run_pending_data_migrations(&app_state.store).await?;

    let app = build_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::services::youtube_video_sync::tests::{Behavior, FakeProvider};
    use crate::db::init_test_db;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    // The metrics recorder is process-global, so this is the only test that builds the full app.
    #[tokio::test]
    async fn full_stack_serves_health_and_metrics() {
        let settings =
            Settings::from_lookup(|key| (key == "ENVIRONMENT").then(|| "development".to_string())).unwrap();
        let provider = Arc::new(FakeProvider::new(Behavior::Succeed(Vec::new())));
        let state = InnerState::new(init_test_db().await, settings, provider);
        let app = build_app(state);

        let request = Request::builder()
            .uri("/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("access-control-allow-origin"));
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!body.is_empty());

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
