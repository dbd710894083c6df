//! API Version 1 endpoints
//!
//! Video curation: cached YouTube metadata, review tags, themes and the dashboard.

pub mod admin;
pub mod channels;
pub mod dashboard;
pub mod entities;
pub mod services;
pub mod videos;

use axum::routing::{get, post, put};
use axum::{middleware, Router};

use crate::api::common::middleware::admin_key_middleware;
use crate::InnerState;

/// Creates the V1 API router
#[tracing::instrument(name = "create_v1_router", skip(state))]
pub fn create_v1_router(state: InnerState) -> Router<InnerState> {
    tracing::info!("Creating V1 API router");

    let admin = Router::new()
        .route("/api/v1/admin/migrate-video-states", post(admin::migrate_video_states))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_key_middleware));

    Router::new()
        .route("/api/v1/videos", get(videos::list_videos))
        .route("/api/v1/videos/state/:state", get(videos::videos_by_state))
        .route("/api/v1/videos/:video_id", get(videos::get_video))
        .route("/api/v1/videos/:video_id/state", put(videos::update_video_state))
        .route("/api/v1/videos/:video_id/themes", post(videos::add_video_theme))

        .route("/api/v1/themes", get(videos::all_themes))

        .route("/api/v1/channels", get(channels::all_channels).post(channels::upsert_channel))
        .route("/api/v1/channels/:channel_id/videos", get(channels::channel_videos))
        .route("/api/v1/sync", post(channels::sync_channels))

        .route("/api/v1/dashboard", get(dashboard::get_dashboard))
        .route("/api/v1/quota", get(dashboard::get_quota))

        .merge(admin)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::entities::ReviewState;
    use crate::api::v1::services::record_store::tests::sample_video;
    use crate::api::v1::services::youtube_video_sync::tests::{raw, Behavior, FakeProvider};
    use crate::config::Settings;
    use crate::db::init_test_db;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state_with(env: &[(&str, &str)], behavior: Behavior) -> InnerState {
        let map: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let settings = Settings::from_lookup(|key| map.get(key).cloned()).unwrap();
        InnerState::new(init_test_db().await, settings, Arc::new(FakeProvider::new(behavior)))
    }

    async fn dev_state() -> InnerState {
        state_with(&[("ENVIRONMENT", "development")], Behavior::Succeed(Vec::new())).await
    }

    fn app(state: InnerState) -> Router {
        create_v1_router(state.clone()).with_state(state)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn tagging_flow_moves_video_between_buckets() {
        let state = dev_state().await;
        state.store.upsert_video(&sample_video("V1", "C1", 200)).await.unwrap();

        let (status, body) = send(app(state.clone()), Method::GET, "/api/v1/videos/state/A%20voir%20!", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["videoId"], "V1");
        assert_eq!(body["data"][0]["publishedLabel"], "15 Janvier 2025");

        let (status, body) = send(
            app(state.clone()),
            Method::PUT,
            "/api/v1/videos/V1/state",
            Some(json!({ "state": "Recommander" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "Recommander");
        assert_eq!(body["data"]["duration"], "3:20");

        let (_, body) = send(app(state.clone()), Method::GET, "/api/v1/videos/state/A%20voir%20!", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);

        let (_, body) = send(app(state.clone()), Method::GET, "/api/v1/videos/V1", None).await;
        assert_eq!(body["data"]["displayState"], "Recommander");
        assert_eq!(body["data"]["video"]["state"], "Recommander");
    }

    #[tokio::test]
    async fn invalid_state_is_rejected_before_any_write() {
        let state = dev_state().await;
        state.store.upsert_video(&sample_video("V1", "C1", 200)).await.unwrap();

        let (status, body) = send(
            app(state.clone()),
            Method::PUT,
            "/api/v1/videos/V1/state",
            Some(json!({ "state": "Vu" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, _) = send(app(state.clone()), Method::PUT, "/api/v1/videos/V1/state", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(state.store.find_review_state("V1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_video_is_not_found() {
        let state = dev_state().await;

        let (status, body) = send(
            app(state.clone()),
            Method::PUT,
            "/api/v1/videos/missing/state",
            Some(json!({ "state": "Recommander" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);

        let (status, _) = send(app(state), Method::GET, "/api/v1/videos/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_videos_honours_filters() {
        let state = dev_state().await;
        state.store.upsert_video(&sample_video("V1", "C1", 200)).await.unwrap();
        state.store.upsert_video(&sample_video("V2", "C1", 200)).await.unwrap();
        state
            .store
            .set_video_state("V2", ReviewState::Impressive, Default::default())
            .await
            .unwrap();

        let (status, body) = send(app(state.clone()), Method::GET, "/api/v1/videos?state=Impressionnant", None).await;
        assert_eq!(status, StatusCode::OK);
        let videos = body["data"].as_array().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0]["videoId"], "V2");

        let (_, body) = send(app(state.clone()), Method::GET, "/api/v1/videos?limit=1&random=true", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(app(state), Method::GET, "/api/v1/videos?state=Nope", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn themes_are_created_and_attached() {
        let state = dev_state().await;
        state.store.upsert_video(&sample_video("V1", "C1", 200)).await.unwrap();

        for _ in 0..2 {
            let (status, body) = send(
                app(state.clone()),
                Method::POST,
                "/api/v1/videos/V1/themes",
                Some(json!({ "name": "Rust" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["name"], "Rust");
        }

        let (_, body) = send(app(state.clone()), Method::GET, "/api/v1/themes", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            app(state),
            Method::POST,
            "/api/v1/videos/V1/themes",
            Some(json!({ "name": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn channel_videos_go_through_the_cache() {
        let state = state_with(
            &[("ENVIRONMENT", "development")],
            Behavior::Succeed(vec![raw("V1", "C1", "PT4M"), raw("V2", "C1", "PT1M")]),
        )
        .await;

        let (status, body) = send(
            app(state.clone()),
            Method::POST,
            "/api/v1/channels",
            Some(json!({ "channelId": "C1", "title": "Test Channel" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isActive"], true);

        let (status, body) = send(app(state.clone()), Method::GET, "/api/v1/channels/C1/videos", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "upstream");
        assert_eq!(body["data"]["videos"].as_array().unwrap().len(), 1);

        let (_, body) = send(app(state.clone()), Method::GET, "/api/v1/channels/C1/videos", None).await;
        assert_eq!(body["data"]["source"], "cache");

        let (_, body) = send(app(state.clone()), Method::GET, "/api/v1/quota", None).await;
        assert_eq!(body["data"]["quotaUsed"], 2);

        let (_, body) = send(app(state), Method::GET, "/api/v1/dashboard", None).await;
        assert_eq!(body["data"]["totalVideos"], 1);
        assert_eq!(body["data"]["activeChannels"], 1);
    }

    #[tokio::test]
    async fn channel_payload_is_validated() {
        let state = dev_state().await;
        let (status, _) = send(app(state), Method::POST, "/api/v1/channels", Some(json!({ "title": "No id" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_without_cache_is_bad_gateway() {
        let state = state_with(&[("ENVIRONMENT", "development")], Behavior::Fail).await;
        let (status, body) = send(app(state), Method::GET, "/api/v1/channels/C1/videos", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], 502);
    }

    #[tokio::test]
    async fn sync_reports_each_channel() {
        let state = state_with(
            &[("ENVIRONMENT", "development")],
            Behavior::Succeed(vec![raw("V1", "C1", "PT4M")]),
        )
        .await;
        state
            .store
            .upsert_channel(&crate::api::v1::entities::ChannelUpsert::new("C1", "One"))
            .await
            .unwrap();

        let (status, body) = send(app(state), Method::POST, "/api/v1/sync", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["channelId"], "C1");
        assert_eq!(body["data"][0]["videoCount"], 1);
    }

    #[tokio::test]
    async fn admin_migration_requires_key_in_production() {
        let state = state_with(&[("ADMIN_API_KEY", "letmein")], Behavior::Succeed(Vec::new())).await;

        let (status, _) = send(app(state.clone()), Method::POST, "/api/v1/admin/migrate-video-states", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/admin/migrate-video-states")
            .header("x-api-key", "letmein")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_migration_is_open_in_development() {
        let state = dev_state().await;
        let (status, body) = send(app(state), Method::POST, "/api/v1/admin/migrate-video-states", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 0);
    }
}
