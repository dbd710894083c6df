//! YouTube Data API v3 client.
//!
//! Quota-efficient: reads the channel's uploads playlist with `playlistItems.list` (1 unit),
//! then fetches details for those ids with `videos.list` (1 unit for up to 50 videos),
//! instead of `search.list` (100 units).

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::config::YOUTUBE_MAX_RESULTS_CAP;
use crate::errors::AppError;

pub const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";

/// One upstream video before any normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVideo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub channel_id: String,
    pub channel_title: String,
    /// RFC 3339, as sent by the API.
    pub published_at: String,
    /// ISO 8601 duration, e.g. `PT12M30S`.
    pub duration: String,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
}

/// What a provider returned for one channel, with the quota it cost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderBatch {
    pub entries: Vec<RawVideo>,
    pub quota_units: i64,
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn fetch_channel_videos(&self, channel_id: &str, max_results: u32) -> Result<ProviderBatch, AppError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubeVideoListResponse {
    #[serde(default)]
    items: Vec<YoutubeVideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YoutubeVideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    published_at: String,
    channel_id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
    #[serde(default)]
    channel_title: String,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    maxres: Option<Thumbnail>,
}

impl Thumbnails {
    fn best_url(&self) -> String {
        self.maxres
            .as_ref()
            .or(self.standard.as_ref())
            .or(self.high.as_ref())
            .or(self.medium.as_ref())
            .or(self.default.as_ref())
            .map(|t| t.url.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
}

/// Items without a snippet (private or deleted videos) are skipped.
fn into_raw_video(item: YoutubeVideoItem) -> Option<RawVideo> {
    let snippet = item.snippet?;
    let duration = item.content_details.map(|cd| cd.duration).unwrap_or_default();
    let (view_count, like_count) = item
        .statistics
        .map(|s| {
            (
                s.view_count.and_then(|v| v.parse().ok()),
                s.like_count.and_then(|v| v.parse().ok()),
            )
        })
        .unwrap_or((None, None));

    Some(RawVideo {
        thumbnail_url: snippet.thumbnails.best_url(),
        video_id: item.id,
        title: snippet.title,
        description: snippet.description,
        channel_id: snippet.channel_id,
        channel_title: snippet.channel_title,
        published_at: snippet.published_at,
        duration,
        view_count,
        like_count,
    })
}

/// Channel uploads playlist id: "UU" followed by the channel id without its "UC" prefix.
pub fn uploads_playlist_id(channel_id: &str) -> String {
    match channel_id.strip_prefix("UC") {
        Some(rest) => format!("UU{}", rest),
        None => format!("UU{}", channel_id),
    }
}

pub struct YoutubeApiClient {
    http_client: Client,
    api_key: Option<Secret<String>>,
    base_url: Url,
}

impl YoutubeApiClient {
    pub fn new(api_key: Option<Secret<String>>, timeout: Duration) -> Result<Self, AppError> {
        Self::with_base_url(api_key, timeout, YOUTUBE_API_BASE_URL)
    }

    pub fn with_base_url(
        api_key: Option<Secret<String>>,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Unexpected(anyhow::Error::new(e).context("Failed to build HTTP client")))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: Url::parse(base_url)?,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, AppError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            AppError::ExternalService(anyhow::anyhow!("YOUTUBE_API_KEY is not configured"))
        })?;

        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", api_key.expose_secret());
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, AppError> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("YouTube API error ({}): {}", status, error_text);
            return Err(AppError::ExternalService(anyhow::anyhow!(
                "YouTube API returned {}: {}",
                status,
                error_text
            )));
        }

        Ok(response.json().await?)
    }

    /// Video ids from the channel's uploads playlist (1 quota unit).
    async fn fetch_uploads_playlist(&self, channel_id: &str, max_results: u32) -> Result<Vec<String>, AppError> {
        let playlist_id = uploads_playlist_id(channel_id);
        let max_results = max_results.clamp(1, YOUTUBE_MAX_RESULTS_CAP).to_string();
        let url = self.endpoint(
            "playlistItems",
            &[
                ("playlistId", playlist_id.as_str()),
                ("part", "contentDetails"),
                ("maxResults", max_results.as_str()),
            ],
        )?;

        let data: PlaylistItemsResponse = self.get_json(url).await?;
        Ok(data.items.into_iter().map(|i| i.content_details.video_id).collect())
    }

    /// Details for up to 50 ids (1 quota unit).
    async fn fetch_video_details(&self, video_ids: &[String]) -> Result<Vec<RawVideo>, AppError> {
        let ids_param = video_ids.join(",");
        let url = self.endpoint(
            "videos",
            &[
                ("id", ids_param.as_str()),
                ("part", "snippet,contentDetails,statistics"),
            ],
        )?;

        let data: YoutubeVideoListResponse = self.get_json(url).await?;
        Ok(data.items.into_iter().filter_map(into_raw_video).collect())
    }
}

#[async_trait]
impl VideoProvider for YoutubeApiClient {
    #[tracing::instrument(name = "Fetch YouTube channel videos", skip(self))]
    async fn fetch_channel_videos(&self, channel_id: &str, max_results: u32) -> Result<ProviderBatch, AppError> {
        let video_ids = self.fetch_uploads_playlist(channel_id, max_results).await?;
        let mut quota_units = 1;

        if video_ids.is_empty() {
            info!("No videos found in uploads playlist for channel: {}", channel_id);
            return Ok(ProviderBatch { entries: Vec::new(), quota_units });
        }

        let entries = self.fetch_video_details(&video_ids).await?;
        quota_units += 1;

        info!("Fetched {} videos for channel {}", entries.len(), channel_id);
        Ok(ProviderBatch { entries, quota_units })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_playlist_swaps_channel_prefix() {
        assert_eq!(uploads_playlist_id("UCabc123"), "UUabc123");
        assert_eq!(uploads_playlist_id("abc123"), "UUabc123");
    }

    #[test]
    fn endpoint_requires_an_api_key() {
        let client = YoutubeApiClient::new(None, Duration::from_secs(1)).unwrap();
        let err = client.endpoint("videos", &[]).unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn endpoint_encodes_parameters() {
        let client = YoutubeApiClient::new(Some(Secret::new("k&y".to_string())), Duration::from_secs(1)).unwrap();
        let url = client
            .endpoint("playlistItems", &[("playlistId", "UUabc"), ("maxResults", "50")])
            .unwrap();

        assert_eq!(url.path(), "/youtube/v3/playlistItems");
        assert_eq!(url.query(), Some("playlistId=UUabc&maxResults=50&key=k%26y"));
    }

    #[test]
    fn video_items_map_to_raw_videos() {
        let payload = serde_json::json!({
            "kind": "youtube#videoListResponse",
            "items": [
                {
                    "id": "V1",
                    "snippet": {
                        "publishedAt": "2025-01-15T12:00:00Z",
                        "channelId": "UC1",
                        "title": "Rust &amp; Tokio",
                        "description": "",
                        "channelTitle": "Test Channel",
                        "thumbnails": {
                            "default": { "url": "https://i.ytimg.com/vi/V1/default.jpg" },
                            "high": { "url": "https://i.ytimg.com/vi/V1/hqdefault.jpg", "width": 480 }
                        }
                    },
                    "contentDetails": { "duration": "PT12M30S" },
                    "statistics": { "viewCount": "1234", "likeCount": "not a number" }
                },
                { "id": "V2" }
            ]
        });

        let response: YoutubeVideoListResponse = serde_json::from_value(payload).unwrap();
        let videos: Vec<RawVideo> = response.items.into_iter().filter_map(into_raw_video).collect();

        assert_eq!(videos.len(), 1);
        let video = &videos[0];
        assert_eq!(video.video_id, "V1");
        assert_eq!(video.title, "Rust &amp; Tokio");
        assert_eq!(video.thumbnail_url, "https://i.ytimg.com/vi/V1/hqdefault.jpg");
        assert_eq!(video.duration, "PT12M30S");
        assert_eq!(video.view_count, Some(1234));
        assert_eq!(video.like_count, None);
    }
}
