//! Single write path for channels, videos, review states and themes.
//!
//! Every create-or-update is one `INSERT … ON CONFLICT` statement keyed by the external id,
//! so overlapping refresh cycles for the same channel never produce duplicate rows.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::api::v1::entities::videos::watch_url;
use crate::api::v1::entities::{
    Channel, ChannelUpsert, LegacyReviewTag, ReviewState, Theme, VideoRecord, VideoReviewState,
    VideoUpsert,
};
use crate::api::v1::services::formatting::format_duration;
use crate::errors::AppError;

pub const LEGACY_REVIEW_TAGS_MIGRATION: &str = "2025-03-legacy-review-tags";

/// Candidates drawn before shuffling in random mode.
const RANDOM_SAMPLE_POOL: u32 = 100;

const CHANNEL_COLUMNS: &str = "channel_id, title, description, thumbnail_url, subscriber_count, \
     theme, is_active, last_updated, created_at";

const VIDEO_COLUMNS: &str = "video_id, channel_id, channel_title, title, description, \
     thumbnail_url, published_at, video_url, duration, duration_seconds, view_count, \
     like_count, theme, state, last_fetched";

const REVIEW_STATE_COLUMNS: &str =
    "video_id, state, duration, duration_seconds, notes, rating, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct VideoQuery {
    pub state: Option<ReviewState>,
    pub limit: u32,
    /// Fresh shuffle of the newest candidates on every call.
    pub random: bool,
}

/// Optional duration supplied alongside a state change, used only when the review-state row
/// has none yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationBackfill {
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video: VideoRecord,
    pub review_state: Option<VideoReviewState>,
    pub themes: Vec<Theme>,
    /// The review-state row's tag when present, the cached row's otherwise.
    pub display_state: ReviewState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMigrationReport {
    pub seen_to_recommend: u64,
    pub mind_blown_to_impressive: u64,
    pub total: u64,
}

#[derive(Clone, Debug)]
pub struct RecordStore {
    db: SqlitePool,
}

impl RecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    #[tracing::instrument(name = "Upsert channel", skip(self, channel), fields(channel_id = %channel.channel_id))]
    pub async fn upsert_channel(&self, channel: &ChannelUpsert) -> Result<Channel, AppError> {
        validate_channel(channel)?;
        let mut conn = self.db.acquire().await?;
        upsert_channel_in(&mut conn, channel, Utc::now()).await
    }

    /// Creates a placeholder channel when unseen, otherwise only touches `last_updated`.
    #[tracing::instrument(name = "Ensure channel exists", skip(self))]
    pub async fn ensure_channel(&self, channel_id: &str, fallback_title: &str) -> Result<Channel, AppError> {
        if channel_id.trim().is_empty() {
            return Err(AppError::Validation("Channel ID is required".to_string()));
        }

        let now = Utc::now();
        let sql = format!(
            r#"INSERT INTO channels (channel_id, title, is_active, last_updated, created_at)
               VALUES (?1, ?2, 1, ?3, ?3)
               ON CONFLICT (channel_id) DO UPDATE SET last_updated = excluded.last_updated
               RETURNING {}"#,
            CHANNEL_COLUMNS
        );

        let channel = sqlx::query_as::<_, Channel>(&sql)
            .bind(channel_id)
            .bind(fallback_title)
            .bind(now)
            .fetch_one(&self.db)
            .await?;

        Ok(channel)
    }

    pub async fn find_channel(&self, channel_id: &str) -> Result<Option<Channel>, AppError> {
        let sql = format!("SELECT {} FROM channels WHERE channel_id = ?1", CHANNEL_COLUMNS);
        let channel = sqlx::query_as::<_, Channel>(&sql)
            .bind(channel_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(channel)
    }

    pub async fn list_channels(&self, active_only: bool) -> Result<Vec<Channel>, AppError> {
        let sql = format!(
            "SELECT {} FROM channels WHERE (?1 = 0 OR is_active = 1) ORDER BY title ASC",
            CHANNEL_COLUMNS
        );
        let channels = sqlx::query_as::<_, Channel>(&sql)
            .bind(active_only)
            .fetch_all(&self.db)
            .await?;
        Ok(channels)
    }

    /// Upserts the owning channel then the video, in one transaction.
    #[tracing::instrument(name = "Upsert video", skip(self, video), fields(video_id = %video.video_id, channel_id = %video.channel_id))]
    pub async fn upsert_video(&self, video: &VideoUpsert) -> Result<VideoRecord, AppError> {
        validate_video(video)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut channel = ChannelUpsert::new(video.channel_id.clone(), video.channel_title.clone());
        if channel.title.trim().is_empty() {
            channel.title = "Unknown Channel".to_string();
        }
        upsert_channel_in(&mut tx, &channel, now).await?;

        let record = upsert_video_in(&mut tx, video, now).await?;

        // An explicit tag must not leave the review-state row behind.
        if let Some(state) = video.state {
            sqlx::query("UPDATE video_states SET state = ?1, updated_at = ?2 WHERE video_id = ?3")
                .bind(state.as_str())
                .bind(now)
                .bind(&video.video_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(record)
    }

    pub async fn find_video(&self, video_id: &str) -> Result<Option<VideoRecord>, AppError> {
        let mut conn = self.db.acquire().await?;
        find_video_in(&mut conn, video_id).await
    }

    /// Cached videos of a channel, newest published first.
    pub async fn videos_for_channel(&self, channel_id: &str) -> Result<Vec<VideoRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM videos WHERE channel_id = ?1 ORDER BY published_at DESC",
            VIDEO_COLUMNS
        );
        let videos = sqlx::query_as::<_, VideoRecord>(&sql)
            .bind(channel_id)
            .fetch_all(&self.db)
            .await?;
        Ok(videos)
    }

    /// `last_fetched` of the most recently fetched cached video of a channel.
    pub async fn latest_fetch_for_channel(&self, channel_id: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        let latest = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT last_fetched FROM videos WHERE channel_id = ?1 ORDER BY last_fetched DESC LIMIT 1",
        )
        .bind(channel_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(latest)
    }

    /// Writes the tag to the review-state row and to the cached video row in one transaction.
    #[tracing::instrument(name = "Set video state", skip(self))]
    pub async fn set_video_state(
        &self,
        video_id: &str,
        state: ReviewState,
        backfill: DurationBackfill,
    ) -> Result<VideoReviewState, AppError> {
        if video_id.trim().is_empty() {
            return Err(AppError::Validation("Video ID is required".to_string()));
        }
        if matches!(backfill.duration_seconds, Some(seconds) if seconds < 0) {
            return Err(AppError::Validation("durationSeconds must not be negative".to_string()));
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // Writing first takes the write lock up front, so a concurrent commit makes this wait
        // on the busy timeout instead of failing a read-to-write upgrade.
        let stored_seconds = sqlx::query_scalar::<_, i64>(
            "UPDATE videos SET state = ?1 WHERE video_id = ?2 RETURNING duration_seconds",
        )
        .bind(state.as_str())
        .bind(video_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

        let duration_seconds = backfill.duration_seconds.unwrap_or(stored_seconds);
        let duration = format_duration(duration_seconds);

        let sql = format!(
            r#"INSERT INTO video_states (video_id, state, duration, duration_seconds, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?5)
               ON CONFLICT (video_id) DO UPDATE SET
                   state = excluded.state,
                   duration = CASE WHEN video_states.duration_seconds IS NULL
                       THEN excluded.duration ELSE video_states.duration END,
                   duration_seconds = COALESCE(video_states.duration_seconds, excluded.duration_seconds),
                   updated_at = excluded.updated_at
               RETURNING {}"#,
            REVIEW_STATE_COLUMNS
        );

        let review_state = sqlx::query_as::<_, VideoReviewState>(&sql)
            .bind(video_id)
            .bind(state.as_str())
            .bind(&duration)
            .bind(duration_seconds)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Video {} is now tagged {}", video_id, state);
        Ok(review_state)
    }

    pub async fn find_review_state(&self, video_id: &str) -> Result<Option<VideoReviewState>, AppError> {
        let sql = format!("SELECT {} FROM video_states WHERE video_id = ?1", REVIEW_STATE_COLUMNS);
        let review_state = sqlx::query_as::<_, VideoReviewState>(&sql)
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(review_state)
    }

    /// One dashboard bucket, newest published first.
    pub async fn get_by_state(&self, state: ReviewState) -> Result<Vec<VideoRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM videos WHERE state = ?1 ORDER BY published_at DESC",
            VIDEO_COLUMNS
        );
        let videos = sqlx::query_as::<_, VideoRecord>(&sql)
            .bind(state.as_str())
            .fetch_all(&self.db)
            .await?;
        Ok(videos)
    }

    #[tracing::instrument(name = "List videos", skip(self))]
    pub async fn list_videos(&self, query: &VideoQuery) -> Result<Vec<VideoRecord>, AppError> {
        let fetch_limit = if query.random {
            RANDOM_SAMPLE_POOL.max(query.limit)
        } else {
            query.limit
        };

        let sql = format!(
            "SELECT {} FROM videos WHERE (?1 IS NULL OR state = ?1) ORDER BY published_at DESC LIMIT ?2",
            VIDEO_COLUMNS
        );
        let mut videos = sqlx::query_as::<_, VideoRecord>(&sql)
            .bind(query.state.map(|s| s.as_str()))
            .bind(i64::from(fetch_limit))
            .fetch_all(&self.db)
            .await?;

        if query.random {
            videos.shuffle(&mut rand::thread_rng());
            videos.truncate(query.limit as usize);
        }

        Ok(videos)
    }

    pub async fn video_details(&self, video_id: &str) -> Result<VideoDetails, AppError> {
        let video = self
            .find_video(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;
        let review_state = self.find_review_state(video_id).await?;
        let themes = self.themes_for_video(video_id).await?;

        let display_state = review_state
            .as_ref()
            .map(|rs| rs.state)
            .unwrap_or(video.state);

        Ok(VideoDetails {
            video,
            review_state,
            themes,
            display_state,
        })
    }

    /// Number of cached videos per review tag; tags without videos report zero.
    pub async fn count_by_state(&self) -> Result<Vec<(ReviewState, i64)>, AppError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, COUNT(*) AS count FROM videos GROUP BY state",
        )
        .fetch_all(&self.db)
        .await?;

        let mut counts: Vec<(ReviewState, i64)> = ReviewState::ALL.iter().map(|s| (*s, 0)).collect();
        for (label, count) in rows {
            match label.parse::<ReviewState>() {
                Ok(state) => {
                    if let Some(entry) = counts.iter_mut().find(|(s, _)| *s == state) {
                        entry.1 = count;
                    }
                }
                Err(_) => tracing::warn!("{} videos carry the unmigrated tag {:?}", count, label),
            }
        }

        Ok(counts)
    }

    #[tracing::instrument(name = "Upsert theme", skip(self))]
    pub async fn upsert_theme(&self, name: &str) -> Result<Theme, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Theme name is required".to_string()));
        }

        let now = Utc::now();
        let theme = sqlx::query_as::<_, Theme>(
            r#"INSERT INTO themes (id, name, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?3)
               ON CONFLICT (name) DO UPDATE SET name = excluded.name
               RETURNING id, name, created_at, updated_at"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(name)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(theme)
    }

    /// Idempotent: attaching an already attached theme is a no-op.
    #[tracing::instrument(name = "Attach theme", skip(self))]
    pub async fn attach_theme(&self, video_id: &str, theme_id: &str) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"INSERT INTO video_themes (video_id, theme_id, created_at, updated_at)
               SELECT ?1, ?2, ?3, ?3
               WHERE EXISTS (SELECT 1 FROM videos WHERE video_id = ?1)
                 AND EXISTS (SELECT 1 FROM themes WHERE id = ?2)
               ON CONFLICT (video_id, theme_id) DO NOTHING"#,
        )
        .bind(video_id)
        .bind(theme_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Either already attached or one side is missing.
            if find_video_in(&mut tx, video_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Video {} not found", video_id)));
            }
            let theme_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM themes WHERE id = ?1")
                .bind(theme_id)
                .fetch_one(&mut *tx)
                .await?;
            if theme_exists == 0 {
                return Err(AppError::NotFound(format!("Theme {} not found", theme_id)));
            }
        }

        tx.commit().await?;

        tracing::debug!("Attached theme {} to video {}: {} new rows", theme_id, video_id, result.rows_affected());
        Ok(())
    }

    /// Creates the theme by name when needed and attaches it to the video.
    pub async fn add_theme_to_video(&self, video_id: &str, theme_name: &str) -> Result<Theme, AppError> {
        if self.find_video(video_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Video {} not found", video_id)));
        }
        let theme = self.upsert_theme(theme_name).await?;
        self.attach_theme(video_id, &theme.id).await?;
        Ok(theme)
    }

    pub async fn list_themes(&self) -> Result<Vec<Theme>, AppError> {
        let themes = sqlx::query_as::<_, Theme>(
            "SELECT id, name, created_at, updated_at FROM themes ORDER BY name ASC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(themes)
    }

    pub async fn themes_for_video(&self, video_id: &str) -> Result<Vec<Theme>, AppError> {
        let themes = sqlx::query_as::<_, Theme>(
            r#"SELECT t.id, t.name, t.created_at, t.updated_at
               FROM themes t
               INNER JOIN video_themes vt ON vt.theme_id = t.id
               WHERE vt.video_id = ?1
               ORDER BY t.name ASC"#,
        )
        .bind(video_id)
        .fetch_all(&self.db)
        .await?;
        Ok(themes)
    }

    /// Rewrites the pre-enum spellings ("Vu", "🤯") in both tag locations and records the run.
    /// Safe to repeat: a second run finds nothing to rewrite.
    #[tracing::instrument(name = "Migrate legacy review tags", skip(self))]
    pub async fn migrate_legacy_review_tags(&self) -> Result<LegacyMigrationReport, AppError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut report = LegacyMigrationReport::default();

        for tag in LegacyReviewTag::ALL {
            let target = tag.replacement();

            let states = sqlx::query("UPDATE video_states SET state = ?1, updated_at = ?2 WHERE state = ?3")
                .bind(target.as_str())
                .bind(now)
                .bind(tag.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let videos = sqlx::query("UPDATE videos SET state = ?1 WHERE state = ?2")
                .bind(target.as_str())
                .bind(tag.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();

            match tag {
                LegacyReviewTag::Seen => report.seen_to_recommend = states + videos,
                LegacyReviewTag::MindBlown => report.mind_blown_to_impressive = states + videos,
            }
        }
        report.total = report.seen_to_recommend + report.mind_blown_to_impressive;

        sqlx::query(
            r#"INSERT INTO data_migrations (name, rows_affected, applied_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT (name) DO UPDATE SET
                   rows_affected = data_migrations.rows_affected + excluded.rows_affected,
                   applied_at = excluded.applied_at"#,
        )
        .bind(LEGACY_REVIEW_TAGS_MIGRATION)
        .bind(report.total as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            seen_to_recommend = report.seen_to_recommend,
            mind_blown_to_impressive = report.mind_blown_to_impressive,
            "Legacy review tag migration completed"
        );
        Ok(report)
    }

    pub async fn data_migration_applied(&self, name: &str) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM data_migrations WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }
}

fn validate_channel(channel: &ChannelUpsert) -> Result<(), AppError> {
    if channel.channel_id.trim().is_empty() {
        return Err(AppError::Validation("Channel ID is required".to_string()));
    }
    if channel.title.trim().is_empty() {
        return Err(AppError::Validation("Channel title is required".to_string()));
    }
    if matches!(channel.subscriber_count, Some(count) if count < 0) {
        return Err(AppError::Validation("subscriberCount must not be negative".to_string()));
    }
    Ok(())
}

fn validate_video(video: &VideoUpsert) -> Result<(), AppError> {
    if video.video_id.trim().is_empty() {
        return Err(AppError::Validation("Video ID is required".to_string()));
    }
    if video.channel_id.trim().is_empty() {
        return Err(AppError::Validation("Channel ID is required".to_string()));
    }
    if video.duration_seconds < 0 {
        return Err(AppError::Validation("durationSeconds must not be negative".to_string()));
    }
    Ok(())
}

async fn upsert_channel_in(
    conn: &mut SqliteConnection,
    channel: &ChannelUpsert,
    now: DateTime<Utc>,
) -> Result<Channel, AppError> {
    let sql = format!(
        r#"INSERT INTO channels
               (channel_id, title, description, thumbnail_url, subscriber_count, theme, is_active, last_updated, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
           ON CONFLICT (channel_id) DO UPDATE SET
               title = excluded.title,
               description = COALESCE(excluded.description, channels.description),
               thumbnail_url = COALESCE(excluded.thumbnail_url, channels.thumbnail_url),
               subscriber_count = COALESCE(excluded.subscriber_count, channels.subscriber_count),
               theme = COALESCE(excluded.theme, channels.theme),
               last_updated = excluded.last_updated
           RETURNING {}"#,
        CHANNEL_COLUMNS
    );

    let record = sqlx::query_as::<_, Channel>(&sql)
        .bind(channel.channel_id.trim())
        .bind(channel.title.trim())
        .bind(channel.description.as_deref())
        .bind(channel.thumbnail_url.as_deref())
        .bind(channel.subscriber_count)
        .bind(channel.theme.as_deref())
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(record)
}

async fn upsert_video_in(
    conn: &mut SqliteConnection,
    video: &VideoUpsert,
    now: DateTime<Utc>,
) -> Result<VideoRecord, AppError> {
    let sql = format!(
        r#"INSERT INTO videos
               (video_id, channel_id, channel_title, title, description, thumbnail_url, published_at,
                video_url, duration, duration_seconds, view_count, like_count, theme, state, last_fetched)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, COALESCE(?14, ?15), ?16)
           ON CONFLICT (video_id) DO UPDATE SET
               channel_id = excluded.channel_id,
               channel_title = excluded.channel_title,
               title = excluded.title,
               description = excluded.description,
               thumbnail_url = excluded.thumbnail_url,
               published_at = excluded.published_at,
               video_url = excluded.video_url,
               duration = excluded.duration,
               duration_seconds = excluded.duration_seconds,
               view_count = COALESCE(excluded.view_count, videos.view_count),
               like_count = COALESCE(excluded.like_count, videos.like_count),
               theme = COALESCE(excluded.theme, videos.theme),
               state = COALESCE(?14, videos.state),
               last_fetched = excluded.last_fetched
           RETURNING {}"#,
        VIDEO_COLUMNS
    );

    let record = sqlx::query_as::<_, VideoRecord>(&sql)
        .bind(&video.video_id)
        .bind(&video.channel_id)
        .bind(&video.channel_title)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(video.published_at)
        .bind(watch_url(&video.video_id))
        .bind(format_duration(video.duration_seconds))
        .bind(video.duration_seconds)
        .bind(video.view_count)
        .bind(video.like_count)
        .bind(video.theme.as_deref())
        .bind(video.state.map(|s| s.as_str()))
        .bind(ReviewState::default().as_str())
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

    Ok(record)
}

async fn find_video_in(conn: &mut SqliteConnection, video_id: &str) -> Result<Option<VideoRecord>, AppError> {
    let sql = format!("SELECT {} FROM videos WHERE video_id = ?1", VIDEO_COLUMNS);
    let video = sqlx::query_as::<_, VideoRecord>(&sql)
        .bind(video_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(video)
}
