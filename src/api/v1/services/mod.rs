//! Domain services behind the v1 handlers.

pub mod formatting;
pub mod metadata_cache;
pub mod quota;
pub mod record_store;
pub mod youtube_api;
pub mod youtube_video_sync;
