use anyhow::Context;
use secrecy::Secret;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound accepted by the YouTube Data API for `maxResults`.
/// Ten years. Anything longer is a typo rather than a cache policy.
pub const MAX_CACHE_TTL_HOURS: i64 = 24 * 365 * 10;

pub const YOUTUBE_MAX_RESULTS_CAP: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => anyhow::bail!("{} is not a supported environment", other),
        }
    }
}

pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub environment: Environment,
    pub youtube_api_key: Option<Secret<String>>,
    pub admin_api_key: Option<Secret<String>>,
    pub cache_ttl_hours: i64,
    pub min_video_duration_seconds: i64,
    pub max_results_per_channel: u32,
    pub upstream_timeout: Duration,
    pub sync_concurrency: usize,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match non_empty("ENVIRONMENT") {
            Some(value) => value.parse().context("Invalid ENVIRONMENT")?,
            None => Environment::Production,
        };

        let cache_ttl_hours: i64 = parse_or(&non_empty, "YOUTUBE_CACHE_TTL_HOURS", 24)?;
        if cache_ttl_hours < 0 {
            anyhow::bail!("YOUTUBE_CACHE_TTL_HOURS must not be negative");
        }
        if cache_ttl_hours > MAX_CACHE_TTL_HOURS {
            anyhow::bail!("YOUTUBE_CACHE_TTL_HOURS must be at most {}", MAX_CACHE_TTL_HOURS);
        }

        let max_results: u32 = parse_or(&non_empty, "YOUTUBE_MAX_RESULTS", YOUTUBE_MAX_RESULTS_CAP)?;
        let timeout_secs: u64 = parse_or(&non_empty, "YOUTUBE_TIMEOUT_SECS", 10)?;
        let sync_concurrency: usize = parse_or(&non_empty, "SYNC_CONCURRENCY", 4)?;

        Ok(Self {
            database_url: non_empty("DATABASE_URL").unwrap_or_else(|| "sqlite://veille.db".to_string()),
            bind_address: non_empty("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3001".to_string()),
            environment,
            youtube_api_key: non_empty("YOUTUBE_API_KEY").map(Secret::new),
            admin_api_key: non_empty("ADMIN_API_KEY").map(Secret::new),
            cache_ttl_hours,
            min_video_duration_seconds: parse_or(&non_empty, "MIN_VIDEO_DURATION_SECONDS", 180)?,
            max_results_per_channel: max_results.clamp(1, YOUTUBE_MAX_RESULTS_CAP),
            upstream_timeout: Duration::from_secs(timeout_secs.max(1)),
            sync_concurrency: sync_concurrency.max(1),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
