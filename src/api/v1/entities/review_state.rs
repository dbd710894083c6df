use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// The user's classification of a video. Any tag may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
pub enum ReviewState {
    #[default]
    #[serde(rename = "A voir !")]
    #[sqlx(rename = "A voir !")]
    ToWatch,
    #[serde(rename = "Impressionnant")]
    #[sqlx(rename = "Impressionnant")]
    Impressive,
    #[serde(rename = "Recommander")]
    #[sqlx(rename = "Recommander")]
    Recommend,
    #[serde(rename = "Ne pas recommander")]
    #[sqlx(rename = "Ne pas recommander")]
    DoNotRecommend,
}

impl ReviewState {
    pub const ALL: [ReviewState; 4] = [
        ReviewState::ToWatch,
        ReviewState::Impressive,
        ReviewState::Recommend,
        ReviewState::DoNotRecommend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::ToWatch => "A voir !",
            ReviewState::Impressive => "Impressionnant",
            ReviewState::Recommend => "Recommander",
            ReviewState::DoNotRecommend => "Ne pas recommander",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ReviewState::ALL
            .into_iter()
            .find(|state| state.as_str() == trimmed)
            .ok_or_else(|| AppError::Validation(format!("Invalid state value: {}", s)))
    }
}

/// Spellings found in data written before the four-tag model.
/// Rewritten once by `RecordStore::migrate_legacy_review_tags`, never read directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyReviewTag {
    Seen,
    MindBlown,
}

impl LegacyReviewTag {
    pub const ALL: [LegacyReviewTag; 2] = [LegacyReviewTag::Seen, LegacyReviewTag::MindBlown];

    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyReviewTag::Seen => "Vu",
            LegacyReviewTag::MindBlown => "🤯",
        }
    }

    pub fn replacement(&self) -> ReviewState {
        match self {
            LegacyReviewTag::Seen => ReviewState::Recommend,
            LegacyReviewTag::MindBlown => ReviewState::Impressive,
        }
    }
}
