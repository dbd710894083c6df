//! Row types for the tables behind the v1 API.

pub mod channels;
pub mod review_state;
pub mod themes;
pub mod video_states;
pub mod videos;

pub use channels::{Channel, ChannelUpsert};
pub use review_state::{LegacyReviewTag, ReviewState};
pub use themes::Theme;
pub use video_states::VideoReviewState;
pub use videos::{VideoRecord, VideoUpsert};
