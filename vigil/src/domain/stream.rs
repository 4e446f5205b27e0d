//! Stream identity and platform types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported streaming platforms.
///
/// Each variant carries enough to build platform-specific requests; the
/// media URL itself lives on [`StreamHandle`] so callers never reach into
/// platform internals to find it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Chaturbate,
    Stripchat,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Chaturbate => write!(f, "chaturbate"),
            Platform::Stripchat => write!(f, "stripchat"),
        }
    }
}

/// Identity of a monitored stream, immutable for a monitoring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHandle {
    pub id: String,
    pub platform: Platform,
    pub streamer_name: String,
    /// Direct playable media URL (HLS playlist), if known.
    pub media_url: Option<String>,
    /// Room page URL used for chat fetching.
    pub chat_url: Option<String>,
}

impl StreamHandle {
    /// The URL used for media monitoring.
    pub fn media_url(&self) -> Option<&str> {
        self.media_url.as_deref()
    }

    /// The URL used for chat monitoring.
    pub fn chat_url(&self) -> Option<&str> {
        self.chat_url.as_deref()
    }
}

/// Lifecycle status of a stream as persisted in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Online,
    Offline,
    Monitoring,
    Stopped,
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamStatus::Online => write!(f, "online"),
            StreamStatus::Offline => write!(f, "offline"),
            StreamStatus::Monitoring => write!(f, "monitoring"),
            StreamStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// One chat message fetched from a platform room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
