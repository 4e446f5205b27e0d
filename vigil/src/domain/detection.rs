//! Detection events produced by the per-stream analysis tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which analysis modality produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Video,
    Audio,
    Chat,
}

impl std::fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionKind::Video => write!(f, "video"),
            DetectionKind::Audio => write!(f, "audio"),
            DetectionKind::Chat => write!(f, "chat"),
        }
    }
}

/// What kind of chat content triggered an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatAlert {
    /// A flagged keyword appeared in a chat message.
    Keyword {
        username: String,
        message: String,
        keywords: Vec<String>,
    },
    /// Message sentiment crossed the configured negativity threshold.
    Sentiment {
        username: String,
        message: String,
        score: f64,
    },
}

impl ChatAlert {
    pub fn username(&self) -> &str {
        match self {
            ChatAlert::Keyword { username, .. } => username,
            ChatAlert::Sentiment { username, .. } => username,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ChatAlert::Keyword { message, .. } => message,
            ChatAlert::Sentiment { message, .. } => message,
        }
    }

    /// Short label used for per-kind rate limiting.
    pub fn label(&self) -> &'static str {
        match self {
            ChatAlert::Keyword { .. } => "keyword",
            ChatAlert::Sentiment { .. } => "sentiment",
        }
    }
}

/// Modality-specific detection details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum DetectionPayload {
    Video {
        class: String,
        confidence: f32,
        /// Normalized [x, y, width, height] of the detected region.
        bbox: [f32; 4],
    },
    Audio {
        transcript: String,
        keywords: Vec<String>,
    },
    Chat(ChatAlert),
}

/// A single detection event emitted downstream after deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub kind: DetectionKind,
    pub stream_id: String,
    pub streamer_name: String,
    pub timestamp: DateTime<Utc>,
    pub payload: DetectionPayload,
}

impl Detection {
    pub fn new(
        kind: DetectionKind,
        stream_id: impl Into<String>,
        streamer_name: impl Into<String>,
        payload: DetectionPayload,
    ) -> Self {
        Self {
            kind,
            stream_id: stream_id.into(),
            streamer_name: streamer_name.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}
