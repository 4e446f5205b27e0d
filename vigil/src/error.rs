//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("media segmentation error: {0}")]
    Segmenter(#[from] segmenter::Error),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("failed to resolve media URL for {streamer}: {reason}")]
    ResolutionFailed { streamer: String, reason: String },

    #[error("transcription timed out after {0}s")]
    TranscriptionTimeout(u64),

    #[error("worker pool exhausted ({capacity} slots in use)")]
    PoolExhausted { capacity: usize },

    #[error("stream {stream_id} has no usable URLs (media: {has_media}, chat: {has_chat})")]
    MissingUrls {
        stream_id: String,
        has_media: bool,
        has_chat: bool,
    },

    #[error("entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resolution(streamer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            streamer: streamer.into(),
            reason: reason.into(),
        }
    }

    /// Whether a background sweep should treat this error as retryable
    /// rather than aborting its loop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::ResolutionFailed { .. } | Self::Segmenter(_)
        )
    }
}
