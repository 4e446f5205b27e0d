//! Alert deduplication.
//!
//! Raw detections repeat heavily: a weapon stays in frame, spam floods a
//! room, a looping track transcribes to the same words each window. The
//! deduplicator sits between the adapters and notification and admits only
//! alerts that add information. State is per-stream under the hood but
//! owned by one process-wide object so tests and the orchestrator control
//! its lifetime explicitly.

mod cooldown;
mod filter;
mod normalize;

pub use cooldown::ClassCooldown;
pub use filter::{AlertFilter, TranscriptFilter};
pub use normalize::{content_hash, jaccard_similarity, normalize_message};

use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::ChatAlert;

/// Why an alert was admitted or suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fresh,
    DuplicateExact,
    DuplicateSimilar,
    RateLimited,
    SentimentUnchanged,
}

impl Verdict {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Verdict::Fresh)
    }
}

/// Tunables for the chat and transcript filters.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Rolling window for exact/fuzzy matching and keyword rate limiting.
    pub window: Duration,
    /// Token-overlap similarity at or above which texts are duplicates.
    pub similarity_threshold: f64,
    /// Alerts admitted per kind per window.
    pub max_per_kind: usize,
    /// Window for sentiment rate limiting and drift suppression.
    pub sentiment_window: Duration,
    /// Sentiment score must move at least this much to re-alert.
    pub sentiment_delta: f64,
    /// Hard cap on remembered content hashes.
    pub hash_cap: usize,
    /// Hard cap on remembered alert entries.
    pub entry_cap: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            similarity_threshold: 0.8,
            max_per_kind: 3,
            sentiment_window: Duration::from_secs(600),
            sentiment_delta: 0.1,
            hash_cap: 1_000,
            entry_cap: 10_000,
        }
    }
}

/// Process-wide dedup state, keyed by stream.
///
/// Each stream's filters are independent; a mutex per stream keeps the
/// three worker tasks of one stream from interleaving updates.
pub struct AlertDeduplicator {
    config: DedupConfig,
    video_cooldown: Duration,
    chat: DashMap<String, Mutex<AlertFilter>>,
    transcripts: DashMap<String, Mutex<TranscriptFilter>>,
    video: DashMap<String, Mutex<ClassCooldown>>,
}

impl AlertDeduplicator {
    pub fn new(config: DedupConfig, video_cooldown: Duration) -> Self {
        Self {
            config,
            video_cooldown,
            chat: DashMap::new(),
            transcripts: DashMap::new(),
            video: DashMap::new(),
        }
    }

    /// Run a chat alert through the stream's filter.
    pub fn admit_chat(&self, stream_id: &str, alert: &ChatAlert) -> Verdict {
        let entry = self
            .chat
            .entry(stream_id.to_string())
            .or_insert_with(|| Mutex::new(AlertFilter::new(self.config.clone())));
        let verdict = entry.lock().admit(alert);
        if !verdict.is_fresh() {
            debug!(stream_id, ?verdict, kind = alert.label(), "chat alert suppressed");
        }
        verdict
    }

    /// Whether a transcript adds new content for this stream.
    pub fn admit_transcript(&self, stream_id: &str, transcript: &str) -> bool {
        let entry = self
            .transcripts
            .entry(stream_id.to_string())
            .or_insert_with(|| Mutex::new(TranscriptFilter::new(self.config.clone())));
        let fresh = entry.lock().admit(transcript);
        if !fresh {
            debug!(stream_id, "transcript suppressed as near-duplicate");
        }
        fresh
    }

    /// Whether a video alert for this class is off cooldown.
    pub fn admit_video(&self, stream_id: &str, class: &str) -> bool {
        let entry = self
            .video
            .entry(stream_id.to_string())
            .or_insert_with(|| Mutex::new(ClassCooldown::new(self.video_cooldown)));
        let fresh = entry.lock().admit(class);
        if !fresh {
            debug!(stream_id, class, "video alert suppressed by class cooldown");
        }
        fresh
    }

    /// Release all dedup state for a stream when monitoring stops.
    pub fn release_stream(&self, stream_id: &str) {
        self.chat.remove(stream_id);
        self.transcripts.remove(stream_id);
        self.video.remove(stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dedup() -> AlertDeduplicator {
        AlertDeduplicator::new(DedupConfig::default(), Duration::from_secs(60))
    }

    fn keyword(message: &str) -> ChatAlert {
        ChatAlert::Keyword {
            username: "bob".to_string(),
            message: message.to_string(),
            keywords: vec!["flag".to_string()],
        }
    }

    #[test]
    fn test_streams_are_isolated() {
        let dedup = dedup();

        assert!(dedup.admit_chat("s1", &keyword("flag this")).is_fresh());
        assert!(!dedup.admit_chat("s1", &keyword("flag this")).is_fresh());
        // The identical message on another stream is fresh.
        assert!(dedup.admit_chat("s2", &keyword("flag this")).is_fresh());
    }

    #[test]
    fn test_release_stream_clears_state() {
        let dedup = dedup();

        assert!(dedup.admit_video("s1", "weapon"));
        assert!(!dedup.admit_video("s1", "weapon"));

        dedup.release_stream("s1");
        assert!(dedup.admit_video("s1", "weapon"));
    }

    #[test]
    fn test_transcript_admission() {
        let dedup = dedup();
        assert!(dedup.admit_transcript("s1", "hello out there everyone"));
        assert!(!dedup.admit_transcript("s1", "hello out there everyone"));
    }
}
