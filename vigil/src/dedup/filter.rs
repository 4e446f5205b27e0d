//! Chat alert and transcript dedup filters.

use std::collections::VecDeque;
use std::time::Instant;

use crate::domain::ChatAlert;

use super::normalize::{content_hash, jaccard_similarity, normalize_message};
use super::{DedupConfig, Verdict};

#[derive(Debug)]
struct AlertEntry {
    kind: &'static str,
    username: String,
    normalized: String,
    keywords: Vec<String>,
    score: Option<f64>,
    at: Instant,
}

/// Per-stream chat alert filter.
///
/// Admission runs checks in order, cheapest first: exact content hash,
/// sentiment-drift suppression, same-user fuzzy similarity and keyword
/// repeats, per-kind rate limit, and finally recording. Entries and hashes
/// age out of the rolling window and are hard-capped so a flooded room
/// cannot grow memory without bound.
#[derive(Debug)]
pub struct AlertFilter {
    config: DedupConfig,
    recent_hashes: VecDeque<(String, Instant)>,
    entries: VecDeque<AlertEntry>,
}

impl AlertFilter {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            recent_hashes: VecDeque::new(),
            entries: VecDeque::new(),
        }
    }

    /// Decide whether an alert is fresh enough to emit.
    pub fn admit(&mut self, alert: &ChatAlert) -> Verdict {
        self.admit_at(alert, Instant::now())
    }

    /// [`admit`] with an explicit clock, for deterministic tests.
    ///
    /// [`admit`]: AlertFilter::admit
    pub fn admit_at(&mut self, alert: &ChatAlert, now: Instant) -> Verdict {
        self.expire(now);

        let normalized = normalize_message(alert.message());
        let hash = content_hash(alert.username(), &normalized);

        // Step 1: exact repeat of a message we already alerted on.
        if self.recent_hashes.iter().any(|(h, _)| *h == hash) {
            return Verdict::DuplicateExact;
        }

        // Step 2: sentiment alerts from the same user are only interesting
        // when the score actually moved.
        if let ChatAlert::Sentiment { username, score, .. } = alert {
            let drifted = self.entries.iter().any(|e| {
                e.kind == "sentiment"
                    && e.username == *username
                    && now.duration_since(e.at) < self.config.sentiment_window
                    && e.score
                        .is_some_and(|prev| (prev - score).abs() < self.config.sentiment_delta)
            });
            if drifted {
                return Verdict::SentimentUnchanged;
            }
        }

        // Step 3: near-identical phrasing from the same user, or the same
        // keyword firing again for that user within the window.
        let similar = self.entries.iter().any(|e| {
            e.kind == alert.label()
                && e.username == alert.username()
                && now.duration_since(e.at) < self.config.window
                && jaccard_similarity(&e.normalized, &normalized)
                    >= self.config.similarity_threshold
        });
        if similar {
            return Verdict::DuplicateSimilar;
        }
        if let ChatAlert::Keyword { username, keywords, .. } = alert {
            let keyword_repeat = self.entries.iter().any(|e| {
                e.kind == "keyword"
                    && e.username == *username
                    && now.duration_since(e.at) < self.config.window
                    && keywords.iter().any(|kw| e.keywords.contains(kw))
            });
            if keyword_repeat {
                return Verdict::DuplicateSimilar;
            }
        }

        // Step 4: per-kind rate limit over the kind's window.
        let kind_window = match alert {
            ChatAlert::Keyword { .. } => self.config.window,
            ChatAlert::Sentiment { .. } => self.config.sentiment_window,
        };
        let recent_same_kind = self
            .entries
            .iter()
            .filter(|e| e.kind == alert.label() && now.duration_since(e.at) < kind_window)
            .count();
        if recent_same_kind >= self.config.max_per_kind {
            return Verdict::RateLimited;
        }

        // Step 5: record and admit.
        self.recent_hashes.push_back((hash, now));
        if self.recent_hashes.len() > self.config.hash_cap {
            self.recent_hashes.pop_front();
        }

        self.entries.push_back(AlertEntry {
            kind: alert.label(),
            username: alert.username().to_string(),
            normalized,
            keywords: match alert {
                ChatAlert::Keyword { keywords, .. } => keywords.clone(),
                ChatAlert::Sentiment { .. } => Vec::new(),
            },
            score: match alert {
                ChatAlert::Sentiment { score, .. } => Some(*score),
                ChatAlert::Keyword { .. } => None,
            },
            at: now,
        });
        if self.entries.len() > self.config.entry_cap {
            self.entries.pop_front();
        }

        Verdict::Fresh
    }

    /// Drop state older than the longest window in play. An entry exactly
    /// at the window boundary is expired.
    fn expire(&mut self, now: Instant) {
        let horizon = self.config.window.max(self.config.sentiment_window);
        self.recent_hashes
            .retain(|(_, at)| now.duration_since(*at) < self.config.window);
        self.entries
            .retain(|e| now.duration_since(e.at) < horizon);
    }
}

/// Per-stream transcript dedup.
///
/// Consecutive audio windows of a looping track transcribe to nearly the
/// same text; matches against recent transcripts by token overlap suppress
/// the repeats. Admitted transcripts also count against the per-kind
/// budget, so a talkative stream cannot flood alerts faster than chat can.
#[derive(Debug)]
pub struct TranscriptFilter {
    config: DedupConfig,
    recent: VecDeque<(String, Instant)>,
}

impl TranscriptFilter {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            recent: VecDeque::new(),
        }
    }

    pub fn admit(&mut self, transcript: &str) -> bool {
        self.admit_at(transcript, Instant::now())
    }

    pub fn admit_at(&mut self, transcript: &str, now: Instant) -> bool {
        self.recent
            .retain(|(_, at)| now.duration_since(*at) < self.config.window);

        let normalized = normalize_message(transcript);
        let duplicate = self.recent.iter().any(|(prev, _)| {
            jaccard_similarity(prev, &normalized) >= self.config.similarity_threshold
        });
        if duplicate {
            return false;
        }

        if self.recent.len() >= self.config.max_per_kind {
            return false;
        }

        self.recent.push_back((normalized, now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn keyword(username: &str, message: &str) -> ChatAlert {
        ChatAlert::Keyword {
            username: username.to_string(),
            message: message.to_string(),
            keywords: vec!["flag".to_string()],
        }
    }

    fn sentiment(username: &str, message: &str, score: f64) -> ChatAlert {
        ChatAlert::Sentiment {
            username: username.to_string(),
            message: message.to_string(),
            score,
        }
    }

    #[test]
    fn test_exact_repeat_is_rejected() {
        let mut filter = AlertFilter::new(DedupConfig::default());
        let now = Instant::now();

        assert_eq!(filter.admit_at(&keyword("bob", "flag this"), now), Verdict::Fresh);
        assert_eq!(
            filter.admit_at(&keyword("bob", "flag this"), now + Duration::from_secs(10)),
            Verdict::DuplicateExact
        );
        // The hash covers username, so the same text from another user is
        // a distinct alert; floods are handled by the rate limit instead.
        assert_eq!(
            filter.admit_at(&keyword("eve", "flag this"), now + Duration::from_secs(10)),
            Verdict::Fresh
        );
    }

    #[test]
    fn test_digit_variants_hash_equal() {
        let mut filter = AlertFilter::new(DedupConfig::default());
        let now = Instant::now();

        assert_eq!(filter.admit_at(&keyword("bob", "tip 100 now"), now), Verdict::Fresh);
        assert_eq!(
            filter.admit_at(&keyword("bob", "tip 250 now"), now + Duration::from_secs(1)),
            Verdict::DuplicateExact
        );
        // Runs of different lengths still collapse to the same mask.
        assert_eq!(
            filter.admit_at(&keyword("bob", "tip 5 now"), now + Duration::from_secs(2)),
            Verdict::DuplicateExact
        );
    }

    #[test]
    fn test_punctuation_variants_hash_equal() {
        let mut filter = AlertFilter::new(DedupConfig::default());
        let now = Instant::now();

        assert_eq!(
            filter.admit_at(&keyword("bob", "buy crypto now"), now),
            Verdict::Fresh
        );
        assert_eq!(
            filter.admit_at(&keyword("bob", "buy crypto now!!!"), now + Duration::from_secs(1)),
            Verdict::DuplicateExact
        );
    }

    #[test]
    fn test_window_expiry_readmits() {
        let config = DedupConfig::default();
        let window = config.window;
        let mut filter = AlertFilter::new(config);
        let now = Instant::now();

        assert_eq!(filter.admit_at(&keyword("bob", "flag this"), now), Verdict::Fresh);
        // Exactly at the boundary the old entry has expired.
        assert_eq!(
            filter.admit_at(&keyword("bob", "flag this"), now + window),
            Verdict::Fresh
        );
    }

    #[test]
    fn test_similar_phrasing_same_user_is_rejected() {
        let mut filter = AlertFilter::new(DedupConfig::default());
        let now = Instant::now();

        assert_eq!(
            filter.admit_at(&keyword("bob", "come see the flag show everyone"), now),
            Verdict::Fresh
        );
        assert_eq!(
            filter.admit_at(
                &keyword("bob", "come see the flag show everyone now"),
                now + Duration::from_secs(5)
            ),
            Verdict::DuplicateSimilar
        );
    }

    #[test]
    fn test_keyword_repeat_same_user_is_rejected() {
        let mut filter = AlertFilter::new(DedupConfig::default());
        let now = Instant::now();

        assert_eq!(filter.admit_at(&keyword("bob", "flag this now"), now), Verdict::Fresh);
        // Different phrasing, but the same keyword fired for the same user
        // inside the window.
        assert_eq!(
            filter.admit_at(
                &keyword("bob", "totally unrelated words here"),
                now + Duration::from_secs(30)
            ),
            Verdict::DuplicateSimilar
        );
        // Another user tripping the same keyword is still fresh.
        assert_eq!(
            filter.admit_at(
                &keyword("eve", "some other phrasing entirely"),
                now + Duration::from_secs(30)
            ),
            Verdict::Fresh
        );
    }

    #[test]
    fn test_rate_limit_per_kind() {
        let mut filter = AlertFilter::new(DedupConfig::default());
        let now = Instant::now();

        // Three distinct keyword alerts fill the budget.
        assert_eq!(filter.admit_at(&keyword("a", "alpha flag one"), now), Verdict::Fresh);
        assert_eq!(filter.admit_at(&keyword("b", "bravo topic two"), now), Verdict::Fresh);
        assert_eq!(filter.admit_at(&keyword("c", "charlie item three"), now), Verdict::Fresh);
        assert_eq!(
            filter.admit_at(&keyword("d", "delta thing four"), now),
            Verdict::RateLimited
        );

        // Sentiment has its own budget.
        assert_eq!(
            filter.admit_at(&sentiment("e", "echo bad mood here", -0.7), now),
            Verdict::Fresh
        );
    }

    #[test]
    fn test_sentiment_drift_suppression() {
        let mut filter = AlertFilter::new(DedupConfig::default());
        let now = Instant::now();

        assert_eq!(
            filter.admit_at(&sentiment("bob", "i hate this so much", -0.70), now),
            Verdict::Fresh
        );
        // Score barely moved: suppressed even though the text differs.
        assert_eq!(
            filter.admit_at(
                &sentiment("bob", "everything is awful today", -0.65),
                now + Duration::from_secs(60)
            ),
            Verdict::SentimentUnchanged
        );
        // A real swing gets through.
        assert_eq!(
            filter.admit_at(
                &sentiment("bob", "now it is truly unbearable", -0.95),
                now + Duration::from_secs(120)
            ),
            Verdict::Fresh
        );
    }

    #[test]
    fn test_hash_cap_evicts_oldest() {
        let config = DedupConfig {
            hash_cap: 2,
            ..DedupConfig::default()
        };
        let mut filter = AlertFilter::new(config);
        let now = Instant::now();

        filter.admit_at(&keyword("a", "first unique alpha"), now);
        filter.admit_at(&keyword("b", "second unique bravo"), now);
        filter.admit_at(&keyword("c", "third unique charlie"), now);
        assert!(filter.recent_hashes.len() <= 2);
    }

    #[test]
    fn test_transcript_filter_suppresses_repeats() {
        let mut filter = TranscriptFilter::new(DedupConfig::default());
        let now = Instant::now();

        assert!(filter.admit_at("welcome back to the stream everyone", now));
        assert!(!filter.admit_at(
            "welcome back to the stream everyone again",
            now + Duration::from_secs(30)
        ));
        assert!(filter.admit_at("completely different speech content here", now));
    }

    #[test]
    fn test_transcript_filter_rate_limit() {
        let config = DedupConfig::default();
        let window = config.window;
        let mut filter = TranscriptFilter::new(config);
        let now = Instant::now();

        assert!(filter.admit_at("first topic about cooking dinner", now));
        assert!(filter.admit_at("second subject regarding weekend plans", now));
        assert!(filter.admit_at("third thread covering travel stories", now));
        // Budget exhausted, even for unrelated speech.
        assert!(!filter.admit_at("fourth matter concerning garden work", now));
        // A fresh window resets the budget.
        assert!(filter.admit_at("fourth matter concerning garden work", now + window));
    }
}
