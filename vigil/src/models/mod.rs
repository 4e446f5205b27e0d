//! Inference model seams and the process-wide model registry.
//!
//! Models are expensive to load, so they are initialized lazily, exactly
//! once, and shared read-only across every stream task. The registry is an
//! explicit object handed to components at construction; nothing here is a
//! module-level global.

mod remote;
mod sentiment;

pub use remote::{RemoteObjectDetector, RemoteSpeechToText};
pub use sentiment::LexiconSentiment;

use std::sync::Arc;

use async_trait::async_trait;
use segmenter::VideoFrame;
use tokio::sync::OnceCell;

use crate::Result;

/// One object found in a video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHit {
    pub class: String,
    pub confidence: f32,
    /// Normalized [x, y, width, height].
    pub bbox: [f32; 4],
}

/// Object detection over decoded video frames.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<ObjectHit>>;
}

/// Speech-to-text over normalized mono f32 samples.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String>;
}

/// Compound sentiment scoring in [-1, 1]; more negative is more flagged.
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> f64;
}

type DetectorLoader = Box<dyn Fn() -> Result<Arc<dyn ObjectDetector>> + Send + Sync>;
type TranscriberLoader = Box<dyn Fn() -> Result<Arc<dyn SpeechToText>> + Send + Sync>;
type SentimentLoader = Box<dyn Fn() -> Result<Arc<dyn SentimentScorer>> + Send + Sync>;

/// Lazily-initialized, process-wide model instances.
///
/// Each model loads at most once no matter how many stream tasks race to
/// use it; a failed load is returned to the caller and retried on the next
/// access rather than poisoning the cell.
pub struct ModelRegistry {
    detector_loader: DetectorLoader,
    transcriber_loader: TranscriberLoader,
    sentiment_loader: SentimentLoader,

    detector: OnceCell<Arc<dyn ObjectDetector>>,
    transcriber: OnceCell<Arc<dyn SpeechToText>>,
    sentiment: OnceCell<Arc<dyn SentimentScorer>>,
}

impl ModelRegistry {
    pub fn new(
        detector_loader: DetectorLoader,
        transcriber_loader: TranscriberLoader,
        sentiment_loader: SentimentLoader,
    ) -> Self {
        Self {
            detector_loader,
            transcriber_loader,
            sentiment_loader,
            detector: OnceCell::new(),
            transcriber: OnceCell::new(),
            sentiment: OnceCell::new(),
        }
    }

    /// Registry with pre-built model instances, bypassing lazy loading.
    pub fn with_models(
        detector: Arc<dyn ObjectDetector>,
        transcriber: Arc<dyn SpeechToText>,
        sentiment: Arc<dyn SentimentScorer>,
    ) -> Self {
        Self::new(
            Box::new(move || Ok(detector.clone())),
            Box::new(move || Ok(transcriber.clone())),
            Box::new(move || Ok(sentiment.clone())),
        )
    }

    pub async fn object_detector(&self) -> Result<Arc<dyn ObjectDetector>> {
        self.detector
            .get_or_try_init(|| async { (self.detector_loader)() })
            .await
            .cloned()
    }

    pub async fn speech_to_text(&self) -> Result<Arc<dyn SpeechToText>> {
        self.transcriber
            .get_or_try_init(|| async { (self.transcriber_loader)() })
            .await
            .cloned()
    }

    pub async fn sentiment_scorer(&self) -> Result<Arc<dyn SentimentScorer>> {
        self.sentiment
            .get_or_try_init(|| async { (self.sentiment_loader)() })
            .await
            .cloned()
    }
}

/// Flagged keywords found in a text, case-insensitive substring match.
pub fn match_keywords(text: &str, flagged: &[String]) -> Vec<String> {
    let lowered = text.to_lowercase();
    flagged
        .iter()
        .filter(|kw| !kw.is_empty() && lowered.contains(kw.to_lowercase().as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoopDetector;

    #[async_trait]
    impl ObjectDetector for NoopDetector {
        async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<ObjectHit>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_match_keywords_case_insensitive_substring() {
        let flagged = vec!["knife".to_string(), "cash".to_string()];
        let hits = match_keywords("He pulled a KNIFE out", &flagged);
        assert_eq!(hits, vec!["knife".to_string()]);

        assert!(match_keywords("nothing here", &flagged).is_empty());
    }

    #[tokio::test]
    async fn test_loader_runs_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let registry = ModelRegistry::new(
            Box::new(|| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(NoopDetector) as Arc<dyn ObjectDetector>)
            }),
            Box::new(|| unreachable!("transcriber not used")),
            Box::new(|| unreachable!("sentiment not used")),
        );

        registry.object_detector().await.unwrap();
        registry.object_detector().await.unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let registry = ModelRegistry::new(
            Box::new(|| {
                if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(crate::error::Error::Other("load failed".to_string()))
                } else {
                    Ok(Arc::new(NoopDetector) as Arc<dyn ObjectDetector>)
                }
            }),
            Box::new(|| unreachable!()),
            Box::new(|| unreachable!()),
        );

        assert!(registry.object_detector().await.is_err());
        assert!(registry.object_detector().await.is_ok());
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }
}
