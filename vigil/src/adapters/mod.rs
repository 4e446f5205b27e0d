//! Detection adapters.
//!
//! Each adapter wraps one external model behind a uniform contract: take
//! raw input, return normalized [`Detection`]s. Model failures surface as
//! errors to the calling worker loop, which logs and moves to the next
//! unit of work; one bad inference never kills a task.

mod resample;

pub use resample::resample_linear;

use std::sync::Arc;

use segmenter::{AudioSegment, VideoFrame};
use tracing::{debug, warn};

use crate::Result;
use crate::config::MonitorSettings;
use crate::domain::{ChatAlert, ChatMessage, Detection, DetectionKind, DetectionPayload, StreamHandle};
use crate::error::Error;
use crate::models::{ModelRegistry, match_keywords};
use crate::transcripts::{TranscriptArchive, TranscriptRecord};

/// Shared adapter state: model registry, flagged lists, thresholds.
pub struct DetectionAdapters {
    models: Arc<ModelRegistry>,
    archive: TranscriptArchive,
    flagged_keywords: Vec<String>,
    /// Object classes worth alerting on, with per-class confidence floors.
    flagged_objects: std::collections::HashMap<String, f32>,
    sentiment_threshold: f64,
    transcription_timeout: std::time::Duration,
    model_sample_rate: u32,
}

impl DetectionAdapters {
    pub fn new(
        models: Arc<ModelRegistry>,
        settings: &MonitorSettings,
        flagged_objects: std::collections::HashMap<String, f32>,
    ) -> Self {
        Self {
            models,
            archive: TranscriptArchive::new(&settings.transcript_dir),
            flagged_keywords: settings.flagged_keywords.clone(),
            flagged_objects,
            sentiment_threshold: settings.sentiment_threshold,
            transcription_timeout: settings.transcription_timeout,
            model_sample_rate: settings.model_sample_rate,
        }
    }

    /// Run object detection on one video frame.
    ///
    /// Only flagged classes at or above their confidence floor become
    /// detections; everything else the model sees is discarded here.
    pub async fn detect_objects(
        &self,
        handle: &StreamHandle,
        frame: &VideoFrame,
    ) -> Result<Vec<Detection>> {
        let detector = self.models.object_detector().await?;
        let hits = detector.detect(frame).await?;

        Ok(hits
            .into_iter()
            .filter(|hit| {
                self.flagged_objects
                    .get(&hit.class)
                    .is_some_and(|&floor| hit.confidence >= floor)
            })
            .map(|hit| {
                Detection::new(
                    DetectionKind::Video,
                    &handle.id,
                    &handle.streamer_name,
                    DetectionPayload::Video {
                        class: hit.class,
                        confidence: hit.confidence,
                        bbox: hit.bbox,
                    },
                )
            })
            .collect())
    }

    /// Transcribe one audio segment and match the transcript against the
    /// flagged keyword list.
    ///
    /// Audio is resampled to the model's rate first, and the model call is
    /// bounded by a hard timeout so a hung inference fails the unit of
    /// work instead of wedging the audio task. The transcript is archived
    /// whether or not anything matched; archival failure is logged only.
    pub async fn transcribe_and_match(
        &self,
        handle: &StreamHandle,
        segment: &AudioSegment,
    ) -> Result<(String, Vec<Detection>)> {
        let transcriber = self.models.speech_to_text().await?;

        let samples;
        let input = if segment.sample_rate == self.model_sample_rate {
            &segment.samples
        } else {
            samples = resample_linear(
                &segment.samples,
                segment.sample_rate,
                self.model_sample_rate,
            );
            &samples
        };

        let transcript = tokio::time::timeout(
            self.transcription_timeout,
            transcriber.transcribe(input, self.model_sample_rate),
        )
        .await
        .map_err(|_| Error::TranscriptionTimeout(self.transcription_timeout.as_secs()))??
        .to_lowercase();

        let matched = match_keywords(&transcript, &self.flagged_keywords);

        let record = TranscriptRecord {
            stream_url: handle.media_url().unwrap_or_default().to_string(),
            timestamp: chrono::Utc::now(),
            transcription: transcript.clone(),
            detected_keywords: matched.clone(),
        };
        if let Err(e) = self.archive.write(&record).await {
            warn!(stream_id = %handle.id, error = %e, "failed to archive transcript");
        }

        let detections = matched
            .into_iter()
            .map(|kw| {
                Detection::new(
                    DetectionKind::Audio,
                    &handle.id,
                    &handle.streamer_name,
                    DetectionPayload::Audio {
                        transcript: transcript.clone(),
                        keywords: vec![kw],
                    },
                )
            })
            .collect();

        Ok((transcript, detections))
    }

    /// Scan a batch of chat messages for keywords and negative sentiment.
    ///
    /// A single message can produce both a keyword and a sentiment
    /// detection.
    pub async fn scan_chat(
        &self,
        handle: &StreamHandle,
        messages: &[ChatMessage],
    ) -> Result<Vec<Detection>> {
        let scorer = self.models.sentiment_scorer().await?;
        let mut detections = Vec::new();

        for msg in messages {
            let matched = match_keywords(&msg.message, &self.flagged_keywords);
            if !matched.is_empty() {
                detections.push(Detection::new(
                    DetectionKind::Chat,
                    &handle.id,
                    &handle.streamer_name,
                    DetectionPayload::Chat(ChatAlert::Keyword {
                        username: msg.username.clone(),
                        message: msg.message.clone(),
                        keywords: matched,
                    }),
                ));
            }

            let score = scorer.score(&msg.message);
            if score < self.sentiment_threshold {
                detections.push(Detection::new(
                    DetectionKind::Chat,
                    &handle.id,
                    &handle.streamer_name,
                    DetectionPayload::Chat(ChatAlert::Sentiment {
                        username: msg.username.clone(),
                        message: msg.message.clone(),
                        score,
                    }),
                ));
            }
        }

        if !detections.is_empty() {
            debug!(
                stream_id = %handle.id,
                count = detections.len(),
                "chat scan produced detections"
            );
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::models::{LexiconSentiment, ObjectDetector, ObjectHit, SpeechToText};

    struct FixedDetector(Vec<ObjectHit>);

    #[async_trait]
    impl ObjectDetector for FixedDetector {
        async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<ObjectHit>> {
            Ok(self.0.clone())
        }
    }

    struct FixedTranscriber(String);

    #[async_trait]
    impl SpeechToText for FixedTranscriber {
        async fn transcribe(&self, _samples: &[f32], _rate: u32) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct HangingTranscriber;

    #[async_trait]
    impl SpeechToText for HangingTranscriber {
        async fn transcribe(&self, _samples: &[f32], _rate: u32) -> Result<String> {
            futures::future::pending().await
        }
    }

    struct RateRecorder(Mutex<Vec<(usize, u32)>>);

    #[async_trait]
    impl SpeechToText for RateRecorder {
        async fn transcribe(&self, samples: &[f32], rate: u32) -> Result<String> {
            self.0.lock().unwrap().push((samples.len(), rate));
            Ok(String::new())
        }
    }

    fn handle() -> StreamHandle {
        StreamHandle {
            id: "s1".to_string(),
            platform: crate::domain::Platform::Chaturbate,
            streamer_name: "alice".to_string(),
            media_url: Some("https://cdn.example.com/live.m3u8".to_string()),
            chat_url: None,
        }
    }

    fn settings(dir: &std::path::Path) -> MonitorSettings {
        MonitorSettings {
            flagged_keywords: vec!["knife".to_string(), "meet".to_string()],
            transcript_dir: dir.to_str().unwrap().to_string(),
            ..MonitorSettings::default()
        }
    }

    fn adapters_with(
        dir: &std::path::Path,
        transcriber: Arc<dyn SpeechToText>,
    ) -> DetectionAdapters {
        let models = Arc::new(ModelRegistry::with_models(
            Arc::new(FixedDetector(vec![
                ObjectHit {
                    class: "weapon".to_string(),
                    confidence: 0.9,
                    bbox: [0.1, 0.1, 0.2, 0.2],
                },
                // Below its class floor, must be filtered out.
                ObjectHit {
                    class: "bottle".to_string(),
                    confidence: 0.3,
                    bbox: [0.5, 0.5, 0.1, 0.1],
                },
                // Not flagged at all.
                ObjectHit {
                    class: "person".to_string(),
                    confidence: 0.99,
                    bbox: [0.0, 0.0, 1.0, 1.0],
                },
            ])),
            transcriber,
            Arc::new(LexiconSentiment::new()),
        ));
        let flagged_objects = std::collections::HashMap::from([
            ("weapon".to_string(), 0.5f32),
            ("bottle".to_string(), 0.7f32),
        ]);
        DetectionAdapters::new(models, &settings(dir), flagged_objects)
    }

    #[tokio::test]
    async fn test_detect_objects_maps_hits() {
        let dir = tempfile::tempdir().unwrap();
        let adapters = adapters_with(dir.path(), Arc::new(FixedTranscriber(String::new())));

        let frame = VideoFrame {
            timestamp: std::time::Duration::ZERO,
            width: 640,
            height: 480,
            pixels: bytes::Bytes::new(),
        };
        let detections = adapters.detect_objects(&handle(), &frame).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].kind, DetectionKind::Video);
        match &detections[0].payload {
            DetectionPayload::Video { class, .. } => assert_eq!(class, "weapon"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transcribe_matches_keywords_and_archives() {
        let dir = tempfile::tempdir().unwrap();
        let adapters = adapters_with(
            dir.path(),
            Arc::new(FixedTranscriber("He had a KNIFE and wants to MEET".to_string())),
        );

        let segment = AudioSegment {
            samples: vec![0.1; 16_000],
            sample_rate: 16_000,
        };
        let (transcript, detections) = adapters
            .transcribe_and_match(&handle(), &segment)
            .await
            .unwrap();

        // Transcript is lowercased before matching.
        assert_eq!(transcript, "he had a knife and wants to meet");
        assert_eq!(detections.len(), 2);

        // One archived file regardless of matches.
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_transcription_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.transcription_timeout = std::time::Duration::from_millis(20);

        let models = Arc::new(ModelRegistry::with_models(
            Arc::new(FixedDetector(Vec::new())),
            Arc::new(HangingTranscriber),
            Arc::new(LexiconSentiment::new()),
        ));
        let adapters = DetectionAdapters::new(models, &settings, Default::default());

        let segment = AudioSegment {
            samples: vec![0.1; 100],
            sample_rate: 16_000,
        };
        let err = adapters
            .transcribe_and_match(&handle(), &segment)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TranscriptionTimeout(_)));
    }

    #[tokio::test]
    async fn test_audio_resampled_to_model_rate() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(RateRecorder(Mutex::new(Vec::new())));
        let adapters = adapters_with(dir.path(), recorder.clone());

        let segment = AudioSegment {
            samples: vec![0.1; 32_000],
            sample_rate: 32_000,
        };
        adapters.transcribe_and_match(&handle(), &segment).await.unwrap();

        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (16_000, 16_000));
    }

    #[tokio::test]
    async fn test_scan_chat_emits_keyword_and_sentiment() {
        let dir = tempfile::tempdir().unwrap();
        let adapters = adapters_with(dir.path(), Arc::new(FixedTranscriber(String::new())));

        let messages = vec![
            ChatMessage {
                username: "bob".to_string(),
                message: "I will bring a knife, I hate you, this is the worst".to_string(),
                timestamp: chrono::Utc::now(),
            },
            ChatMessage {
                username: "carol".to_string(),
                message: "lovely stream today".to_string(),
                timestamp: chrono::Utc::now(),
            },
        ];

        let detections = adapters.scan_chat(&handle(), &messages).await.unwrap();
        // Bob's message trips both the keyword and the sentiment check.
        assert_eq!(detections.len(), 2);
        let labels: Vec<_> = detections
            .iter()
            .filter_map(|d| match &d.payload {
                DetectionPayload::Chat(alert) => Some(alert.label()),
                _ => None,
            })
            .collect();
        assert!(labels.contains(&"keyword"));
        assert!(labels.contains(&"sentiment"));
    }
}
