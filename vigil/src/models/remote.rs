//! HTTP clients for external inference services.
//!
//! Detection and transcription run in dedicated inference services; these
//! clients post raw tensors and parse the JSON results. Payloads are sent
//! as octet-stream bodies with shape metadata in headers so frames never
//! pass through a text encoding.

use async_trait::async_trait;
use segmenter::VideoFrame;
use serde::Deserialize;

use crate::Result;
use crate::error::Error;

use super::{ObjectDetector, ObjectHit, SpeechToText};

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    detections: Vec<RemoteHit>,
}

#[derive(Debug, Deserialize)]
struct RemoteHit {
    class: String,
    confidence: f32,
    bbox: [f32; 4],
}

/// Object detection served over HTTP.
pub struct RemoteObjectDetector {
    http: reqwest::Client,
    endpoint: String,
}

impl RemoteObjectDetector {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ObjectDetector for RemoteObjectDetector {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<ObjectHit>> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .header("X-Frame-Width", frame.width)
            .header("X-Frame-Height", frame.height)
            .header("X-Pixel-Format", "bgr24")
            .body(frame.pixels.clone())
            .send()
            .await
            .map_err(|e| Error::Other(format!("detector request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Other(format!("detector returned {e}")))?;

        let body: DetectionResponse = response
            .json()
            .await
            .map_err(|e| Error::Other(format!("unparseable detector response: {e}")))?;

        Ok(body
            .detections
            .into_iter()
            .map(|hit| ObjectHit {
                class: hit.class,
                confidence: hit.confidence,
                bbox: hit.bbox,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text served over HTTP.
pub struct RemoteSpeechToText {
    http: reqwest::Client,
    endpoint: String,
}

impl RemoteSpeechToText {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SpeechToText for RemoteSpeechToText {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        let mut body = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            body.extend_from_slice(&sample.to_le_bytes());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .header("X-Sample-Rate", sample_rate)
            .header("X-Sample-Format", "f32le")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Other(format!("transcriber request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Other(format!("transcriber returned {e}")))?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Other(format!("unparseable transcriber response: {e}")))?;

        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_response_parsing() {
        let raw = r#"{"detections":[{"class":"weapon","confidence":0.87,"bbox":[0.1,0.2,0.3,0.4]}]}"#;
        let body: DetectionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.detections.len(), 1);
        assert_eq!(body.detections[0].class, "weapon");
        assert_eq!(body.detections[0].bbox, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_transcription_response_parsing() {
        let raw = r#"{"text":"hello from the stream"}"#;
        let body: TranscriptionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.text, "hello from the stream");
    }
}
