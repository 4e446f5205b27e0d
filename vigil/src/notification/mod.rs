//! Alert delivery.
//!
//! Detections that survive deduplication become [`AlertEvent`]s and go out
//! through a [`NotificationDispatcher`]. A per-stream, per-kind cooldown
//! sits in front of dispatch so a noisy stream cannot flood operators even
//! when each individual detection is genuinely new. Periodic digests and
//! high-priority system alerts ride the same dispatcher.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::domain::{Detection, DetectionKind};

/// Broadcast channel capacity for alert subscribers.
const ALERT_BROADCAST_CAPACITY: usize = 256;

/// How urgently an alert needs human eyes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Normal,
    High,
}

impl std::fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertPriority::Normal => write!(f, "normal"),
            AlertPriority::High => write!(f, "high"),
        }
    }
}

/// Per-stream detection counts aggregated over a digest window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSummary {
    pub streamer_name: String,
    pub video: usize,
    pub audio: usize,
    pub chat: usize,
    pub window_secs: u64,
}

impl DigestSummary {
    pub fn total(&self) -> usize {
        self.video + self.audio + self.chat
    }
}

/// What an alert carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AlertBody {
    /// A single deduplicated detection.
    Detection(Detection),
    /// Aggregated recent activity for one stream.
    Digest(DigestSummary),
    /// Operational condition needing admin attention.
    System {
        priority: AlertPriority,
        message: String,
    },
}

/// One alert as delivered downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Unique id for correlating this alert across consumers.
    pub id: Uuid,
    pub stream_id: String,
    pub timestamp: DateTime<Utc>,
    /// Human-readable one-line summary.
    pub summary: String,
    pub body: AlertBody,
}

impl AlertEvent {
    pub fn from_detection(detection: Detection) -> Self {
        let summary = match &detection.payload {
            crate::domain::DetectionPayload::Video { class, confidence, .. } => {
                format!(
                    "[video] {} detected on {} ({:.0}%)",
                    class,
                    detection.streamer_name,
                    confidence * 100.0
                )
            }
            crate::domain::DetectionPayload::Audio { keywords, .. } => {
                format!(
                    "[audio] flagged keywords {:?} heard on {}",
                    keywords, detection.streamer_name
                )
            }
            crate::domain::DetectionPayload::Chat(alert) => {
                format!(
                    "[chat/{}] {} in {}'s room: {}",
                    alert.label(),
                    alert.username(),
                    detection.streamer_name,
                    alert.message()
                )
            }
        };
        Self {
            id: Uuid::new_v4(),
            stream_id: detection.stream_id.clone(),
            timestamp: detection.timestamp,
            summary,
            body: AlertBody::Detection(detection),
        }
    }

    pub fn digest(stream_id: impl Into<String>, digest: DigestSummary) -> Self {
        let summary = format!(
            "[digest] {} detections on {} in the last {}s (video {}, audio {}, chat {})",
            digest.total(),
            digest.streamer_name,
            digest.window_secs,
            digest.video,
            digest.audio,
            digest.chat
        );
        Self {
            id: Uuid::new_v4(),
            stream_id: stream_id.into(),
            timestamp: Utc::now(),
            summary,
            body: AlertBody::Digest(digest),
        }
    }

    pub fn system(
        stream_id: impl Into<String>,
        priority: AlertPriority,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            id: Uuid::new_v4(),
            stream_id: stream_id.into(),
            timestamp: Utc::now(),
            summary: format!("[system/{priority}] {message}"),
            body: AlertBody::System { priority, message },
        }
    }
}

/// Delivery seam for alerts.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: &AlertEvent) -> Result<()>;
}

/// Dispatcher that fans alerts out over a broadcast channel and logs them.
///
/// Subscribers (a webhook forwarder, a UI feed) attach via [`subscribe`]
/// and receive every dispatched alert; lagging subscribers drop oldest.
///
/// [`subscribe`]: BroadcastDispatcher::subscribe
pub struct BroadcastDispatcher {
    tx: broadcast::Sender<AlertEvent>,
}

impl BroadcastDispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ALERT_BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDispatcher for BroadcastDispatcher {
    async fn dispatch(&self, event: &AlertEvent) -> Result<()> {
        info!(stream_id = %event.stream_id, "{}", event.summary);
        // No subscribers is fine; the log line above is the floor.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Rate-limits dispatch to one alert per stream and kind per cooldown window.
///
/// Digests use the same cooldown but are keyed per stream only; system
/// alerts are never throttled.
pub struct NotificationGate {
    dispatcher: Arc<dyn NotificationDispatcher>,
    cooldown: Duration,
    last_sent: DashMap<(String, DetectionKind), Instant>,
    last_digest: DashMap<String, Instant>,
}

impl NotificationGate {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>, cooldown: Duration) -> Self {
        Self {
            dispatcher,
            cooldown,
            last_sent: DashMap::new(),
            last_digest: DashMap::new(),
        }
    }

    /// Dispatch unless the same stream and kind alerted within the cooldown.
    /// Returns whether the alert went out.
    pub async fn notify(&self, detection: Detection) -> Result<bool> {
        let key = (detection.stream_id.clone(), detection.kind);
        let now = Instant::now();

        if let Some(last) = self.last_sent.get(&key) {
            if now.duration_since(*last) < self.cooldown {
                debug!(
                    stream_id = %key.0,
                    kind = %key.1,
                    "alert suppressed by notification cooldown"
                );
                return Ok(false);
            }
        }

        self.last_sent.insert(key, now);
        self.dispatcher
            .dispatch(&AlertEvent::from_detection(detection))
            .await?;
        Ok(true)
    }

    /// Dispatch a digest unless one went out for this stream within the
    /// cooldown, however many detections it covers.
    pub async fn notify_digest(&self, stream_id: &str, digest: DigestSummary) -> Result<bool> {
        let now = Instant::now();
        if let Some(last) = self.last_digest.get(stream_id) {
            if now.duration_since(*last) < self.cooldown {
                debug!(stream_id, "digest suppressed by cooldown");
                return Ok(false);
            }
        }

        self.last_digest.insert(stream_id.to_string(), now);
        self.dispatcher
            .dispatch(&AlertEvent::digest(stream_id, digest))
            .await?;
        Ok(true)
    }

    /// Dispatch an operational alert immediately.
    pub async fn notify_system(
        &self,
        stream_id: &str,
        priority: AlertPriority,
        message: impl Into<String>,
    ) -> Result<()> {
        self.dispatcher
            .dispatch(&AlertEvent::system(stream_id, priority, message))
            .await
    }

    /// Drop cooldown state for a stream, e.g. when monitoring stops.
    pub fn forget_stream(&self, stream_id: &str) {
        self.last_sent.retain(|(id, _), _| id != stream_id);
        self.last_digest.remove(stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DetectionPayload;

    fn video_detection(stream_id: &str) -> Detection {
        Detection::new(
            DetectionKind::Video,
            stream_id,
            "alice",
            DetectionPayload::Video {
                class: "weapon".to_string(),
                confidence: 0.9,
                bbox: [0.0, 0.0, 0.5, 0.5],
            },
        )
    }

    fn digest_summary() -> DigestSummary {
        DigestSummary {
            streamer_name: "alice".to_string(),
            video: 2,
            audio: 1,
            chat: 4,
            window_secs: 60,
        }
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeat_alerts() {
        let dispatcher = Arc::new(BroadcastDispatcher::new());
        let gate = NotificationGate::new(dispatcher.clone(), Duration::from_secs(300));
        let mut rx = dispatcher.subscribe();

        assert!(gate.notify(video_detection("s1")).await.unwrap());
        assert!(!gate.notify(video_detection("s1")).await.unwrap());

        // A different stream is unaffected.
        assert!(gate.notify(video_detection("s2")).await.unwrap());

        assert_eq!(rx.recv().await.unwrap().stream_id, "s1");
        assert_eq!(rx.recv().await.unwrap().stream_id, "s2");
    }

    #[tokio::test]
    async fn test_forget_stream_resets_cooldown() {
        let gate = NotificationGate::new(
            Arc::new(BroadcastDispatcher::new()),
            Duration::from_secs(300),
        );

        assert!(gate.notify(video_detection("s1")).await.unwrap());
        gate.forget_stream("s1");
        assert!(gate.notify(video_detection("s1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_digest_cooldown_is_per_stream() {
        let dispatcher = Arc::new(BroadcastDispatcher::new());
        let gate = NotificationGate::new(dispatcher.clone(), Duration::from_secs(300));

        assert!(gate.notify_digest("s1", digest_summary()).await.unwrap());
        assert!(!gate.notify_digest("s1", digest_summary()).await.unwrap());
        assert!(gate.notify_digest("s2", digest_summary()).await.unwrap());

        // The digest cooldown does not throttle detection alerts.
        assert!(gate.notify(video_detection("s1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_system_alerts_bypass_cooldown() {
        let dispatcher = Arc::new(BroadcastDispatcher::new());
        let gate = NotificationGate::new(dispatcher.clone(), Duration::from_secs(300));
        let mut rx = dispatcher.subscribe();

        gate.notify_system("s1", AlertPriority::High, "probe failed")
            .await
            .unwrap();
        gate.notify_system("s1", AlertPriority::High, "probe failed")
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert!(event.summary.contains("[system/high]"));
        assert!(matches!(
            event.body,
            AlertBody::System { priority: AlertPriority::High, .. }
        ));
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_summary_text() {
        let event = AlertEvent::from_detection(video_detection("s1"));
        assert!(event.summary.contains("weapon"));
        assert!(event.summary.contains("alice"));
        assert!(event.summary.contains("90%"));

        let event = AlertEvent::digest("s1", digest_summary());
        assert!(event.summary.contains("7 detections"));
        assert!(event.summary.contains("alice"));
    }
}
