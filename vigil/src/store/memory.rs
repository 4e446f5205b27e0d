//! In-memory stream store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::{Detection, StreamStatus};
use crate::error::Error;
use crate::Result;

use super::{Assignment, StreamRecord, StreamStore};

/// Oldest detections are dropped past this count.
const DETECTION_LOG_CAP: usize = 10_000;

/// Concurrent map-backed store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, StreamRecord>,
    keywords: RwLock<Vec<String>>,
    objects: RwLock<HashMap<String, f32>>,
    assignments: DashMap<String, Assignment>,
    detections: RwLock<Vec<Detection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_flagged_keywords(&self, keywords: Vec<String>) {
        *self.keywords.write() = keywords;
    }

    pub fn set_flagged_objects(&self, objects: HashMap<String, f32>) {
        *self.objects.write() = objects;
    }

    pub fn set_assignment(&self, stream_id: impl Into<String>, assignment: Assignment) {
        self.assignments.insert(stream_id.into(), assignment);
    }
}

#[async_trait]
impl StreamStore for MemoryStore {
    async fn list(&self) -> Result<Vec<StreamRecord>> {
        Ok(self.records.iter().map(|e| e.value().clone()).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<StreamRecord>> {
        Ok(self.records.get(id).map(|e| e.value().clone()))
    }

    async fn upsert(&self, record: StreamRecord) -> Result<()> {
        self.records.insert(record.handle.id.clone(), record);
        Ok(())
    }

    async fn set_status(&self, id: &str, status: StreamStatus) -> Result<()> {
        match self.records.get_mut(id) {
            Some(mut record) => {
                record.status = status;
                Ok(())
            }
            None => Err(Error::not_found("stream", id)),
        }
    }

    async fn set_monitored(&self, id: &str, monitored: bool) -> Result<()> {
        match self.records.get_mut(id) {
            Some(mut record) => {
                record.is_monitored = monitored;
                Ok(())
            }
            None => Err(Error::not_found("stream", id)),
        }
    }

    async fn flagged_keywords(&self) -> Result<Vec<String>> {
        Ok(self.keywords.read().clone())
    }

    async fn flagged_objects(&self) -> Result<HashMap<String, f32>> {
        Ok(self.objects.read().clone())
    }

    async fn assignment(&self, stream_id: &str) -> Result<Option<Assignment>> {
        Ok(self.assignments.get(stream_id).map(|e| e.value().clone()))
    }

    async fn record_detection(&self, detection: &Detection) -> Result<()> {
        let mut log = self.detections.write();
        log.push(detection.clone());
        if log.len() > DETECTION_LOG_CAP {
            let excess = log.len() - DETECTION_LOG_CAP;
            log.drain(..excess);
        }
        Ok(())
    }

    async fn recent_detections(&self, since: DateTime<Utc>) -> Result<Vec<Detection>> {
        Ok(self
            .detections
            .read()
            .iter()
            .filter(|d| d.timestamp >= since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Platform, StreamHandle};

    fn handle(id: &str) -> StreamHandle {
        StreamHandle {
            id: id.to_string(),
            platform: Platform::Chaturbate,
            streamer_name: format!("streamer-{id}"),
            media_url: Some("https://cdn.example.com/live.m3u8".to_string()),
            chat_url: Some("https://chat.example.com/room".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = MemoryStore::new();
        store.upsert(StreamRecord::new(handle("a"))).await.unwrap();

        let record = store.get("a").await.unwrap().unwrap();
        assert_eq!(record.status, StreamStatus::Offline);
        assert!(!record.is_monitored);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_and_monitored_updates() {
        let store = MemoryStore::new();
        store.upsert(StreamRecord::new(handle("a"))).await.unwrap();

        store.set_status("a", StreamStatus::Monitoring).await.unwrap();
        store.set_monitored("a", true).await.unwrap();

        let record = store.get("a").await.unwrap().unwrap();
        assert_eq!(record.status, StreamStatus::Monitoring);
        assert!(record.is_monitored);

        assert!(store.set_status("missing", StreamStatus::Online).await.is_err());
    }

    #[tokio::test]
    async fn test_flagged_lists_and_assignments() {
        let store = MemoryStore::new();
        assert!(store.flagged_keywords().await.unwrap().is_empty());

        store.set_flagged_keywords(vec!["knife".to_string()]);
        store.set_flagged_objects(HashMap::from([("weapon".to_string(), 0.6)]));
        store.set_assignment(
            "a",
            Assignment {
                id: "as1".to_string(),
                agent_id: "agent7".to_string(),
            },
        );

        assert_eq!(store.flagged_keywords().await.unwrap(), vec!["knife".to_string()]);
        assert_eq!(
            store.flagged_objects().await.unwrap().get("weapon"),
            Some(&0.6)
        );
        assert_eq!(
            store.assignment("a").await.unwrap().unwrap().agent_id,
            "agent7"
        );
        assert!(store.assignment("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_detection_log_filters_by_time() {
        use crate::domain::{Detection, DetectionKind, DetectionPayload};

        let store = MemoryStore::new();
        let before = Utc::now();
        let det = Detection::new(
            DetectionKind::Video,
            "a",
            "streamer-a",
            DetectionPayload::Video {
                class: "weapon".to_string(),
                confidence: 0.9,
                bbox: [0.0, 0.0, 0.5, 0.5],
            },
        );
        store.record_detection(&det).await.unwrap();

        assert_eq!(store.recent_detections(before).await.unwrap().len(), 1);
        let future = Utc::now() + chrono::Duration::seconds(60);
        assert!(store.recent_detections(future).await.unwrap().is_empty());
    }
}
