//! Persistence seam for stream records.
//!
//! The orchestrator talks to storage through [`StreamStore`] so the backing
//! implementation can be swapped without touching monitoring logic.
//! [`MemoryStore`] backs tests and single-process deployments.

mod memory;

pub use memory::MemoryStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::domain::{Detection, StreamHandle, StreamStatus};

/// Which human agent reviews a stream's alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub agent_id: String,
}

/// A stream as persisted, pairing identity with mutable monitoring state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub handle: StreamHandle,
    pub status: StreamStatus,
    /// Set while a worker set is (or should be) attached to this stream.
    pub is_monitored: bool,
}

impl StreamRecord {
    pub fn new(handle: StreamHandle) -> Self {
        Self {
            handle,
            status: StreamStatus::Offline,
            is_monitored: false,
        }
    }
}

/// Storage operations needed by the orchestrator and its sweeps.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// All known streams.
    async fn list(&self) -> Result<Vec<StreamRecord>>;

    /// One stream by id; `Ok(None)` when unknown.
    async fn get(&self, id: &str) -> Result<Option<StreamRecord>>;

    /// Insert or replace a record.
    async fn upsert(&self, record: StreamRecord) -> Result<()>;

    /// Update the lifecycle status of a stream.
    async fn set_status(&self, id: &str, status: StreamStatus) -> Result<()>;

    /// Flip the monitored flag of a stream.
    async fn set_monitored(&self, id: &str, monitored: bool) -> Result<()>;

    /// Keywords flagged for chat and transcript matching.
    async fn flagged_keywords(&self) -> Result<Vec<String>>;

    /// Object classes flagged for video detection, with per-class
    /// confidence thresholds.
    async fn flagged_objects(&self) -> Result<HashMap<String, f32>>;

    /// The agent assignment for a stream, if one exists.
    async fn assignment(&self, stream_id: &str) -> Result<Option<Assignment>>;

    /// Persist an admitted detection.
    async fn record_detection(&self, detection: &Detection) -> Result<()>;

    /// Detections recorded at or after `since`, across all streams.
    async fn recent_detections(&self, since: DateTime<Utc>) -> Result<Vec<Detection>>;
}
