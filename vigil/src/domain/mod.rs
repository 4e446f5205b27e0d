//! Core domain types shared across the monitoring pipeline.

mod detection;
mod stream;

pub use detection::{ChatAlert, Detection, DetectionKind, DetectionPayload};
pub use stream::{ChatMessage, Platform, StreamHandle, StreamStatus};
