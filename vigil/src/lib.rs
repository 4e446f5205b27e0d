//! Multi-modal live-stream content monitor.
//!
//! Watches Chaturbate/Stripchat streams across three modalities — video
//! object detection, audio transcription with keyword matching, and chat
//! keyword/sentiment scanning — and routes deduplicated alerts to a
//! notification dispatcher. One [`worker::WorkerSet`] of three concurrent
//! tasks monitors each stream, under a capacity-bounded pool managed by
//! the [`orchestrator::MonitorService`].

pub mod adapters;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod logging;
pub mod models;
pub mod notification;
pub mod orchestrator;
pub mod platform;
pub mod store;
pub mod transcripts;
pub mod worker;

pub use error::{Error, Result};
