//! Live media segmentation primitives.
//!
//! This crate turns a live media container into two lazy sequences suitable
//! for expensive downstream analysis:
//!
//! - decoded video frames sampled at a fixed interval ([`FrameThrottle`])
//! - fixed-duration, non-overlapping audio windows ([`AudioAccumulator`])
//!
//! The container itself is an abstraction ([`MediaContainer`]) so callers can
//! plug in any demuxer/decoder backend. Availability probing with bounded
//! retries lives in [`probe`].

pub mod audio;
pub mod container;
pub mod error;
pub mod ffmpeg;
pub mod probe;
pub mod video;

pub use audio::{AudioAccumulator, AudioSegment};
pub use container::{ContainerOpener, MediaContainer, MediaFrame, TrackInfo, TrackKind};
pub use error::{Error, Result};
pub use ffmpeg::FfmpegOpener;
pub use probe::{HttpStreamProbe, ProbeConfig, StreamProbe};
pub use video::{FrameThrottle, VideoFrame};
