//! Fixed-interval video frame throttling.
//!
//! Live streams decode at native frame rate, but object detection is far too
//! expensive to run per frame. [`FrameThrottle`] gates decoded frames so the
//! caller sees roughly one frame per configured interval.

use std::time::Duration;

use bytes::Bytes;

use crate::container::MediaFrame;

/// A decoded video frame selected for analysis.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Presentation timestamp relative to stream start.
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    /// Packed BGR24 pixel data.
    pub pixels: Bytes,
}

/// Emits at most one frame per interval based on presentation timestamps.
///
/// The first frame observed is always emitted; after that a frame passes
/// only when `frame.timestamp - last_emitted >= interval`. Frames that do
/// not pass are dropped without decoding cost to the caller.
#[derive(Debug)]
pub struct FrameThrottle {
    interval: Duration,
    last_emitted: Option<Duration>,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: None,
        }
    }

    /// Offer a decoded frame; returns it as a [`VideoFrame`] if the interval
    /// has elapsed since the last emitted frame.
    pub fn offer(&mut self, frame: &MediaFrame) -> Option<VideoFrame> {
        let due = match self.last_emitted {
            None => true,
            Some(last) => frame.timestamp.saturating_sub(last) >= self.interval,
        };
        if !due {
            return None;
        }
        self.last_emitted = Some(frame.timestamp);
        Some(VideoFrame {
            timestamp: frame.timestamp,
            width: frame.width,
            height: frame.height,
            pixels: frame.payload.clone(),
        })
    }

    /// Forget the last emission, e.g. after the container is re-opened and
    /// timestamps restart from zero.
    pub fn reset(&mut self) {
        self.last_emitted = None;
    }
}
