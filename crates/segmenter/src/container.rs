//! Media container abstraction.
//!
//! A [`MediaContainer`] yields decoded frames from a live source one at a
//! time. The trait is deliberately narrow: callers only need sequential
//! decoded frames tagged with their track, a timestamp, and raw payload.
//! Demuxer/decoder backends implement it; tests use scripted fakes.

use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Which track a decoded frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Static description of a track inside an opened container.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub kind: TrackKind,
    /// Audio sample rate in Hz; zero for video tracks.
    pub sample_rate: u32,
    /// Channel count; zero for video tracks.
    pub channels: u16,
}

impl TrackInfo {
    pub fn video() -> Self {
        Self {
            kind: TrackKind::Video,
            sample_rate: 0,
            channels: 0,
        }
    }

    pub fn audio(sample_rate: u32, channels: u16) -> Self {
        Self {
            kind: TrackKind::Audio,
            sample_rate,
            channels,
        }
    }
}

/// One decoded frame from a container.
///
/// For video, `payload` is a packed BGR24 image and `samples` is empty.
/// For audio, `samples` holds interleaved signed 16-bit PCM and `payload`
/// is empty.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    pub track: TrackKind,
    /// Presentation timestamp relative to stream start.
    pub timestamp: Duration,
    /// Video pixel data (BGR24), empty for audio frames.
    pub payload: Bytes,
    /// Frame width/height for video, zeros for audio.
    pub width: u32,
    pub height: u32,
    /// Interleaved i16 PCM samples, empty for video frames.
    pub samples: Vec<i16>,
}

impl MediaFrame {
    pub fn video(timestamp: Duration, width: u32, height: u32, payload: Bytes) -> Self {
        Self {
            track: TrackKind::Video,
            timestamp,
            payload,
            width,
            height,
            samples: Vec::new(),
        }
    }

    pub fn audio(timestamp: Duration, samples: Vec<i16>) -> Self {
        Self {
            track: TrackKind::Audio,
            timestamp,
            payload: Bytes::new(),
            width: 0,
            height: 0,
            samples,
        }
    }
}

/// A live, incrementally-decodable media container.
///
/// Implementations demux and decode on demand. `next_frame` returns
/// `Ok(None)` only when the cancellation/close path has been taken;
/// a naturally ended stream surfaces as [`crate::Error::Eof`], and a
/// corrupt packet as a skippable [`crate::Error::Decode`].
#[async_trait::async_trait]
pub trait MediaContainer: Send {
    /// Decode and return the next frame from any selected track.
    async fn next_frame(&mut self) -> Result<Option<MediaFrame>>;

    /// Track description, if the container carries a track of this kind.
    fn track(&self, kind: TrackKind) -> Option<TrackInfo>;

    /// Release the underlying connection and decoder state.
    async fn close(&mut self);
}

/// Opens containers from a media URL.
///
/// Separated from [`MediaContainer`] so worker loops can re-open after a
/// terminal error without knowing the backend.
#[async_trait::async_trait]
pub trait ContainerOpener: Send + Sync {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn MediaContainer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_info_constructors() {
        let v = TrackInfo::video();
        assert_eq!(v.kind, TrackKind::Video);
        assert_eq!(v.sample_rate, 0);

        let a = TrackInfo::audio(44100, 2);
        assert_eq!(a.kind, TrackKind::Audio);
        assert_eq!(a.sample_rate, 44100);
        assert_eq!(a.channels, 2);
    }

    #[test]
    fn test_media_frame_video() {
        let frame = MediaFrame::video(
            Duration::from_secs(3),
            640,
            480,
            Bytes::from_static(&[0u8; 16]),
        );
        assert_eq!(frame.track, TrackKind::Video);
        assert_eq!(frame.width, 640);
        assert!(frame.samples.is_empty());
    }

    #[test]
    fn test_media_frame_audio() {
        let frame = MediaFrame::audio(Duration::from_secs(1), vec![0i16; 480]);
        assert_eq!(frame.track, TrackKind::Audio);
        assert!(frame.payload.is_empty());
        assert_eq!(frame.samples.len(), 480);
    }
}
