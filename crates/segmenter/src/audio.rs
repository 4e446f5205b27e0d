//! Fixed-duration audio accumulation.
//!
//! Decoded audio frames arrive as short bursts of interleaved i16 PCM.
//! [`AudioAccumulator`] normalizes them to f32 and collects non-overlapping
//! windows of a configured duration for transcription.

use std::time::Duration;

use crate::container::MediaFrame;

/// Signed 16-bit max, used to normalize PCM into [-1, 1].
const I16_SCALE: f32 = 32768.0;

/// A complete audio window ready for transcription.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Normalized mono samples in [-1, 1].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSegment {
    /// Duration derived from sample count and rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Peak absolute amplitude; zero for an empty segment.
    pub fn peak_amplitude(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }

    /// Whether the segment is effectively silent for the given threshold.
    ///
    /// Silent segments should never reach the transcription model.
    pub fn is_silent(&self, threshold: f32) -> bool {
        self.peak_amplitude() < threshold
    }
}

/// Accumulates decoded audio frames into fixed-duration windows.
///
/// Windows are non-overlapping: once a segment is yielded the buffer resets
/// and subsequent samples begin the next window. Multi-channel input is
/// downmixed to mono by averaging channels.
#[derive(Debug)]
pub struct AudioAccumulator {
    sample_rate: u32,
    channels: u16,
    target_samples: usize,
    buffer: Vec<f32>,
}

impl AudioAccumulator {
    pub fn new(sample_rate: u32, channels: u16, segment_duration: Duration) -> Self {
        let target_samples = (sample_rate as f64 * segment_duration.as_secs_f64()) as usize;
        Self {
            sample_rate,
            channels: channels.max(1),
            target_samples: target_samples.max(1),
            buffer: Vec::with_capacity(target_samples.max(1)),
        }
    }

    /// Buffered duration so far.
    pub fn buffered(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.buffer.len() as f64 / self.sample_rate as f64)
    }

    /// Feed one decoded frame; returns a segment once the window is full.
    pub fn push(&mut self, frame: &MediaFrame) -> Option<AudioSegment> {
        let ch = self.channels as usize;
        for chunk in frame.samples.chunks(ch) {
            let sum: f32 = chunk.iter().map(|&s| s as f32 / I16_SCALE).sum();
            self.buffer.push(sum / chunk.len() as f32);
        }

        if self.buffer.len() < self.target_samples {
            return None;
        }

        // Exactly one window leaves the buffer; any overflow seeds the next.
        let remainder = self.buffer.split_off(self.target_samples);
        let samples = std::mem::replace(&mut self.buffer, remainder);
        Some(AudioSegment {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    /// Discard buffered samples, e.g. after the container is re-opened.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
