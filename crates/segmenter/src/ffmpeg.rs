//! ffmpeg-backed container implementation.
//!
//! Spawns ffmpeg as a child process decoding one track of a live URL to a
//! raw pipe: packed BGR24 frames for video, interleaved s16le PCM for
//! audio. Stream parameters come from an ffprobe call made at open time.
//! Binary locations honor `FFMPEG_PATH` and `FFPROBE_PATH`.

use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use crate::container::{ContainerOpener, MediaContainer, MediaFrame, TrackInfo, TrackKind};
use crate::error::{Error, Result};

/// Audio frames are read in chunks of this many samples per channel.
const AUDIO_CHUNK_SAMPLES: usize = 1024;

/// Opens ffmpeg-decoded containers for one track kind.
///
/// Video and audio workers each open their own container, so an opener
/// decodes exactly one track; this keeps the pipe format trivial (no
/// demuxing on our side of the pipe).
pub struct FfmpegOpener {
    kind: TrackKind,
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegOpener {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("FFPROBE_PATH")
                .unwrap_or_else(|_| "ffprobe".to_string()),
        }
    }

    pub fn video() -> Self {
        Self::new(TrackKind::Video)
    }

    pub fn audio() -> Self {
        Self::new(TrackKind::Audio)
    }

    async fn probe(&self, url: &str, timeout: Duration) -> Result<ProbedTrack> {
        let output = tokio::time::timeout(
            timeout,
            Command::new(&self.ffprobe_path)
                .args([
                    "-v",
                    "error",
                    "-print_format",
                    "json",
                    "-show_streams",
                    url,
                ])
                .stdin(Stdio::null())
                .output(),
        )
        .await
        .map_err(|_| Error::open(url, "ffprobe timed out"))?
        .map_err(|e| Error::open(url, format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(Error::open(
                url,
                format!("ffprobe exited with {}", output.status),
            ));
        }

        let body: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::open(url, format!("unparseable ffprobe output: {e}")))?;
        parse_probed_track(&body, self.kind).ok_or(Error::MissingTrack {
            kind: match self.kind {
                TrackKind::Video => "video",
                TrackKind::Audio => "audio",
            },
        })
    }
}

#[async_trait::async_trait]
impl ContainerOpener for FfmpegOpener {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn MediaContainer>> {
        let probed = self.probe(url, timeout).await?;

        let mut command = Command::new(&self.ffmpeg_path);
        command.args(["-hide_banner", "-loglevel", "error", "-i", url]);
        match self.kind {
            TrackKind::Video => {
                command.args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "bgr24"]);
            }
            TrackKind::Audio => {
                command.args(["-vn", "-map", "0:a:0", "-f", "s16le", "-acodec", "pcm_s16le"]);
            }
        }
        command
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| Error::open(url, format!("failed to spawn ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::open(url, "ffmpeg stdout not captured"))?;

        debug!(url, kind = ?self.kind, "ffmpeg container opened");
        Ok(Box::new(FfmpegContainer {
            kind: self.kind,
            probed,
            child,
            stdout: BufReader::new(stdout),
            units_read: 0,
        }))
    }
}

/// Parameters of the decoded track, from ffprobe.
#[derive(Debug, Clone)]
struct ProbedTrack {
    width: u32,
    height: u32,
    fps: f64,
    sample_rate: u32,
    channels: u16,
}

fn parse_probed_track(body: &serde_json::Value, kind: TrackKind) -> Option<ProbedTrack> {
    let wanted = match kind {
        TrackKind::Video => "video",
        TrackKind::Audio => "audio",
    };
    let stream = body
        .get("streams")?
        .as_array()?
        .iter()
        .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some(wanted))?;

    match kind {
        TrackKind::Video => {
            let width = stream.get("width")?.as_u64()? as u32;
            let height = stream.get("height")?.as_u64()? as u32;
            let fps = stream
                .get("avg_frame_rate")
                .and_then(|v| v.as_str())
                .and_then(parse_rate)
                .or_else(|| {
                    stream
                        .get("r_frame_rate")
                        .and_then(|v| v.as_str())
                        .and_then(parse_rate)
                })
                .unwrap_or(30.0);
            Some(ProbedTrack {
                width,
                height,
                fps,
                sample_rate: 0,
                channels: 0,
            })
        }
        TrackKind::Audio => {
            // ffprobe reports sample_rate as a string.
            let sample_rate = stream
                .get("sample_rate")?
                .as_str()?
                .parse::<u32>()
                .ok()?;
            let channels = stream.get("channels")?.as_u64()? as u16;
            Some(ProbedTrack {
                width: 0,
                height: 0,
                fps: 0.0,
                sample_rate,
                channels: channels.max(1),
            })
        }
    }
}

/// Parse an ffprobe rational like "30000/1001".
fn parse_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if num > 0.0 && den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

struct FfmpegContainer {
    kind: TrackKind,
    probed: ProbedTrack,
    child: Child,
    stdout: BufReader<ChildStdout>,
    /// Video frames or audio sample frames consumed, for timestamps.
    units_read: u64,
}

impl FfmpegContainer {
    fn timestamp(&self) -> Duration {
        match self.kind {
            TrackKind::Video => Duration::from_secs_f64(self.units_read as f64 / self.probed.fps),
            TrackKind::Audio => Duration::from_secs_f64(
                self.units_read as f64 / self.probed.sample_rate as f64,
            ),
        }
    }
}

#[async_trait::async_trait]
impl MediaContainer for FfmpegContainer {
    async fn next_frame(&mut self) -> Result<Option<MediaFrame>> {
        match self.kind {
            TrackKind::Video => {
                let frame_bytes = self.probed.width as usize * self.probed.height as usize * 3;
                let mut buf = vec![0u8; frame_bytes];
                if let Err(e) = self.stdout.read_exact(&mut buf).await {
                    return match e.kind() {
                        std::io::ErrorKind::UnexpectedEof => Err(Error::Eof),
                        _ => Err(e.into()),
                    };
                }

                let timestamp = self.timestamp();
                self.units_read += 1;
                Ok(Some(MediaFrame::video(
                    timestamp,
                    self.probed.width,
                    self.probed.height,
                    Bytes::from(buf),
                )))
            }
            TrackKind::Audio => {
                let chunk_bytes = AUDIO_CHUNK_SAMPLES * self.probed.channels as usize * 2;
                let mut buf = vec![0u8; chunk_bytes];
                if let Err(e) = self.stdout.read_exact(&mut buf).await {
                    return match e.kind() {
                        // A trailing partial chunk is dropped with the EOF.
                        std::io::ErrorKind::UnexpectedEof => Err(Error::Eof),
                        _ => Err(e.into()),
                    };
                }

                let samples: Vec<i16> = buf
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();

                let timestamp = self.timestamp();
                self.units_read += AUDIO_CHUNK_SAMPLES as u64;
                Ok(Some(MediaFrame::audio(timestamp, samples)))
            }
        }
    }

    fn track(&self, kind: TrackKind) -> Option<TrackInfo> {
        if kind != self.kind {
            return None;
        }
        Some(match kind {
            TrackKind::Video => TrackInfo::video(),
            TrackKind::Audio => TrackInfo::audio(self.probed.sample_rate, self.probed.channels),
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!(error = %e, "failed to kill ffmpeg child");
        }
        let _ = self.child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        let ntsc = parse_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("garbage"), None);
    }

    #[test]
    fn test_parse_probed_video_track() {
        let body = json!({
            "streams": [
                { "codec_type": "audio", "sample_rate": "44100", "channels": 2 },
                { "codec_type": "video", "width": 1280, "height": 720, "avg_frame_rate": "25/1" },
            ]
        });
        let track = parse_probed_track(&body, TrackKind::Video).unwrap();
        assert_eq!(track.width, 1280);
        assert_eq!(track.height, 720);
        assert_eq!(track.fps, 25.0);
    }

    #[test]
    fn test_parse_probed_audio_track() {
        let body = json!({
            "streams": [
                { "codec_type": "video", "width": 1280, "height": 720, "avg_frame_rate": "25/1" },
                { "codec_type": "audio", "sample_rate": "44100", "channels": 2 },
            ]
        });
        let track = parse_probed_track(&body, TrackKind::Audio).unwrap();
        assert_eq!(track.sample_rate, 44100);
        assert_eq!(track.channels, 2);
    }

    #[test]
    fn test_parse_probed_missing_track() {
        let body = json!({
            "streams": [
                { "codec_type": "audio", "sample_rate": "44100", "channels": 2 },
            ]
        });
        assert!(parse_probed_track(&body, TrackKind::Video).is_none());
    }

    #[test]
    fn test_video_fps_falls_back_to_r_frame_rate() {
        let body = json!({
            "streams": [
                { "codec_type": "video", "width": 640, "height": 480,
                  "avg_frame_rate": "0/0", "r_frame_rate": "60/1" },
            ]
        });
        let track = parse_probed_track(&body, TrackKind::Video).unwrap();
        assert_eq!(track.fps, 60.0);
    }
}
