//! Runtime configuration for the monitoring service.
//!
//! Settings are read once at startup from environment variables with
//! sensible defaults, and passed down by reference. Nothing here is
//! hot-reloadable; a restart picks up changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level settings for the monitoring service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Maximum number of streams monitored concurrently.
    pub pool_size: usize,

    /// Seconds of audio accumulated per transcription window.
    pub audio_segment_secs: u64,
    /// Audio below this peak amplitude is dropped without transcription.
    pub silence_threshold: f32,
    /// Hard cap on a single transcription call.
    pub transcription_timeout: Duration,
    /// Sample rate models expect; decoded audio is resampled to this.
    pub model_sample_rate: u32,
    /// Object detection inference endpoint.
    pub detector_url: Option<String>,
    /// Speech-to-text inference endpoint.
    pub transcriber_url: Option<String>,

    /// Minimum interval between video frames submitted to detection.
    pub frame_interval: Duration,
    /// Per-class cooldown between repeated video alerts.
    pub video_class_cooldown: Duration,

    /// Chat poll interval.
    pub chat_poll_interval: Duration,
    /// Words that trigger keyword alerts in chat and transcripts.
    pub flagged_keywords: Vec<String>,
    /// Sentiment scores at or below this trigger a sentiment alert.
    pub sentiment_threshold: f64,

    /// Interval of the discovery sweep that finds streams to auto-start.
    pub discovery_sweep_interval: Duration,
    /// Interval of the retry sweep that revives streams that should be
    /// monitored but are not.
    pub retry_sweep_interval: Duration,
    /// Interval of the digest sweep that aggregates recent detections.
    pub digest_sweep_interval: Duration,
    /// Whether newly-online streams are picked up automatically.
    pub auto_start_on_online: bool,

    /// Minimum interval between notifications for the same stream and kind.
    pub notification_cooldown: Duration,

    /// Grace period for worker tasks to exit after cancellation.
    pub shutdown_grace: Duration,

    /// Directory where transcription results are written.
    pub transcript_dir: String,
    /// Directory for rolling log files.
    pub log_dir: String,
    /// Days of log files kept by the retention cleanup.
    pub log_retention_days: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            audio_segment_secs: 30,
            silence_threshold: 1e-5,
            transcription_timeout: Duration::from_secs(900),
            model_sample_rate: 16_000,
            detector_url: None,
            transcriber_url: None,
            frame_interval: Duration::from_secs(30),
            video_class_cooldown: Duration::from_secs(60),
            chat_poll_interval: Duration::from_secs(30),
            flagged_keywords: Vec::new(),
            sentiment_threshold: -0.5,
            discovery_sweep_interval: Duration::from_secs(900),
            retry_sweep_interval: Duration::from_secs(3600),
            digest_sweep_interval: Duration::from_secs(60),
            auto_start_on_online: true,
            notification_cooldown: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(2),
            transcript_dir: "transcripts".to_string(),
            log_dir: "logs".to_string(),
            log_retention_days: 7,
        }
    }
}

impl MonitorSettings {
    /// Build settings from `VIGIL_*` environment variables, falling back to
    /// defaults for anything unset. Malformed values are an error rather
    /// than a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Some(v) = env_parse::<usize>("VIGIL_POOL_SIZE")? {
            if v == 0 {
                return Err(Error::config("VIGIL_POOL_SIZE must be at least 1"));
            }
            settings.pool_size = v;
        }
        if let Some(v) = env_parse::<u64>("VIGIL_AUDIO_SEGMENT_SECS")? {
            settings.audio_segment_secs = v;
        }
        if let Some(v) = env_parse::<f32>("VIGIL_SILENCE_THRESHOLD")? {
            settings.silence_threshold = v;
        }
        if let Some(v) = env_parse::<u64>("VIGIL_TRANSCRIPTION_TIMEOUT_SECS")? {
            settings.transcription_timeout = Duration::from_secs(v);
        }
        if let Ok(url) = std::env::var("VIGIL_DETECTOR_URL") {
            settings.detector_url = Some(url);
        }
        if let Ok(url) = std::env::var("VIGIL_TRANSCRIBER_URL") {
            settings.transcriber_url = Some(url);
        }
        if let Some(v) = env_parse::<u64>("VIGIL_FRAME_INTERVAL_SECS")? {
            settings.frame_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("VIGIL_VIDEO_CLASS_COOLDOWN_SECS")? {
            settings.video_class_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("VIGIL_CHAT_POLL_SECS")? {
            settings.chat_poll_interval = Duration::from_secs(v);
        }
        if let Ok(list) = std::env::var("VIGIL_FLAGGED_KEYWORDS") {
            settings.flagged_keywords = list
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = env_parse::<f64>("VIGIL_SENTIMENT_THRESHOLD")? {
            settings.sentiment_threshold = v;
        }
        if let Some(v) = env_parse::<u64>("VIGIL_DISCOVERY_SWEEP_SECS")? {
            settings.discovery_sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("VIGIL_RETRY_SWEEP_SECS")? {
            settings.retry_sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u64>("VIGIL_DIGEST_SWEEP_SECS")? {
            settings.digest_sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<bool>("VIGIL_AUTO_START")? {
            settings.auto_start_on_online = v;
        }
        if let Some(v) = env_parse::<u64>("VIGIL_NOTIFICATION_COOLDOWN_SECS")? {
            settings.notification_cooldown = Duration::from_secs(v);
        }
        if let Ok(dir) = std::env::var("VIGIL_TRANSCRIPT_DIR") {
            settings.transcript_dir = dir;
        }
        if let Ok(dir) = std::env::var("VIGIL_LOG_DIR") {
            settings.log_dir = dir;
        }
        if let Some(v) = env_parse::<u64>("VIGIL_LOG_RETENTION_DAYS")? {
            settings.log_retention_days = v;
        }

        Ok(settings)
    }
}

/// Pool size scaled to the host: at least 10 slots, otherwise the smaller
/// of 4 per CPU and 2 per GiB of memory.
fn default_pool_size() -> usize {
    let mut sys = sysinfo::System::new();
    sys.refresh_cpu_list(sysinfo::CpuRefreshKind::nothing());
    sys.refresh_memory();

    let cpus = sys.cpus().len().max(1);
    // Size against memory actually free for workers; some platforms report
    // zero available, in which case total is the best signal we have.
    let mem = match sys.available_memory() {
        0 => sys.total_memory(),
        available => available,
    };
    let mem_gb = (mem / (1024 * 1024 * 1024)).max(1) as usize;

    10.max((cpus * 4).min(mem_gb * 2))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config(format!("invalid value for {key}: {raw:?}"))),
        Err(_) => Ok(None),
    }
}
