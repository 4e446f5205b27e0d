//! Transcript archival.
//!
//! Every transcription result is written to disk for audit, whether or not
//! it matched any keyword. Archival failures are the caller's to log, not
//! to propagate into the monitoring loop.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::Result;

/// On-disk transcript record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub stream_url: String,
    pub timestamp: DateTime<Utc>,
    pub transcription: String,
    pub detected_keywords: Vec<String>,
}

/// Writes transcript records as one JSON file per audio segment.
#[derive(Debug, Clone)]
pub struct TranscriptArchive {
    dir: PathBuf,
}

impl TranscriptArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist one record; returns the path written.
    ///
    /// Files are named `transcription_{urlhash8}_{YYYYMMDD_HHMMSS}.json` so
    /// records for one stream sort together and chronologically.
    pub async fn write(&self, record: &TranscriptRecord) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(format!(
            "transcription_{}_{}.json",
            url_hash8(&record.stream_url),
            record.timestamp.format("%Y%m%d_%H%M%S"),
        ));

        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// First 8 hex chars of the MD5 of the URL.
fn url_hash8(url: &str) -> String {
    let digest = Md5::digest(url.as_bytes());
    hex::encode(digest)[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_hash_is_stable_and_short() {
        let a = url_hash8("https://cdn.example.com/live.m3u8");
        let b = url_hash8("https://cdn.example.com/live.m3u8");
        let c = url_hash8("https://cdn.example.com/other.m3u8");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn test_write_creates_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = TranscriptArchive::new(dir.path());

        let record = TranscriptRecord {
            stream_url: "https://cdn.example.com/live.m3u8".to_string(),
            timestamp: "2026-08-23T10:30:00Z".parse().unwrap(),
            transcription: "hello world".to_string(),
            detected_keywords: vec!["hello".to_string()],
        };

        let path = archive.write(&record).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("transcription_"));
        assert!(name.ends_with("_20260823_103000.json"));

        let body = tokio::fs::read(&path).await.unwrap();
        let back: TranscriptRecord = serde_json::from_slice(&body).unwrap();
        assert_eq!(back.transcription, "hello world");
        assert_eq!(back.detected_keywords, vec!["hello".to_string()]);
    }
}
