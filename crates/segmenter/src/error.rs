//! Segmentation error types.

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while probing, demuxing, or decoding a live container.
///
/// The taxonomy matters to callers: [`Error::Decode`] is recoverable on a
/// per-packet basis (log and keep demuxing), while [`Error::Eof`],
/// [`Error::StreamUnavailable`], and open failures are terminal for the
/// owning task's current container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("stream unavailable after {attempts} probe attempts: {url}")]
    StreamUnavailable { url: String, attempts: u32 },

    #[error("failed to open container for {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("packet decode error: {reason}")]
    Decode { reason: String },

    #[error("container reached end of stream")]
    Eof,

    #[error("no {kind} track in container")]
    MissingTrack { kind: &'static str },

    #[error("HTTP request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    pub fn open(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Open {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Whether the error is recoverable by skipping the current packet.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Whether the error ends the current container (reopen or give up).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Eof | Self::Open { .. } | Self::StreamUnavailable { .. } | Self::MissingTrack { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_is_skippable_not_terminal() {
        let err = Error::decode("corrupt NAL unit");
        assert!(err.is_skippable());
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_eof_is_terminal() {
        assert!(Error::Eof.is_terminal());
        assert!(!Error::Eof.is_skippable());
    }

    #[test]
    fn test_open_is_terminal() {
        let err = Error::open("https://example.com/live.m3u8", "connection refused");
        assert!(err.is_terminal());
    }
}
