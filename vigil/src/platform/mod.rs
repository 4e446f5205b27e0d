//! Platform integrations.
//!
//! Two seams hide platform specifics from the rest of the service:
//! [`StreamResolver`] turns a stream handle into a playable media URL and
//! liveness flag, and [`ChatSource`] fetches recent chat messages.
//! [`HttpPlatformClient`] implements both against the public endpoints of
//! the supported platforms.

mod chaturbate;
mod stripchat;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::Result;
use crate::domain::{ChatMessage, Platform, StreamHandle};
use crate::error::Error;

/// Browser-like user agent; the platform APIs reject default clients.
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:135.0) Gecko/20100101 Firefox/135.0";

/// Outcome of resolving a stream against its platform.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub media_url: Option<String>,
    pub online: bool,
}

/// Resolves a stream handle into a fresh playable media URL.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, handle: &StreamHandle) -> Result<ResolvedMedia>;
}

/// Fetches the recent chat history of a stream's room.
#[async_trait]
pub trait ChatSource: Send + Sync {
    async fn fetch_messages(&self, handle: &StreamHandle) -> Result<Vec<ChatMessage>>;
}

/// HTTP client for both supported platforms.
///
/// Chaturbate chat fetches need the room's broadcaster UID, which the
/// resolve call returns; UIDs are cached per streamer so chat polling does
/// not re-resolve every cycle.
pub struct HttpPlatformClient {
    http: reqwest::Client,
    broadcaster_uids: DashMap<String, String>,
}

impl HttpPlatformClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            broadcaster_uids: DashMap::new(),
        })
    }

    fn cached_uid(&self, streamer: &str) -> Option<String> {
        self.broadcaster_uids.get(streamer).map(|e| e.clone())
    }
}

#[async_trait]
impl StreamResolver for HttpPlatformClient {
    async fn resolve(&self, handle: &StreamHandle) -> Result<ResolvedMedia> {
        let resolved = match handle.platform {
            Platform::Chaturbate => {
                let context =
                    chaturbate::fetch_room_context(&self.http, &handle.streamer_name).await?;
                if let Some(uid) = &context.broadcaster_uid {
                    self.broadcaster_uids
                        .insert(handle.streamer_name.clone(), uid.clone());
                }
                ResolvedMedia {
                    media_url: context.hls_source,
                    online: context.online,
                }
            }
            Platform::Stripchat => {
                stripchat::resolve_model(&self.http, &handle.streamer_name).await?
            }
        };

        debug!(
            streamer = %handle.streamer_name,
            platform = %handle.platform,
            online = resolved.online,
            "resolved stream"
        );
        Ok(resolved)
    }
}

#[async_trait]
impl ChatSource for HttpPlatformClient {
    async fn fetch_messages(&self, handle: &StreamHandle) -> Result<Vec<ChatMessage>> {
        match handle.platform {
            Platform::Chaturbate => {
                let uid = match self.cached_uid(&handle.streamer_name) {
                    Some(uid) => uid,
                    None => {
                        let context =
                            chaturbate::fetch_room_context(&self.http, &handle.streamer_name)
                                .await?;
                        let uid = context.broadcaster_uid.ok_or_else(|| {
                            Error::resolution(
                                &handle.streamer_name,
                                "room context has no broadcaster UID",
                            )
                        })?;
                        self.broadcaster_uids
                            .insert(handle.streamer_name.clone(), uid.clone());
                        uid
                    }
                };
                chaturbate::fetch_chat(&self.http, &handle.streamer_name, &uid).await
            }
            Platform::Stripchat => {
                stripchat::fetch_chat(&self.http, &handle.streamer_name).await
            }
        }
    }
}
