//! Chaturbate room context and chat endpoints.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::Result;
use crate::domain::ChatMessage;
use crate::error::Error;

/// What the chat/video context endpoint tells us about a room.
#[derive(Debug, Clone)]
pub(super) struct RoomContext {
    pub hls_source: Option<String>,
    pub broadcaster_uid: Option<String>,
    pub online: bool,
}

/// Fetch the room context for a streamer.
///
/// The endpoint returns the HLS playlist URL, the broadcaster UID needed
/// for chat history requests, and the room status.
pub(super) async fn fetch_room_context(
    http: &reqwest::Client,
    streamer: &str,
) -> Result<RoomContext> {
    let url = format!("https://chaturbate.com/api/chatvideocontext/{streamer}/");
    let response = http
        .get(&url)
        .header("Referer", format!("https://chaturbate.com/{streamer}/"))
        .send()
        .await
        .map_err(|e| Error::resolution(streamer, format!("room context request failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::resolution(streamer, format!("room context returned {e}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::resolution(streamer, format!("room context is not JSON: {e}")))?;

    Ok(parse_room_context(&body))
}

fn parse_room_context(body: &Value) -> RoomContext {
    let hls_source = body
        .get("hls_source")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let broadcaster_uid = body
        .get("broadcaster_uid")
        .and_then(Value::as_str)
        .map(str::to_string);
    let online = body
        .get("room_status")
        .and_then(Value::as_str)
        .map(|s| s == "public")
        .unwrap_or(false);

    RoomContext {
        hls_source,
        broadcaster_uid,
        online,
    }
}

/// Fetch recent chat messages for a room via the push-service history
/// endpoint, which expects a multipart form naming the room's topic.
pub(super) async fn fetch_chat(
    http: &reqwest::Client,
    streamer: &str,
    broadcaster_uid: &str,
) -> Result<Vec<ChatMessage>> {
    let topic = format!("RoomMessageTopic#RoomMessageTopic:{broadcaster_uid}");
    let topics = format!("{{\"{topic}\":{{\"broadcaster_uid\":\"{broadcaster_uid}\"}}}}");

    let form = reqwest::multipart::Form::new().text("topics", topics);

    let response = http
        .post("https://chaturbate.com/push_service/room_history/")
        .header("Referer", format!("https://chaturbate.com/{streamer}/"))
        .header("X-Requested-With", "XMLHttpRequest")
        .multipart(form)
        .send()
        .await
        .map_err(|e| Error::resolution(streamer, format!("chat history request failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::resolution(streamer, format!("chat history returned {e}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::resolution(streamer, format!("chat history is not JSON: {e}")))?;

    let messages = parse_chat_history(&body, broadcaster_uid);
    debug!(streamer, count = messages.len(), "fetched chaturbate chat messages");
    Ok(messages)
}

/// The history response maps opaque keys to per-topic payloads; only
/// entries carrying this room's message topic are chat lines.
fn parse_chat_history(body: &Value, broadcaster_uid: &str) -> Vec<ChatMessage> {
    let topic = format!("RoomMessageTopic#RoomMessageTopic:{broadcaster_uid}");
    let Some(entries) = body.as_object() else {
        return Vec::new();
    };

    entries
        .values()
        .filter_map(|entry| entry.get(&topic))
        .filter_map(|msg| {
            let message = msg.get("message")?.as_str()?.to_string();
            let username = msg
                .get("from_user")
                .and_then(|u| u.get("username"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            Some(ChatMessage {
                username,
                message,
                timestamp: Utc::now(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_room_context() {
        let body = json!({
            "hls_source": "https://cdn.example.com/live.m3u8",
            "broadcaster_uid": "abc123",
            "room_status": "public",
        });
        let ctx = parse_room_context(&body);
        assert_eq!(ctx.hls_source.as_deref(), Some("https://cdn.example.com/live.m3u8"));
        assert_eq!(ctx.broadcaster_uid.as_deref(), Some("abc123"));
        assert!(ctx.online);
    }

    #[test]
    fn test_parse_room_context_offline() {
        let body = json!({ "hls_source": "", "room_status": "offline" });
        let ctx = parse_room_context(&body);
        assert!(ctx.hls_source.is_none());
        assert!(!ctx.online);
    }

    #[test]
    fn test_parse_chat_history_filters_by_topic() {
        let body = json!({
            "k1": {
                "RoomMessageTopic#RoomMessageTopic:uid1": {
                    "message": "hello",
                    "from_user": { "username": "bob" },
                }
            },
            "k2": {
                "RoomMessageTopic#RoomMessageTopic:other": {
                    "message": "ignored",
                    "from_user": { "username": "eve" },
                }
            },
        });
        let messages = parse_chat_history(&body, "uid1");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].username, "bob");
        assert_eq!(messages[0].message, "hello");
    }
}
