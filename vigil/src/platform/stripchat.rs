//! Stripchat model and chat endpoints.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::Result;
use crate::domain::ChatMessage;
use crate::error::Error;

use super::ResolvedMedia;

/// Resolve a model's liveness and HLS playlist from the front API.
pub(super) async fn resolve_model(
    http: &reqwest::Client,
    streamer: &str,
) -> Result<ResolvedMedia> {
    let url = format!("https://stripchat.com/api/front/v2/models/username/{streamer}");
    let response = http
        .get(&url)
        .header("Referer", format!("https://stripchat.com/{streamer}"))
        .send()
        .await
        .map_err(|e| Error::resolution(streamer, format!("model request failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::resolution(streamer, format!("model endpoint returned {e}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::resolution(streamer, format!("model response is not JSON: {e}")))?;

    Ok(parse_model(&body))
}

fn parse_model(body: &Value) -> ResolvedMedia {
    let model = body.get("model").unwrap_or(body);
    let online = model
        .get("isLive")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let media_url = model
        .get("id")
        .and_then(Value::as_u64)
        .filter(|_| online)
        .map(|id| format!("https://edge-hls.doppiocdn.com/hls/{id}/master/{id}.m3u8"));

    ResolvedMedia { media_url, online }
}

/// Fetch the recent chat history of a model's room.
pub(super) async fn fetch_chat(
    http: &reqwest::Client,
    streamer: &str,
) -> Result<Vec<ChatMessage>> {
    let url = format!("https://stripchat.com/api/front/v2/models/username/{streamer}/chat");
    let response = http
        .get(&url)
        .header("Referer", format!("https://stripchat.com/{streamer}"))
        .send()
        .await
        .map_err(|e| Error::resolution(streamer, format!("chat request failed: {e}")))?
        .error_for_status()
        .map_err(|e| Error::resolution(streamer, format!("chat endpoint returned {e}")))?;

    let body: Value = response
        .json()
        .await
        .map_err(|e| Error::resolution(streamer, format!("chat response is not JSON: {e}")))?;

    let messages = parse_chat(&body);
    debug!(streamer, count = messages.len(), "fetched stripchat chat messages");
    Ok(messages)
}

/// Text messages and tips with a body count as chat; system events do not.
fn parse_chat(body: &Value) -> Vec<ChatMessage> {
    let Some(entries) = body.get("messages").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|msg| {
            let kind = msg.get("type").and_then(Value::as_str).unwrap_or("");
            let text = msg
                .get("details")
                .and_then(|d| d.get("body"))
                .and_then(Value::as_str)
                .unwrap_or("");
            if !(kind == "text" || (kind == "tip" && !text.is_empty())) {
                return None;
            }

            let username = msg
                .get("userData")
                .and_then(|u| u.get("username"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let timestamp = msg
                .get("createdAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            Some(ChatMessage {
                username,
                message: text.to_string(),
                timestamp,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_model_live() {
        let body = json!({ "model": { "id": 42, "isLive": true } });
        let resolved = parse_model(&body);
        assert!(resolved.online);
        assert_eq!(
            resolved.media_url.as_deref(),
            Some("https://edge-hls.doppiocdn.com/hls/42/master/42.m3u8")
        );
    }

    #[test]
    fn test_parse_model_offline_has_no_url() {
        let body = json!({ "model": { "id": 42, "isLive": false } });
        let resolved = parse_model(&body);
        assert!(!resolved.online);
        assert!(resolved.media_url.is_none());
    }

    #[test]
    fn test_parse_chat_keeps_text_and_bodied_tips() {
        let body = json!({
            "messages": [
                {
                    "type": "text",
                    "details": { "body": "hi there" },
                    "userData": { "username": "bob" },
                    "createdAt": "2026-08-23T10:00:00Z",
                },
                {
                    "type": "tip",
                    "details": { "body": "great show" },
                    "userData": { "username": "carol" },
                },
                {
                    "type": "tip",
                    "details": { "body": "" },
                    "userData": { "username": "dan" },
                },
                { "type": "system", "details": {} },
            ]
        });
        let messages = parse_chat(&body);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].username, "bob");
        assert_eq!(messages[1].message, "great show");
    }
}
