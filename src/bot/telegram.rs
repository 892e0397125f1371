//! Telegram webhook: one update in, the dialogue replies out.
//!
//! Telegram retries any non-2xx answer, so every path ends in `200 OK`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::handlers::handle_dialogue_turn;
use super::AppState;

/// The part of a Telegram update this bot reads.
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

impl TelegramUpdate {
    /// Chat id and text of a plain text message; commands and non-text updates are skipped.
    fn text_message(&self) -> Option<(i64, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?.trim();
        if text.is_empty() || text.starts_with('/') {
            return None;
        }
        Some((message.chat.id, text))
    }
}

pub async fn handle_update(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed telegram update");
            return StatusCode::OK;
        }
    };

    let Some((chat_id, text)) = update.text_message() else {
        tracing::debug!(update_id = ?update.update_id, "skipping update without text");
        return StatusCode::OK;
    };

    tracing::info!(chat_id, "incoming telegram message");

    let session_id = chat_id.to_string();
    let outcome = handle_dialogue_turn(&state, &session_id, text).await;

    for reply in &outcome.replies {
        if let Err(e) = state.messenger.send(chat_id, reply).await {
            tracing::error!(chat_id, error = %e, "failed to deliver reply");
        }
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{build_router, replies};
    use crate::testing::{test_state_with_messenger, MemoryStore, RecordingMessenger, ScriptedCompletion};
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    struct Harness {
        store: Arc<MemoryStore>,
        messenger: Arc<RecordingMessenger>,
        router: axum::Router,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::default());
        let messenger = Arc::new(RecordingMessenger::default());
        let state = test_state_with_messenger(
            store.clone(),
            Arc::new(ScriptedCompletion::replying("-")),
            messenger.clone(),
        );
        Harness {
            store,
            messenger,
            router: build_router(Arc::new(state)),
        }
    }

    async fn post(router: axum::Router, body: &str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri("/api/telegram")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn text_message_gets_onboarding_reply() {
        let h = harness();
        let body = r#"{"update_id":1,"message":{"chat":{"id":777},"text":"Привет"}}"#;

        assert_eq!(post(h.router, body).await, StatusCode::OK);
        assert_eq!(
            h.messenger.sent(),
            vec![(777, replies::ONBOARDING.to_string())]
        );
        assert_eq!(h.store.contents("777")[0], "Привет");
    }

    #[tokio::test]
    async fn commands_and_empty_updates_are_acknowledged_silently() {
        for body in [
            r#"{"update_id":2,"message":{"chat":{"id":777},"text":"/start"}}"#,
            r#"{"update_id":3,"message":{"chat":{"id":777},"text":"   "}}"#,
            r#"{"update_id":4,"message":{"chat":{"id":777}}}"#,
            r#"{"update_id":5}"#,
        ] {
            let h = harness();
            assert_eq!(post(h.router, body).await, StatusCode::OK, "{body}");
            assert!(h.messenger.sent().is_empty(), "{body}");
            assert!(h.store.contents("777").is_empty(), "{body}");
        }
    }

    #[tokio::test]
    async fn malformed_body_is_still_ok() {
        let h = harness();
        assert_eq!(post(h.router, "{not json").await, StatusCode::OK);
        assert!(h.messenger.sent().is_empty());
    }
}
