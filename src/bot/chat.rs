//! Web chat endpoint used by the site widget.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use super::handlers::{history_to_chat, save_reply};
use super::{replies, AppState};
use crate::ai::prompt::{self, BirthContext};
use crate::db::models::Role;
use crate::engine::extract::contains_date;
use crate::error::StoreError;

const DEFAULT_SESSION: &str = "demo-session";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Birthdate typed into the widget form, used when no profile exists yet
    #[serde(default)]
    pub birthdate: Option<String>,
}

#[derive(Debug)]
pub enum ChatError {
    BadRequest(String),
    MethodNotAllowed,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ChatError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ChatError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "Only POST allowed".to_string())
            }
        };
        with_cors((status, Json(json!({ "error": message }))).into_response())
    }
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

pub async fn preflight() -> Response {
    with_cors(StatusCode::OK.into_response())
}

pub async fn method_not_allowed() -> ChatError {
    ChatError::MethodNotAllowed
}

pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ChatError> {
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| ChatError::BadRequest(format!("Invalid JSON: {e}")))?;

    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ChatError::BadRequest("Message is required".to_string()))?;

    let session_id = request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION);

    let reply = match chat_turn(&state, session_id, message, request.birthdate.as_deref()).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(session_id, error = %e, "chat turn failed");
            replies::PROCESSING_FAILED.to_string()
        }
    };
    save_reply(&state, session_id, &reply).await;

    Ok(with_cors(Json(json!({ "reply": reply })).into_response()))
}

async fn chat_turn(
    state: &AppState,
    session_id: &str,
    message: &str,
    birthdate_hint: Option<&str>,
) -> Result<String, StoreError> {
    if let Err(e) = state.store.insert_message(session_id, Role::User, message).await {
        tracing::warn!(session_id, error = %e, "failed to store user message");
    }

    let mut save_failed = false;
    if contains_date(message) {
        let today = chrono::Local::now().date_naive();
        if let Some(extracted) = state.extractor.extract(message, today) {
            for note in &extracted.notes {
                tracing::warn!(session_id, note = ?note, "suspicious birth data");
            }
            match state
                .store
                .upsert_profile(session_id, &extracted.into_profile())
                .await
            {
                Ok(saved) => tracing::info!(session_id, profile = %saved.describe(), "profile saved"),
                Err(e) => {
                    tracing::error!(session_id, error = %e, "failed to save profile");
                    save_failed = true;
                }
            }
        }
    }

    let profile = state.store.get_profile(session_id).await?;
    let history = state
        .store
        .recent_messages(session_id, state.config.history_limit)
        .await?;

    let system_prompt = prompt::build_system_prompt(&BirthContext {
        profile: profile.as_ref(),
        birthdate_hint,
    });

    let reply = match state.llm.complete(&system_prompt, &history_to_chat(&history)).await {
        Ok(reply) => prompt::sanitize_reply(&reply),
        Err(e) => {
            tracing::error!(session_id, error = %e, "completion failed");
            replies::UNAVAILABLE.to_string()
        }
    };

    if save_failed {
        Ok(format!("{}\n\n{}", replies::SAVE_FAILED, reply))
    } else {
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::build_router;
    use crate::engine::profile::Profile;
    use crate::testing::{test_state, MemoryStore, ScriptedCompletion};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn router(store: Arc<MemoryStore>, llm: Arc<ScriptedCompletion>) -> axum::Router {
        build_router(Arc::new(test_state(store, llm)))
    }

    fn request(method: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_cors(response: &Response) {
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[tokio::test]
    async fn replies_with_sanitized_answer_and_stores_both_turns() {
        let store = Arc::new(MemoryStore::default());
        let llm = Arc::new(ScriptedCompletion::replying(
            "Согласно моим данным, неделя удачная.",
        ));
        let app = router(store.clone(), llm.clone());

        let response = app
            .oneshot(request("POST", r#"{"message":"Что меня ждёт?","session_id":"s1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        assert_eq!(
            json_body(response).await,
            json!({ "reply": "в практике, неделя удачная." })
        );
        assert_eq!(store.roles("s1"), vec![Role::User, Role::Assistant]);

        let (_, messages) = &llm.calls()[0];
        assert_eq!(messages.last().map(|m| m.content.as_str()), Some("Что меня ждёт?"));
    }

    #[tokio::test]
    async fn date_in_message_is_saved_and_used_in_prompt() {
        let store = Arc::new(MemoryStore::default());
        let llm = Arc::new(ScriptedCompletion::replying("ok"));
        let app = router(store.clone(), llm.clone());

        let response = app
            .oneshot(request("POST", r#"{"message":"Я родилась 18.12.1990 в 14:30, город: Казань"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            store.profile(DEFAULT_SESSION),
            Some(Profile {
                birthdate: Some("1990-12-18".into()),
                birthtime: Some("14:30".into()),
                city: Some("Казань".into()),
            })
        );
        let (system, _) = &llm.calls()[0];
        assert!(system.contains("1990-12-18 14:30 Казань"));
    }

    #[tokio::test]
    async fn failed_profile_save_is_reported_with_the_answer() {
        let store = Arc::new(MemoryStore::default());
        store.fail_upserts.store(true, std::sync::atomic::Ordering::SeqCst);
        let app = router(
            store.clone(),
            Arc::new(ScriptedCompletion::replying("Звёзды благосклонны.")),
        );

        let response = app
            .oneshot(request("POST", r#"{"message":"18.12.1990 14:30 Москва","session_id":"s3"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let reply = json_body(response).await["reply"]
            .as_str()
            .map(str::to_string)
            .unwrap();
        assert_eq!(
            reply,
            format!("{}\n\nЗвёзды благосклонны.", replies::SAVE_FAILED)
        );
        assert_eq!(store.profile("s3"), None);
    }

    #[tokio::test]
    async fn birthdate_hint_reaches_prompt_without_profile() {
        let store = Arc::new(MemoryStore::default());
        let llm = Arc::new(ScriptedCompletion::replying("ok"));
        let app = router(store, llm.clone());

        app.oneshot(request("POST", r#"{"message":"Привет","birthdate":"5 мая 1985"}"#))
            .await
            .unwrap();

        let (system, _) = &llm.calls()[0];
        assert!(system.contains("Пользователь родился 5 мая 1985"));
    }

    #[tokio::test]
    async fn missing_message_is_bad_request() {
        let store = Arc::new(MemoryStore::default());
        let llm = Arc::new(ScriptedCompletion::replying("ok"));

        for body in [r#"{}"#, r#"{"message":"   "}"#] {
            let response = router(store.clone(), llm.clone())
                .oneshot(request("POST", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_cors(&response);
            assert_eq!(json_body(response).await, json!({ "error": "Message is required" }));
        }
        assert!(llm.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let response = router(
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedCompletion::replying("ok")),
        )
        .oneshot(request("POST", "{oops"))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn model_failure_still_answers_ok() {
        let store = Arc::new(MemoryStore::default());
        let app = router(store.clone(), Arc::new(ScriptedCompletion::failing()));

        let response = app
            .oneshot(request("POST", r#"{"message":"Привет","session_id":"s2"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "reply": replies::UNAVAILABLE })
        );
        assert_eq!(store.contents("s2")[0], "Привет");
    }

    #[tokio::test]
    async fn preflight_and_wrong_method() {
        let store = Arc::new(MemoryStore::default());
        let llm = Arc::new(ScriptedCompletion::replying("ok"));

        let response = router(store.clone(), llm.clone())
            .oneshot(request("OPTIONS", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);

        let response = router(store, llm)
            .oneshot(request("GET", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_cors(&response);
        assert_eq!(json_body(response).await, json!({ "error": "Only POST allowed" }));
    }
}
