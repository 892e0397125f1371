pub mod chat;
pub mod handlers;
pub mod messenger;
pub mod replies;
pub mod telegram;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};

use crate::ai::llm::Completion;
use crate::config::AppConfig;
use crate::db::Store;
use crate::engine::extract::Extractor;
use messenger::Messenger;

/// Shared application state, accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub llm: Arc<dyn Completion>,
    pub messenger: Arc<dyn Messenger>,
    pub extractor: Extractor,
}

/// Build the HTTP routes for both channels.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/chat",
            post(chat::handle_chat)
                .options(chat::preflight)
                .fallback(chat::method_not_allowed),
        )
        .route("/api/telegram", post(telegram::handle_update))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
