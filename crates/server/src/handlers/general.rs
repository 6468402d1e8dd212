//! # General Route Handlers

use super::{AppState, AssistantMessage};
use axum::{extract::State, Json};
use botfather::types::Role;

/// The handler for the root (`/`) endpoint.
pub async fn root() -> &'static str {
    "botfather server is running."
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// The widget's opening message (`/api/greeting`).
pub async fn greeting_handler(State(app_state): State<AppState>) -> Json<AssistantMessage> {
    Json(AssistantMessage {
        debug: None,
        role: Role::Assistant,
        content: app_state.pipeline.persona().greeting.clone(),
    })
}
