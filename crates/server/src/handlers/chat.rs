//! # Chat Handlers
//!
//! `/api/rag` and `/api/chat` run the same pipeline and differ only in the
//! shape of a successful response. The body is decoded here rather than by an
//! extractor, so a malformed payload is reported in the usual `{ "error" }` form.
//!
//! The pipeline future is owned by the handler: if the client disconnects,
//! axum drops it and every in-flight upstream call is cancelled with it.

use super::{AppError, AppState, AssistantMessage, ChatPayload, DebugParams, RagResponse};
use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use botfather::{types::Role, ChatReply, ChatTrace};
use serde_json::Value;
use tracing::info;

/// The handler for `POST /api/rag`, answering with `{ "answer" }`.
pub async fn rag_handler(
    State(app_state): State<AppState>,
    Query(debug_params): Query<DebugParams>,
    body: Bytes,
) -> Result<Json<RagResponse>, AppError> {
    let reply = run_chat(&app_state, &debug_params, &body).await?;
    Ok(Json(RagResponse {
        debug: debug_info(&debug_params, &reply.trace),
        answer: reply.answer,
    }))
}

/// The handler for `POST /api/chat`, answering with one assistant message.
pub async fn chat_handler(
    State(app_state): State<AppState>,
    Query(debug_params): Query<DebugParams>,
    body: Bytes,
) -> Result<Json<AssistantMessage>, AppError> {
    let reply = run_chat(&app_state, &debug_params, &body).await?;
    Ok(Json(AssistantMessage {
        debug: debug_info(&debug_params, &reply.trace),
        role: Role::Assistant,
        content: reply.answer,
    }))
}

async fn run_chat(
    app_state: &AppState,
    debug_params: &DebugParams,
    body: &[u8],
) -> Result<ChatReply, AppError> {
    let payload: ChatPayload = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;
    let request = payload.into_request().map_err(AppError::BadRequest)?;
    info!(
        "Received chat request: '{}' ({} history entries)",
        request.query,
        request.history.len()
    );

    app_state
        .pipeline
        .run(request)
        .await
        .map_err(|failure| AppError::Chat {
            debug: debug_info(debug_params, &failure.trace),
            fallback_message: app_state.pipeline.persona().fallback_message.clone(),
            failure,
        })
}

fn debug_info(debug_params: &DebugParams, trace: &ChatTrace) -> Option<Value> {
    if debug_params.enabled() {
        serde_json::to_value(trace).ok()
    } else {
        None
    }
}
