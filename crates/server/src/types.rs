//! # Request and Response Types
//!
//! The JSON bodies of the chat endpoints, and the conversion of a chat payload
//! into a validated [`ChatRequest`].

use botfather::{types::Role, ChatMessage, ChatRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize, Default)]
pub struct DebugParams {
    pub debug: Option<bool>,
}

impl DebugParams {
    pub fn enabled(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

/// The body accepted by `/api/rag` and `/api/chat`.
///
/// The widget sends `message`; older clients send `query`.
#[derive(Debug, Deserialize, Default)]
pub struct ChatPayload {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// A history entry as sent over the wire, before its role is checked.
#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatPayload {
    /// Converts the payload into a pipeline request, rejecting unknown roles.
    pub fn into_request(self) -> Result<ChatRequest, String> {
        let history = self
            .history
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let role = match entry.role.as_str() {
                    "user" => Role::User,
                    "assistant" => Role::Assistant,
                    "system" => Role::System,
                    other => {
                        return Err(format!(
                            "history entry {i} has unknown role '{other}'; expected 'user' or 'assistant'"
                        ))
                    }
                };
                Ok(ChatMessage::new(role, entry.content))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChatRequest {
            query: self.query.or(self.message).unwrap_or_default(),
            history,
        })
    }
}

/// The response of `/api/rag`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RagResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
    pub answer: String,
}

/// The response of `/api/chat` and `/api/greeting`: one assistant message.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
    pub role: Role,
    pub content: String,
}
