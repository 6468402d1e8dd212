use botfather::{ChatError, ChatFailure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{error, warn};

/// Shown when a required upstream component is not configured.
pub const NOT_CONFIGURED_MESSAGE: &str = "Server is not configured correctly.";

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The request body could not be decoded.
    BadRequest(String),
    /// The chat pipeline ended in a failure.
    Chat {
        failure: ChatFailure,
        /// The persona's message for an unreachable completion provider.
        fallback_message: String,
        /// The trace to attach to the response, when the caller asked for it.
        debug: Option<Value>,
    },
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

/// Conversion from `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message, debug) = match self {
            AppError::BadRequest(message) => {
                warn!("Rejected request body: {message}");
                (StatusCode::BAD_REQUEST, message, None)
            }
            AppError::Chat {
                failure,
                fallback_message,
                debug,
            } => {
                let (status, message) = match &failure.error {
                    ChatError::InvalidInput(message) => {
                        warn!("Invalid chat request: {message}");
                        (StatusCode::BAD_REQUEST, message.clone())
                    }
                    ChatError::ConfigurationMissing(missing) => {
                        error!("Chat pipeline is missing components: {missing}");
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            NOT_CONFIGURED_MESSAGE.to_string(),
                        )
                    }
                    // Upstream detail is logged, never returned.
                    other => {
                        error!("ChatError: {:?}", other);
                        (StatusCode::INTERNAL_SERVER_ERROR, fallback_message)
                    }
                };
                (status, message, debug)
            }
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": error_message,
        });
        if let Some(debug) = debug {
            body["debug"] = debug;
        }

        (status_code, Json(body)).into_response()
    }
}
