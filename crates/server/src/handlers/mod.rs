//! # API Route Handlers
//!
//! This module organizes all the Axum route handlers for the `botfather-server`.

pub mod chat;
pub mod general;

// Re-export all handlers from the sub-modules to make them easily accessible
// to the router under a single `handlers::` path.
pub use chat::*;
pub use general::*;

// Shared items used by multiple handler modules.
use super::{
    errors::AppError,
    state::AppState,
    types::{AssistantMessage, ChatPayload, DebugParams, RagResponse},
};
