//! # Upstream Providers
//!
//! Clients for the four external collaborators of a chat request: embeddings,
//! vector store, web search and completion. Each one sits behind a trait so the
//! pipeline can be driven by fakes in tests.

pub mod ai;
pub mod factory;
pub mod http;
pub mod vector;
pub mod web;
