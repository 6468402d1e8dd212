//! # Web Search Providers

pub mod exa;

use crate::{errors::PromptError, types::WebSnippet};
use async_trait::async_trait;
use std::fmt::Debug;

pub use exa::{ExaProvider, ExaSearchOptions};

/// Runs a free-text web search and returns snippets in relevance order.
#[async_trait]
pub trait WebSearch: Send + Sync + Debug {
    async fn search(&self, query: &str, num_results: u32) -> Result<Vec<WebSnippet>, PromptError>;
}
