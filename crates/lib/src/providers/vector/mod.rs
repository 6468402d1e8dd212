//! # Vector Store Providers
//!
//! Nearest-neighbour lookup over the tool knowledge base.

pub mod pinecone;

use crate::{errors::PromptError, types::RetrievedRecord};
use async_trait::async_trait;
use std::fmt::Debug;

pub use pinecone::PineconeProvider;

/// Returns the records closest to a query vector, most relevant first.
#[async_trait]
pub trait VectorStore: Send + Sync + Debug {
    async fn query(&self, vector: &[f32], top_k: u32)
        -> Result<Vec<RetrievedRecord>, PromptError>;
}
