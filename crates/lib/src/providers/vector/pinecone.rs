use crate::{
    errors::PromptError,
    providers::{
        http::{build_client, send_with_retry, HttpSettings, RetryPolicy},
        vector::VectorStore,
    },
    types::{MetadataValue, RetrievedRecord},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const SERVICE: &str = "Pinecone";

// --- Pinecone query request and response structures ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: u32,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize, Debug)]
struct Match {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<BTreeMap<String, MetadataValue>>,
}

/// A client for a single Pinecone index, addressed by its data-plane host.
#[derive(Clone, Debug)]
pub struct PineconeProvider {
    client: ReqwestClient,
    query_url: String,
    api_key: String,
    namespace: Option<String>,
    retry: RetryPolicy,
}

impl PineconeProvider {
    /// Creates a client for the index served at `index_host`
    /// (e.g. `ai-tools-abc123.svc.us-east-1.pinecone.io`, with or without a scheme).
    pub fn new(
        index_host: &str,
        api_key: String,
        namespace: Option<String>,
        settings: HttpSettings,
    ) -> Result<Self, PromptError> {
        let host = index_host.trim_end_matches('/');
        let query_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/query")
        } else {
            format!("https://{host}/query")
        };
        Ok(Self {
            client: build_client(&settings)?,
            query_url,
            api_key,
            namespace: namespace.filter(|ns| !ns.is_empty()),
            retry: settings.retry,
        })
    }
}

#[async_trait]
impl VectorStore for PineconeProvider {
    async fn query(
        &self,
        vector: &[f32],
        top_k: u32,
    ) -> Result<Vec<RetrievedRecord>, PromptError> {
        let request_body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        debug!(top_k, dims = vector.len(), "--> Querying Pinecone index");

        let response = send_with_retry(SERVICE, &self.retry, || {
            self.client
                .post(&self.query_url)
                .header("Api-Key", &self.api_key)
                .json(&request_body)
        })
        .await?;

        let body: QueryResponse =
            response
                .json()
                .await
                .map_err(|source| PromptError::Deserialization {
                    service: SERVICE,
                    source,
                })?;

        Ok(body
            .matches
            .into_iter()
            .map(|m| RetrievedRecord {
                id: m.id,
                score: m.score,
                fields: m.metadata.unwrap_or_default(),
            })
            .collect())
    }
}
