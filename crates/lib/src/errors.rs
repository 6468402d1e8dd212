use crate::pipeline::ChatTrace;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the provider clients (embeddings, vector store, web search, completion).
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to {service}: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize {service} response: {source}")]
    Deserialization {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned an error ({status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{0} returned an empty response")]
    EmptyResponse(&'static str),
    #[error("{0} did not answer within {1:?}")]
    Timeout(&'static str, Duration),
    #[error("AI provider is not configured: {0}")]
    MissingAiProvider(String),
}

/// The error taxonomy of a single chat request.
///
/// `RetrievalUnavailable` and `SearchUnavailable` are absorbed by the pipeline and
/// only ever appear inside a [`ChatTrace`]; the other variants end the request.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(PromptError),
    #[error("Web search unavailable: {0}")]
    SearchUnavailable(PromptError),
    #[error("Completion unavailable: {0}")]
    CompletionUnavailable(PromptError),
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),
}

/// A fatal pipeline outcome together with the states visited before it.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ChatFailure {
    pub error: ChatError,
    pub trace: ChatTrace,
}
