//! # Chat Pipeline
//!
//! Orchestrates one chat request:
//! 1.  **Validation**: the query must be non-blank; history roles must be `user` or `assistant`.
//! 2.  **Retrieval** (embed, then vector store) and **web search**, concurrently. A failure
//!     in either is absorbed: the request continues with an empty list for that source.
//! 3.  **Composing**: the context formatter and prompt assembler build the message list.
//! 4.  **Completing**: the completion provider answers. A failure here ends the request.
//!
//! Every stage runs under its own timeout. The pipeline spawns no tasks, so dropping
//! the future returned by [`ChatPipeline::run`] cancels every in-flight upstream call.

use crate::{
    context::{ContextBullet, ContextFormatter},
    errors::{ChatError, ChatFailure, PromptError},
    prompts::{assemble, PersonaConfig},
    providers::{
        ai::{AiProvider, EmbeddingProvider},
        vector::VectorStore,
        web::WebSearch,
    },
    types::{ChatMessage, GenerationOptions, RetrievedRecord, Role, WebSnippet},
};
use serde::Serialize;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{error, info, warn};

/// The states a request moves through. `Responded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Received,
    Validating,
    Embedding,
    Retrieving,
    Searching,
    Composing,
    Completing,
    Responded,
    Failed,
}

impl ChatState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatState::Responded | ChatState::Failed)
    }
}

/// An upstream failure the pipeline absorbed instead of failing the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub stage: ChatState,
    pub reason: String,
}

/// What happened during one run: states visited, context used, failures absorbed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatTrace {
    pub states: Vec<ChatState>,
    pub internal_bullets: Vec<ContextBullet>,
    pub external_bullets: Vec<ContextBullet>,
    pub degraded: Vec<Degradation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ChatTrace {
    fn enter(&mut self, state: ChatState) {
        debug_assert!(
            !self.is_finished(),
            "no state may follow a terminal state (entering {state:?})"
        );
        self.states.push(state);
    }

    fn degrade(&mut self, stage: ChatState, error: &ChatError) {
        warn!("[chat] Continuing without {stage:?} results: {error}");
        self.degraded.push(Degradation {
            stage,
            reason: error.to_string(),
        });
    }

    fn fail(mut self, terminal: ChatState, error: ChatError) -> ChatFailure {
        self.enter(terminal);
        ChatFailure { error, trace: self }
    }

    /// The terminal state reached, if any.
    pub fn terminal(&self) -> Option<ChatState> {
        self.states.last().copied().filter(ChatState::is_terminal)
    }

    pub fn is_finished(&self) -> bool {
        self.terminal().is_some()
    }
}

/// The input of one chat request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub query: String,
    pub history: Vec<ChatMessage>,
}

/// A successful answer.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub answer: String,
    pub trace: ChatTrace,
}

/// Upper bounds on how long each upstream stage may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub embedding: Duration,
    pub retrieval: Duration,
    pub search: Duration,
    pub completion: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(10),
            retrieval: Duration::from_secs(10),
            search: Duration::from_secs(15),
            completion: Duration::from_secs(60),
        }
    }
}

/// Result counts, sampling options and timeouts for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub top_k: u32,
    pub web_results: u32,
    pub generation: GenerationOptions,
    pub timeouts: StageTimeouts,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            web_results: 3,
            generation: GenerationOptions::default(),
            timeouts: StageTimeouts::default(),
        }
    }
}

/// The retrieval-and-prompt-assembly pipeline with its injected providers.
#[derive(Debug)]
pub struct ChatPipeline {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    web_search: Option<Arc<dyn WebSearch>>,
    ai_provider: Option<Arc<dyn AiProvider>>,
    formatter: ContextFormatter,
    persona: PersonaConfig,
    settings: PipelineSettings,
}

/// A builder for [`ChatPipeline`].
///
/// No provider is mandatory at build time. A missing embedder, vector store,
/// web search or completion provider is reported per request as
/// [`ChatError::ConfigurationMissing`], before any upstream call is made.
#[derive(Default)]
pub struct ChatPipelineBuilder {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    web_search: Option<Arc<dyn WebSearch>>,
    ai_provider: Option<Arc<dyn AiProvider>>,
    formatter: ContextFormatter,
    persona: PersonaConfig,
    settings: PipelineSettings,
}

impl ChatPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_store(mut self, vector_store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(vector_store);
        self
    }

    pub fn web_search(mut self, web_search: Arc<dyn WebSearch>) -> Self {
        self.web_search = Some(web_search);
        self
    }

    pub fn ai_provider(mut self, ai_provider: Arc<dyn AiProvider>) -> Self {
        self.ai_provider = Some(ai_provider);
        self
    }

    pub fn formatter(mut self, formatter: ContextFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn persona(mut self, persona: PersonaConfig) -> Self {
        self.persona = persona;
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> ChatPipeline {
        ChatPipeline {
            embedder: self.embedder,
            vector_store: self.vector_store,
            web_search: self.web_search,
            ai_provider: self.ai_provider,
            formatter: self.formatter,
            persona: self.persona,
            settings: self.settings,
        }
    }
}

/// The providers a request needs, borrowed from the pipeline.
struct Components<'a> {
    embedder: &'a dyn EmbeddingProvider,
    vector_store: &'a dyn VectorStore,
    web_search: &'a dyn WebSearch,
    ai_provider: &'a dyn AiProvider,
}

/// Where the retrieval branch stopped.
struct RetrievalOutcome {
    records: Vec<RetrievedRecord>,
    embedding_error: Option<PromptError>,
    store_error: Option<PromptError>,
}

impl ChatPipeline {
    pub fn builder() -> ChatPipelineBuilder {
        ChatPipelineBuilder::new()
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs one request to completion.
    pub async fn run(&self, request: ChatRequest) -> Result<ChatReply, ChatFailure> {
        let mut trace = ChatTrace::default();
        trace.enter(ChatState::Received);
        trace.enter(ChatState::Validating);

        if let Err(error) = validate(&request) {
            info!("[chat] Rejected request: {error}");
            return Err(trace.fail(ChatState::Responded, error));
        }
        let query = request.query.trim();

        let components = match self.components() {
            Ok(components) => components,
            Err(error) => {
                error!("[chat] {error}");
                return Err(trace.fail(ChatState::Failed, error));
            }
        };

        info!("[chat] Gathering context for query: '{query}'");
        let (retrieval, search) = tokio::join!(
            self.retrieve(components.embedder, components.vector_store, query),
            self.search(components.web_search, query)
        );

        trace.enter(ChatState::Embedding);
        let records = match retrieval.embedding_error {
            Some(e) => {
                trace.degrade(ChatState::Embedding, &ChatError::RetrievalUnavailable(e));
                Vec::new()
            }
            None => {
                trace.enter(ChatState::Retrieving);
                if let Some(e) = retrieval.store_error {
                    trace.degrade(ChatState::Retrieving, &ChatError::RetrievalUnavailable(e));
                }
                retrieval.records
            }
        };

        trace.enter(ChatState::Searching);
        let snippets = search.unwrap_or_else(|e| {
            trace.degrade(ChatState::Searching, &ChatError::SearchUnavailable(e));
            Vec::new()
        });

        trace.enter(ChatState::Composing);
        trace.internal_bullets = self.formatter.format_internal(&records);
        trace.external_bullets = self.formatter.format_external(&snippets);
        let prompt = assemble(
            query,
            &request.history,
            &trace.internal_bullets,
            &trace.external_bullets,
            &self.persona,
        );
        info!(
            "[chat] Composed prompt with {} internal and {} external bullets, {} history entries.",
            trace.internal_bullets.len(),
            trace.external_bullets.len(),
            request.history.len()
        );

        trace.enter(ChatState::Completing);
        let completion = within(
            "Completion API",
            self.settings.timeouts.completion,
            components
                .ai_provider
                .generate(&prompt, &self.settings.generation),
        )
        .await;

        match completion {
            Ok(completion) => {
                trace.finish_reason = completion.finish_reason;
                trace.enter(ChatState::Responded);
                Ok(ChatReply {
                    answer: completion.text,
                    trace,
                })
            }
            Err(e) => {
                error!("[chat] Completion failed: {e}");
                Err(trace.fail(ChatState::Failed, ChatError::CompletionUnavailable(e)))
            }
        }
    }

    fn components(&self) -> Result<Components<'_>, ChatError> {
        match (
            &self.embedder,
            &self.vector_store,
            &self.web_search,
            &self.ai_provider,
        ) {
            (Some(embedder), Some(vector_store), Some(web_search), Some(ai_provider)) => {
                Ok(Components {
                    embedder: embedder.as_ref(),
                    vector_store: vector_store.as_ref(),
                    web_search: web_search.as_ref(),
                    ai_provider: ai_provider.as_ref(),
                })
            }
            (embedder, vector_store, web_search, ai_provider) => {
                let missing: Vec<&str> = [
                    (embedder.is_none(), "embedding"),
                    (vector_store.is_none(), "vector_store"),
                    (web_search.is_none(), "web_search"),
                    (ai_provider.is_none(), "completion"),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(ChatError::ConfigurationMissing(missing.join(", ")))
            }
        }
    }

    async fn retrieve(
        &self,
        embedder: &dyn EmbeddingProvider,
        vector_store: &dyn VectorStore,
        query: &str,
    ) -> RetrievalOutcome {
        let timeouts = &self.settings.timeouts;
        let vector = match within("Embeddings API", timeouts.embedding, embedder.embed(query)).await
        {
            Ok(vector) => vector,
            Err(e) => {
                return RetrievalOutcome {
                    records: Vec::new(),
                    embedding_error: Some(e),
                    store_error: None,
                }
            }
        };

        match within(
            "Vector store",
            timeouts.retrieval,
            vector_store.query(&vector, self.settings.top_k),
        )
        .await
        {
            Ok(records) => RetrievalOutcome {
                records,
                embedding_error: None,
                store_error: None,
            },
            Err(e) => RetrievalOutcome {
                records: Vec::new(),
                embedding_error: None,
                store_error: Some(e),
            },
        }
    }

    async fn search(
        &self,
        web_search: &dyn WebSearch,
        query: &str,
    ) -> Result<Vec<WebSnippet>, PromptError> {
        within(
            "Web search",
            self.settings.timeouts.search,
            web_search.search(query, self.settings.web_results),
        )
        .await
    }
}

fn validate(request: &ChatRequest) -> Result<(), ChatError> {
    if request.query.trim().is_empty() {
        return Err(ChatError::InvalidInput(
            "query must not be empty".to_string(),
        ));
    }
    if let Some(position) = request
        .history
        .iter()
        .position(|entry| entry.role == Role::System)
    {
        return Err(ChatError::InvalidInput(format!(
            "history entry {position} has role 'system'; only 'user' and 'assistant' are allowed"
        )));
    }
    Ok(())
}

/// Runs an upstream call under a time budget.
async fn within<T>(
    service: &'static str,
    budget: Duration,
    call: impl Future<Output = Result<T, PromptError>>,
) -> Result<T, PromptError> {
    tokio::time::timeout(budget, call)
        .await
        .map_err(|_| PromptError::Timeout(service, budget))?
}
