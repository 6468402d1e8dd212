//! # BotFather
//!
//! The retrieval-and-prompt-assembly core of the BotFather chatbot. A user query
//! is embedded and matched against a vector index of AI tools, searched on the web,
//! formatted into context bullets, assembled with the persona and conversation
//! history, and answered by a hosted completion model.

pub mod context;
pub mod errors;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod types;

pub use context::{ContextBullet, ContextFormatter, FormatterConfig};
pub use errors::{ChatError, ChatFailure, PromptError};
pub use pipeline::{
    ChatPipeline, ChatPipelineBuilder, ChatReply, ChatRequest, ChatState, ChatTrace,
    PipelineSettings, StageTimeouts,
};
pub use prompts::{assemble, AssembledPrompt, HistoryMode, PersonaConfig};
pub use types::{
    ChatMessage, Completion, GenerationOptions, MetadataValue, RetrievedRecord, Role, WebSnippet,
};
