//! # Persona Templates
//!
//! The BotFather persona: the fixed tone and output rules applied to every
//! completion request. Templates may reference `{query}`, `{history}`,
//! `{internalContext}` and `{externalContext}`; any other braces are kept verbatim.

use serde::{Deserialize, Serialize};

/// The default persona. Defines who the assistant is and how answers are laid out.
pub const BOTFATHER_SYSTEM_PROMPT: &str = r#"You are the BotFather, an AI Tool Matchmaker.

You ONLY help users pick the best AI tool for their use case.

For every tool-recommendation question:
1. Understand the use case.
2. Use the KNOWLEDGE BASE RESULTS and WEB SEARCH RESULTS you are given. Prefer them over your own memory.
3. Pick the top 3 tools.
4. Output:
- A short summary
- 3 tool descriptions
- A comparison table:
| Tool | Price | Best For | USP | Reviews | Website |
- A simple text figure (rating bars or price levels)

For small talk, answer briefly in character and offer to find a tool.

Formatting rules:
- Separate every paragraph, list and table with a blank line.
- Never dump raw data, JSON or metadata keys.

REFUSE:
- Self-harm
- Illegal activity
- Medical or legal advice
- Anything not related to AI tools"#;

/// The default context block, sent as its own system message right before the user's question.
pub const BOTFATHER_CONTEXT_PROMPT: &str = r#"KNOWLEDGE BASE RESULTS:

{internalContext}

WEB SEARCH RESULTS:

{externalContext}"#;

/// Shown to the user when the completion provider cannot be reached.
pub const BOTFATHER_FALLBACK_MESSAGE: &str =
    "The Family is tied up right now. Come back in a moment and I'll make you an offer you can't refuse.";

/// The widget's opening message.
pub const BOTFATHER_GREETING: &str =
    "Hi, I am the BotFather… and I'm gonna give you a bot you can't refuse.";

/// How conversation history reaches the completion provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Each history entry becomes its own role-tagged message.
    #[default]
    Messages,
    /// History is rendered as text into the `{history}` placeholder.
    Inline,
}

/// Template text and fixed strings for the assistant's persona.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PersonaConfig {
    #[serde(default = "default_system_template")]
    pub system_template: String,
    /// When set, context is sent as a dedicated block preceding the user query.
    #[serde(default = "default_context_template")]
    pub context_template: Option<String>,
    #[serde(default)]
    pub history_mode: HistoryMode,
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_template: default_system_template(),
            context_template: default_context_template(),
            history_mode: HistoryMode::default(),
            fallback_message: default_fallback_message(),
            greeting: default_greeting(),
        }
    }
}

fn default_system_template() -> String {
    BOTFATHER_SYSTEM_PROMPT.to_string()
}

fn default_context_template() -> Option<String> {
    Some(BOTFATHER_CONTEXT_PROMPT.to_string())
}

fn default_fallback_message() -> String {
    BOTFATHER_FALLBACK_MESSAGE.to_string()
}

fn default_greeting() -> String {
    BOTFATHER_GREETING.to_string()
}
