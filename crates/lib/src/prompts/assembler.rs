//! # Prompt Assembler
//!
//! Combines the persona, formatted context, conversation history and the
//! user's query into the ordered message list sent to the completion provider.
//!
//! The resulting order is always:
//! 1. the persona (system) block,
//! 2. history entries, oldest first (unless rendered inline),
//! 3. the context block, when the persona defines one,
//! 4. the user's query.

use super::persona::{HistoryMode, PersonaConfig};
use crate::context::{join_bullets, ContextBullet};
use crate::types::{ChatMessage, Role};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(query|history|internalContext|externalContext)\}")
        .expect("placeholder pattern is valid")
});

/// An ordered list of role-tagged messages, ready for a completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub messages: Vec<ChatMessage>,
}

impl AssembledPrompt {
    /// The content of the leading persona block.
    pub fn persona(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// The user's query, which is always the final message.
    pub fn query(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// A stable plain-text rendering of the whole prompt, for logging and golden tests.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("[{}]\n{}", m.role.as_str().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The values substituted into persona templates.
struct TemplateValues<'a> {
    query: &'a str,
    history: String,
    internal_context: String,
    external_context: String,
}

impl TemplateValues<'_> {
    fn get(&self, name: &str) -> &str {
        match name {
            "query" => self.query,
            "history" => &self.history,
            "internalContext" => &self.internal_context,
            "externalContext" => &self.external_context,
            _ => "",
        }
    }
}

/// Builds the message list for one completion request.
///
/// Given identical arguments the output is byte-identical.
pub fn assemble(
    query: &str,
    history: &[ChatMessage],
    internal: &[ContextBullet],
    external: &[ContextBullet],
    persona: &PersonaConfig,
) -> AssembledPrompt {
    let query = query.trim();
    let values = TemplateValues {
        query,
        history: match persona.history_mode {
            HistoryMode::Inline => render_history(history),
            HistoryMode::Messages => String::new(),
        },
        internal_context: join_bullets(internal),
        external_context: join_bullets(external),
    };

    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::system(substitute(
        &persona.system_template,
        &values,
    )));

    if persona.history_mode == HistoryMode::Messages {
        messages.extend(history.iter().cloned());
    }

    if let Some(context_template) = &persona.context_template {
        messages.push(ChatMessage::system(substitute(context_template, &values)));
    }

    messages.push(ChatMessage::user(query));
    AssembledPrompt { messages }
}

/// Renders history as `ROLE: content` entries separated by a blank line.
/// Line breaks inside one entry are collapsed to spaces.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|entry| {
            let content = entry
                .content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            format!("{}: {content}", role_label(entry.role))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "SYSTEM",
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
    }
}

/// Replaces every recognized placeholder in a single pass. Substituted text is
/// never scanned again, so context containing `{query}` stays literal.
fn substitute(template: &str, values: &TemplateValues<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| values.get(&caps[1]).to_string())
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(query: &str) -> TemplateValues<'_> {
        TemplateValues {
            query,
            history: String::new(),
            internal_context: "- {query}".to_string(),
            external_context: String::new(),
        }
    }

    #[test]
    fn substitution_is_single_pass() {
        let out = substitute("Q={query} I={internalContext}", &values("hi"));
        assert_eq!(out, "Q=hi I=- {query}");
    }

    #[test]
    fn unknown_braces_are_left_alone() {
        let out = substitute(r#"{"tool": "{query}"} {other}"#, &values("x"));
        assert_eq!(out, r#"{"tool": "x"} {other}"#);
    }

    #[test]
    fn empty_values_become_empty_strings() {
        let out = substitute("[{externalContext}][{history}]", &values("x"));
        assert_eq!(out, "[][]");
    }
}
