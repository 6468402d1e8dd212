//! # Context Formatter
//!
//! Turns vector store records and web search snippets into single-line bullets
//! that can be injected into a prompt. Formatting is a pure function of its
//! input: the same records always yield byte-identical bullets, in the same
//! order the upstream service returned them.

use crate::types::{RetrievedRecord, WebSnippet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The separator placed between bullets when they are joined into one block.
/// A blank line tells the chat widget to start a new block.
pub const BULLET_SEPARATOR: &str = "\n\n";

/// One formatted line of context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContextBullet(String);

impl ContextBullet {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContextBullet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata keys consulted, in priority order, when picking a record's name and description.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FieldAliases {
    #[serde(default = "default_name_fields")]
    pub name: Vec<String>,
    #[serde(default = "default_description_fields")]
    pub description: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            name: default_name_fields(),
            description: default_description_fields(),
        }
    }
}

fn default_name_fields() -> Vec<String> {
    ["Chatbot_Name", "name", "Name", "tool_name", "Tool", "title", "Title"]
        .map(String::from)
        .to_vec()
}

fn default_description_fields() -> Vec<String> {
    [
        "description",
        "Description",
        "use_case",
        "Use_Case",
        "Use Case",
        "summary",
        "Summary",
        "text",
    ]
    .map(String::from)
    .to_vec()
}

/// Settings for the [`ContextFormatter`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FormatterConfig {
    #[serde(default)]
    pub aliases: FieldAliases,
    #[serde(default = "default_name_placeholder")]
    pub name_placeholder: String,
    #[serde(default = "default_description_placeholder")]
    pub description_placeholder: String,
    /// Maximum number of characters kept from a snippet body when it has no highlights.
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    #[serde(default = "default_highlight_separator")]
    pub highlight_separator: String,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            aliases: FieldAliases::default(),
            name_placeholder: default_name_placeholder(),
            description_placeholder: default_description_placeholder(),
            body_limit: default_body_limit(),
            highlight_separator: default_highlight_separator(),
        }
    }
}

fn default_name_placeholder() -> String {
    "Tool".to_string()
}

fn default_description_placeholder() -> String {
    "Relevant".to_string()
}

fn default_body_limit() -> usize {
    240
}

fn default_highlight_separator() -> String {
    " | ".to_string()
}

/// Formats retrieved data into [`ContextBullet`]s.
#[derive(Debug, Clone, Default)]
pub struct ContextFormatter {
    config: FormatterConfig,
}

impl ContextFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Formats vector store records as `"<name> — <description>"` bullets.
    pub fn format_internal(&self, records: &[RetrievedRecord]) -> Vec<ContextBullet> {
        records
            .iter()
            .map(|record| self.format_record(record))
            .filter(|bullet| !bullet.is_empty())
            .collect()
    }

    /// Formats web snippets, preferring highlights over a truncated body.
    pub fn format_external(&self, snippets: &[WebSnippet]) -> Vec<ContextBullet> {
        snippets
            .iter()
            .map(|snippet| self.format_snippet(snippet))
            .filter(|bullet| !bullet.is_empty())
            .collect()
    }

    fn format_record(&self, record: &RetrievedRecord) -> ContextBullet {
        let name = first_present(record, &self.config.aliases.name)
            .unwrap_or_else(|| self.config.name_placeholder.clone());
        let description = first_present(record, &self.config.aliases.description)
            .unwrap_or_else(|| self.config.description_placeholder.clone());
        ContextBullet(sanitize(&format!("{name} — {description}")))
    }

    fn format_snippet(&self, snippet: &WebSnippet) -> ContextBullet {
        let excerpt = self.excerpt(snippet);
        if excerpt.is_empty() {
            return ContextBullet(String::new());
        }

        let mut line = match non_blank(snippet.title.as_deref()) {
            Some(title) => format!("{} — {excerpt}", sanitize(title)),
            None => excerpt,
        };
        if let Some(url) = non_blank(snippet.url.as_deref()) {
            line.push_str(&format!(" ({})", sanitize(url)));
        }
        ContextBullet(line)
    }

    /// The body portion of a snippet bullet: joined highlights, else the truncated body.
    pub fn excerpt(&self, snippet: &WebSnippet) -> String {
        let highlights: Vec<String> = snippet
            .highlights
            .iter()
            .map(|h| sanitize(h))
            .filter(|h| !h.is_empty())
            .collect();
        if !highlights.is_empty() {
            return highlights.join(&self.config.highlight_separator);
        }

        match non_blank(snippet.body.as_deref()) {
            Some(body) => flatten(&truncate_chars(body, self.config.body_limit)),
            None => String::new(),
        }
    }
}

/// Joins bullets into one block, one `- ` item per bullet, separated by a blank line.
pub fn join_bullets(bullets: &[ContextBullet]) -> String {
    bullets
        .iter()
        .map(|b| format!("- {b}"))
        .collect::<Vec<_>>()
        .join(BULLET_SEPARATOR)
}

fn first_present(record: &RetrievedRecord, keys: &[String]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.fields.get(key))
        .find_map(|value| value.display_text())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Collapses all whitespace runs (newlines included) to single spaces and drops braces.
fn sanitize(text: &str) -> String {
    text.replace(['{', '}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replaces each line break, tab or brace with one space, keeping the character count.
fn flatten(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() || c == '{' || c == '}' { ' ' } else { c })
        .collect()
}

/// Keeps at most `limit` characters. Never splits a multibyte character.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
