use crate::{
    errors::PromptError,
    providers::{
        http::{build_client, send_with_retry, HttpSettings, RetryPolicy},
        web::WebSearch,
    },
    types::WebSnippet,
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "Exa";

/// The public Exa search endpoint.
pub const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";

/// Search-mode settings sent with every Exa query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExaSearchOptions {
    /// "neural", "keyword" or "auto".
    #[serde(default = "default_search_type")]
    pub search_type: String,
    #[serde(default = "default_use_autoprompt")]
    pub use_autoprompt: bool,
    /// Upper bound on the page text returned per result.
    #[serde(default = "default_max_characters")]
    pub max_characters: u32,
    #[serde(default = "default_highlight_sentences")]
    pub highlight_sentences: u32,
}

impl Default for ExaSearchOptions {
    fn default() -> Self {
        Self {
            search_type: default_search_type(),
            use_autoprompt: default_use_autoprompt(),
            max_characters: default_max_characters(),
            highlight_sentences: default_highlight_sentences(),
        }
    }
}

fn default_search_type() -> String {
    "neural".to_string()
}

fn default_use_autoprompt() -> bool {
    true
}

fn default_max_characters() -> u32 {
    1000
}

fn default_highlight_sentences() -> u32 {
    3
}

// --- Exa request and response structures ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: u32,
    #[serde(rename = "type")]
    search_type: &'a str,
    use_autoprompt: bool,
    contents: Contents,
}

#[derive(Serialize, Debug)]
struct Contents {
    text: TextContents,
    highlights: HighlightContents,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TextContents {
    max_characters: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HighlightContents {
    num_sentences: u32,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    highlights: Option<Vec<Highlight>>,
}

/// Highlights arrive as plain strings, or as `{ "text": ... }` objects from older SDKs.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Highlight {
    Text(String),
    Object { text: String },
}

impl From<Highlight> for String {
    fn from(highlight: Highlight) -> Self {
        match highlight {
            Highlight::Text(text) | Highlight::Object { text } => text,
        }
    }
}

/// A client for the Exa web search API.
#[derive(Clone, Debug)]
pub struct ExaProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: String,
    options: ExaSearchOptions,
    retry: RetryPolicy,
}

impl ExaProvider {
    pub fn new(
        api_url: String,
        api_key: String,
        options: ExaSearchOptions,
        settings: HttpSettings,
    ) -> Result<Self, PromptError> {
        Ok(Self {
            client: build_client(&settings)?,
            api_url,
            api_key,
            options,
            retry: settings.retry,
        })
    }
}

#[async_trait]
impl WebSearch for ExaProvider {
    async fn search(&self, query: &str, num_results: u32) -> Result<Vec<WebSnippet>, PromptError> {
        let request_body = SearchRequest {
            query,
            num_results,
            search_type: &self.options.search_type,
            use_autoprompt: self.options.use_autoprompt,
            contents: Contents {
                text: TextContents {
                    max_characters: self.options.max_characters,
                },
                highlights: HighlightContents {
                    num_sentences: self.options.highlight_sentences,
                },
            },
        };
        debug!(payload = ?request_body, "--> Sending request to Exa search API");

        let response = send_with_retry(SERVICE, &self.retry, || {
            self.client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .json(&request_body)
        })
        .await?;

        let body: SearchResponse =
            response
                .json()
                .await
                .map_err(|source| PromptError::Deserialization {
                    service: SERVICE,
                    source,
                })?;

        Ok(body
            .results
            .into_iter()
            .map(|r| WebSnippet {
                title: r.title,
                url: r.url,
                highlights: r
                    .highlights
                    .unwrap_or_default()
                    .into_iter()
                    .map(String::from)
                    .collect(),
                body: r.text,
            })
            .collect())
    }
}
