//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. Every provider client is created once here and
//! shared, through the chat pipeline, by all request handlers.

use crate::config::AppConfig;
use botfather::{
    context::ContextFormatter,
    pipeline::{ChatPipeline, PipelineSettings},
    providers::{
        ai::HttpEmbeddingProvider,
        factory::create_ai_provider,
        http::HttpSettings,
        vector::PineconeProvider,
        web::ExaProvider,
    },
};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// The shared application state, accessible from all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The application's configuration, loaded from `config.yml`.
    pub config: Arc<AppConfig>,
    /// The retrieval-and-completion pipeline behind the chat endpoints.
    pub pipeline: Arc<ChatPipeline>,
}

/// Builds the shared application state from the configuration.
///
/// A component whose section is absent, or that lacks the key its hosted API
/// needs, is left out of the pipeline: the server still starts, and chat
/// requests report the missing component. An unknown completion provider
/// type is a startup error.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let timeouts = config.timeouts.stage_timeouts();
    let http = |timeout: Duration| HttpSettings {
        timeout,
        retry: config.retry,
    };

    let mut builder = ChatPipeline::builder()
        .formatter(ContextFormatter::new(config.context.clone()))
        .persona(config.persona.clone());

    if config.completion.is_usable() {
        builder = builder.ai_provider(create_ai_provider(
            &config.completion.provider_config(),
            http(timeouts.completion),
        )?);
    } else {
        warn!(
            "No API key for the '{}' completion provider; chat requests will be rejected.",
            config.completion.provider
        );
    }

    if config.embedding.is_usable() {
        builder = builder.embedder(Arc::new(HttpEmbeddingProvider::new(
            config.embedding.api_url.clone(),
            config.embedding.model_name.clone(),
            non_empty(config.embedding.api_key.clone()),
            http(timeouts.embedding),
        )?));
    } else {
        warn!(
            "No API key for embeddings at '{}'; chat requests will be rejected.",
            config.embedding.api_url
        );
    }

    let mut top_k = PipelineSettings::default().top_k;
    match &config.vector_store {
        Some(store) if store.is_usable() => {
            info!("Configuring Pinecone vector store at '{}'.", store.index_host);
            top_k = store.top_k;
            builder = builder.vector_store(Arc::new(PineconeProvider::new(
                &store.index_host,
                store.api_key.clone(),
                store.namespace.clone(),
                http(timeouts.retrieval),
            )?));
        }
        _ => warn!("No usable vector_store configuration; chat requests will be rejected."),
    }

    let mut web_results = PipelineSettings::default().web_results;
    match &config.web_search {
        Some(search) if search.is_usable() => {
            info!("Configuring Exa web search at '{}'.", search.api_url);
            web_results = search.num_results;
            builder = builder.web_search(Arc::new(ExaProvider::new(
                search.api_url.clone(),
                search.api_key.clone(),
                search.search_options(),
                http(timeouts.search),
            )?));
        }
        _ => warn!("No usable web_search configuration; chat requests will be rejected."),
    }

    let pipeline = builder
        .settings(PipelineSettings {
            top_k,
            web_results,
            generation: config.completion.generation_options(),
            timeouts,
        })
        .build();

    Ok(AppState {
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
