//! Language-model backends for Reagent.
//!
//! [`ChatModel`] turns any [`CompletionBackend`] into the
//! `Runnable<ModelInput, String>` the agent loop consumes.
//! [`OpenAiCompletionBackend`] is the HTTP backend for OpenAI-compatible
//! completion servers.

pub mod chat_model;
pub mod openai_compat;

pub use chat_model::{ChatModel, CompletionBackend, GenerationParams, TokenStream};
pub use openai_compat::OpenAiCompletionBackend;

use std::time::Duration;

use reagent_config::ModelConfig;
use reagent_core::error::ModelError;

/// Build a model unit from the `[model]` config section.
pub fn from_config(config: &ModelConfig) -> Result<ChatModel, ModelError> {
    let backend = OpenAiCompletionBackend::with_timeout(
        config.model.clone(),
        config.base_url.clone(),
        config.api_key.clone(),
        Duration::from_secs(config.timeout_secs),
    )?;

    let model = ChatModel::new(backend).with_params(GenerationParams {
        model: config.model.clone(),
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: config.max_tokens,
        stop: config.stop.clone(),
    });

    Ok(match &config.system_prompt {
        Some(system_prompt) => model.with_system_prompt(system_prompt.clone()),
        None => model,
    })
}
