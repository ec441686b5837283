/*!
 * Translation backend clients.
 *
 * This module contains client implementations for the external services the
 * resolver falls back to when the dictionary cannot finish a translation:
 * - Google: the free `translate_a/single` endpoint
 * - LibreTranslate: any public or self-hosted instance
 * - HuggingFace: the hosted inference API with an opus-mt model
 * - Ollama: a local LLM server
 * - Mock: scripted behaviour for tests
 */

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{BackendConfig, BackendKind};
use crate::errors::ProviderError;
use crate::language_utils::Direction;

/// Common trait for all translation backends
///
/// Implementations translate a single piece of text for a direction. They do
/// not decide whether the text needs translation; that is the resolver's job.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Short identifier used in logs and resolution reports
    fn name(&self) -> &str;

    /// Translate `text` from the direction's source language to its target language
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The raw translated text or an error
    async fn translate(&self, text: &str, direction: Direction) -> Result<String, ProviderError>;
}

pub mod google;
pub mod huggingface;
pub mod libretranslate;
pub mod mock;
pub mod ollama;

/// Build the backend described by one config entry
pub fn build_backend(config: &BackendConfig) -> Arc<dyn TranslationBackend> {
    match config.backend_type {
        BackendKind::Google => Arc::new(google::GoogleTranslate::new(
            config.endpoint.clone(),
            config.timeout_secs,
        )),
        BackendKind::LibreTranslate => Arc::new(libretranslate::LibreTranslate::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.timeout_secs,
        )),
        BackendKind::HuggingFace => Arc::new(huggingface::HuggingFace::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.api_key.clone(),
            config.timeout_secs,
        )),
        BackendKind::Ollama => Arc::new(ollama::Ollama::new_with_config(
            config.endpoint.clone(),
            config.model.clone(),
            config.timeout_secs,
            config.max_retries,
        )),
    }
}

/// Build the enabled backends in configured order
pub fn build_backends(configs: &[BackendConfig]) -> Vec<Arc<dyn TranslationBackend>> {
    configs
        .iter()
        .filter(|c| c.enabled)
        .map(|c| {
            debug!("Enabling backend {} at {}", c.backend_type.display_name(), c.endpoint);
            build_backend(c)
        })
        .collect()
}

/// HTTP client with the backend's request timeout
pub(crate) fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_default()
}

/// Turn a non-success response into a `ProviderError`
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    let message: String = message.chars().take(300).collect();
    match status.as_u16() {
        401 | 403 => Err(ProviderError::AuthenticationError(message)),
        code => Err(ProviderError::ApiError {
            status_code: code,
            message,
        }),
    }
}
