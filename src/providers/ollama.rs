use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{TranslationBackend, check_status};
use crate::errors::ProviderError;
use crate::language_utils::Direction;

/// Ollama client for the local `/api/generate` endpoint
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model name, e.g. `llama3.2:3b`
    model: String,
    /// HTTP client for making requests
    client: Client,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: None,
            stream: Some(false),
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options = Some(GenerationOptions {
            temperature: Some(temperature),
        });
        self
    }
}

/// Korean label used inside the prompt
fn prompt_label(code: &str) -> &'static str {
    match code {
        "ko" => "한국어",
        _ => "중국어",
    }
}

/// Build the translation prompt for a direction
pub fn build_prompt(text: &str, direction: Direction) -> String {
    format!(
        "다음 {} 텍스트를 {}로 번역해주세요. 번역 결과만 출력하세요:\n\n{}",
        prompt_label(direction.source_code()),
        prompt_label(direction.target_code()),
        text
    )
}

/// Parse a generate body, accepting a single JSON object or JSONL stream chunks.
///
/// Some Ollama builds ignore `stream: false`; in that case every line carries
/// a fragment in `response` and the pieces are concatenated.
pub fn parse_generation_body(body: &str) -> Result<GenerationResponse, ProviderError> {
    if let Ok(parsed) = serde_json::from_str::<GenerationResponse>(body) {
        return Ok(parsed);
    }

    let mut model = String::new();
    let mut response = String::new();
    let mut done = false;
    let mut seen = false;
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        seen = true;
        if let Some(part) = value.get("response").and_then(|v| v.as_str()) {
            response.push_str(part);
        }
        if let Some(m) = value.get("model").and_then(|v| v.as_str()) {
            model = m.to_string();
        }
        done |= value.get("done").and_then(|v| v.as_bool()).unwrap_or(false);
    }

    if !seen {
        let preview: String = body.chars().take(500).collect();
        error!("Failed to parse Ollama API response. Raw response (first 500 chars): {}", preview);
        return Err(ProviderError::ParseError("Ollama response contains invalid JSON".to_string()));
    }
    Ok(GenerationResponse { model, response, done })
}

impl Ollama {
    /// Create a new Ollama client with configuration
    ///
    /// Ollama speaks HTTP/1.1 only.
    pub fn new_with_config(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            max_retries,
            backoff_base_ms: 500,
        }
    }

    /// Generate text from the Ollama API with retry logic
    ///
    /// Server and network errors are retried with exponential backoff; client
    /// errors return immediately.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match self.client.post(&url).json(request).send().await {
                Ok(response) if response.status().is_server_error() => {
                    let status = response.status().as_u16();
                    let message = response.text().await.unwrap_or_default();
                    debug!("Ollama API error ({}) - attempt {}/{}", status, attempt + 1, self.max_retries + 1);
                    last_error = Some(ProviderError::ApiError {
                        status_code: status,
                        message,
                    });
                }
                Ok(response) => {
                    let response = check_status(response).await?;
                    let body = response.text().await?;
                    return parse_generation_body(&body);
                }
                Err(e) => {
                    debug!("Ollama API network error: {} - attempt {}/{}", e, attempt + 1, self.max_retries + 1);
                    last_error = Some(ProviderError::from(e));
                }
            }

            attempt += 1;
            if attempt <= self.max_retries {
                let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1).min(6));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::RequestFailed(format!(
                "Ollama API request failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }
}

#[async_trait]
impl TranslationBackend for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn translate(&self, text: &str, direction: Direction) -> Result<String, ProviderError> {
        let request = GenerationRequest::new(&self.model, build_prompt(text, direction)).temperature(0.1);
        let generated = self.generate(&request).await?;
        Ok(generated.response.trim().to_string())
    }
}
