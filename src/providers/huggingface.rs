use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{TranslationBackend, check_status, http_client};
use crate::errors::ProviderError;
use crate::language_utils::Direction;

/// Client for the HuggingFace hosted inference API
#[derive(Debug)]
pub struct HuggingFace {
    endpoint: String,
    /// Model id, may contain `{source}` and `{target}` placeholders
    model_template: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TranslationItem {
    translation_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Items(Vec<TranslationItem>),
    Error { error: String },
}

impl HuggingFace {
    pub fn new(
        endpoint: impl Into<String>,
        model_template: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model_template: model_template.into(),
            api_key: api_key.into(),
            client: http_client(timeout_secs),
        }
    }

    /// Concrete model id for a direction
    pub fn model_for(&self, direction: Direction) -> String {
        self.model_template
            .replace("{source}", direction.source_code())
            .replace("{target}", direction.target_code())
    }
}

#[async_trait]
impl TranslationBackend for HuggingFace {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn translate(&self, text: &str, direction: Direction) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}", self.endpoint, self.model_for(direction));
        let mut request = self.client.post(&url).json(&json!({ "inputs": text }));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = check_status(request.send().await?).await?;
        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        match body {
            InferenceResponse::Items(items) => items
                .into_iter()
                .next()
                .map(|item| item.translation_text)
                .ok_or_else(|| ProviderError::ParseError("empty inference result".to_string())),
            // model still loading and similar soft errors arrive with 200 on some deployments
            InferenceResponse::Error { error } => Err(ProviderError::ApiError {
                status_code: 200,
                message: error,
            }),
        }
    }
}
