use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{TranslationBackend, check_status, http_client};
use crate::errors::ProviderError;
use crate::language_utils::Direction;

/// LibreTranslate client
#[derive(Debug)]
pub struct LibreTranslate {
    /// Full URL of the `/translate` route
    endpoint: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText", default)]
    translated_text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl LibreTranslate {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.trim_end_matches('/').ends_with("/translate") {
            endpoint.trim_end_matches('/').to_string()
        } else {
            format!("{}/translate", endpoint.trim_end_matches('/'))
        };
        Self {
            endpoint,
            api_key: api_key.into(),
            client: http_client(timeout_secs),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TranslationBackend for LibreTranslate {
    fn name(&self) -> &str {
        "libretranslate"
    }

    async fn translate(&self, text: &str, direction: Direction) -> Result<String, ProviderError> {
        let request = TranslateRequest {
            q: text,
            source: direction.source_code(),
            target: direction.target_code(),
            format: "text",
            api_key: (!self.api_key.is_empty()).then_some(self.api_key.as_str()),
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let response = check_status(response).await?;
        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        if let Some(error) = body.error {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: error,
            });
        }
        body.translated_text
            .ok_or_else(|| ProviderError::ParseError("missing translatedText".to_string()))
    }
}
