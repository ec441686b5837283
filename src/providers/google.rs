use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{TranslationBackend, check_status, http_client};
use crate::errors::ProviderError;
use crate::language_utils::Direction;

/// Client for the free Google Translate web endpoint (`client=gtx`)
#[derive(Debug)]
pub struct GoogleTranslate {
    /// Base URL, e.g. `https://translate.googleapis.com`
    endpoint: String,
    client: Client,
}

impl GoogleTranslate {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: http_client(timeout_secs),
        }
    }

    /// Google expects a regional code for Chinese
    fn language_code(code: &str) -> &str {
        match code {
            "zh" => "zh-CN",
            other => other,
        }
    }

    /// Concatenate the translated segments of a `translate_a/single` response.
    ///
    /// The payload is a nested array whose first element lists
    /// `[translated, original, ...]` segments.
    pub fn parse_response(value: &Value) -> Option<String> {
        let segments = value.get(0)?.as_array()?;
        let text: String = segments
            .iter()
            .filter_map(|segment| segment.get(0).and_then(Value::as_str))
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslate {
    fn name(&self) -> &str {
        "google"
    }

    async fn translate(&self, text: &str, direction: Direction) -> Result<String, ProviderError> {
        let url = format!("{}/translate_a/single", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", Self::language_code(direction.source_code())),
                ("tl", Self::language_code(direction.target_code())),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Self::parse_response(&body)
            .ok_or_else(|| ProviderError::ParseError("no translated segments in response".to_string()))
    }
}
