//! Gemini image provider implementation.
//!
//! Calls the `generateContent` REST method with inline image parts and asks for
//! both text and image modalities back.

use super::{
    ImageProvider, InlinePayload, ProviderError, ProviderResponse, RequestPart, ResponsePart,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    /// `None` disables the client-side timeout.
    pub timeout: Option<Duration>,
}

/// Gemini image provider.
pub struct GeminiImageProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiImageProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the configured model and the given method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            method
        )
    }

    fn build_request(parts: &[RequestPart]) -> GenerateContentRequest {
        let parts = parts
            .iter()
            .map(|part| match part {
                RequestPart::InlineImage { mime_type, data } => OutgoingPart::InlineData {
                    inline_data: OutgoingInlineData {
                        mime_type: mime_type.clone(),
                        data: BASE64.encode(data),
                    },
                },
                RequestPart::Text(text) => OutgoingPart::Text { text: text.clone() },
            })
            .collect();

        GenerateContentRequest {
            contents: vec![OutgoingContent {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            },
        }
    }

    fn into_provider_response(api_response: GenerateContentResponse) -> ProviderResponse {
        let Some(candidate) = api_response.candidates.into_iter().next() else {
            if let Some(reason) = api_response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
            {
                tracing::warn!(block_reason = %reason, "Gemini blocked the prompt");
            }
            return ProviderResponse::default();
        };

        let parts = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| match part {
                IncomingPart::InlineData { inline_data } => Some(ResponsePart::InlineImage {
                    mime_type: inline_data.mime_type,
                    payload: InlinePayload::Base64(inline_data.data),
                }),
                IncomingPart::Text { text } => Some(ResponsePart::Text(text)),
                IncomingPart::Other(value) => {
                    tracing::debug!(part = %value, "Ignoring unrecognised response part");
                    None
                }
            })
            .collect();

        ProviderResponse {
            parts,
            finish_reason: candidate.finish_reason,
        }
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    async fn generate(&self, parts: &[RequestPart]) -> Result<ProviderResponse, ProviderError> {
        let request = Self::build_request(parts);
        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            part_count = parts.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.without_url().to_string()))?;

        Ok(Self::into_provider_response(api_response))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<OutgoingContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct OutgoingContent {
    role: String,
    parts: Vec<OutgoingPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OutgoingPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: OutgoingInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<IncomingContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingContent {
    #[serde(default)]
    parts: Vec<IncomingPart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IncomingPart {
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: IncomingInlineData,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingInlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn provider() -> GeminiImageProvider {
        GeminiImageProvider::new(GeminiConfig {
            api_key: Secret::new("test-key".to_string()),
            model: "gemini-2.5-flash-image-preview".to_string(),
            api_base: format!("{}/", GEMINI_API_BASE),
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    #[test]
    fn rejects_empty_api_key() {
        let result = GeminiImageProvider::new(GeminiConfig {
            api_key: Secret::new(String::new()),
            model: "m".to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            timeout: None,
        });
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn api_url_has_no_key_and_no_double_slash() {
        assert_eq!(
            provider().api_url("generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image-preview:generateContent"
        );
    }

    #[test]
    fn request_keeps_part_order_and_encodes_images() {
        let request = GeminiImageProvider::build_request(&[
            RequestPart::InlineImage {
                mime_type: "image/png".to_string(),
                data: Bytes::from_static(b"ref"),
            },
            RequestPart::InlineImage {
                mime_type: "image/png".to_string(),
                data: Bytes::from_static(b"user"),
            },
            RequestPart::Text("make it notion".to_string()),
        ]);

        let value = serde_json::to_value(&request).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], BASE64.encode(b"ref"));
        assert_eq!(parts[1]["inlineData"]["data"], BASE64.encode(b"user"));
        assert_eq!(parts[2]["text"], "make it notion");
        assert_eq!(
            value["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn response_parts_are_mapped_in_order() {
        let api_response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "Here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": "AAEC" } },
                        { "thoughtSignature": "opaque" }
                    ]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let response = GeminiImageProvider::into_provider_response(api_response);
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(
            response.parts,
            vec![
                ResponsePart::Text("Here you go".to_string()),
                ResponsePart::InlineImage {
                    mime_type: "image/png".to_string(),
                    payload: InlinePayload::Base64("AAEC".to_string()),
                },
            ]
        );
    }

    #[test]
    fn blocked_prompt_yields_no_parts() {
        let api_response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();

        let response = GeminiImageProvider::into_provider_response(api_response);
        assert!(response.parts.is_empty());
    }
}
