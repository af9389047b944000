//! Style conversion: one multimodal request per photo.
//!
//! The request carries the reference images in order, then the user photo,
//! then the instruction text. Only the first inline image of the answer is
//! used; an answer without one is "no result", not an error.

use super::image_codec::ensure_png;
use super::metrics;
use super::providers::{
    ImageProvider, InlinePayload, ProviderError, ProviderResponse, RequestPart, ResponsePart,
};
use super::references::ReferenceSet;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Instruction sent after the images on every request.
pub const STYLE_PROMPT: &str = include_str!("../../assets/notion_style_prompt.txt");

const PNG_MIME: &str = "image/png";
const LOGGED_TEXT_CHARS: usize = 200;
const LOGGED_PAYLOAD_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("GenAI client not initialized")]
    ClientNotInitialized,

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] ProviderError),
}

/// A generated avatar as PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub png: Bytes,
}

/// Owns the provider handle and the reference set; built once at startup.
pub struct StyleConverter {
    provider: Option<Arc<dyn ImageProvider>>,
    references: ReferenceSet,
    prompt: String,
}

impl StyleConverter {
    /// `provider` is `None` when the client could not be constructed; every
    /// conversion then fails with [`ConvertError::ClientNotInitialized`].
    pub fn new(provider: Option<Arc<dyn ImageProvider>>, references: ReferenceSet) -> Self {
        Self {
            provider,
            references,
            prompt: STYLE_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.provider.is_some()
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    /// References in order, then the user image, then the prompt.
    pub fn build_request(&self, user_png: Bytes) -> Vec<RequestPart> {
        let mut parts: Vec<RequestPart> = self
            .references
            .iter()
            .map(|reference| RequestPart::InlineImage {
                mime_type: PNG_MIME.to_string(),
                data: reference.png.clone(),
            })
            .collect();

        parts.push(RequestPart::InlineImage {
            mime_type: PNG_MIME.to_string(),
            data: user_png,
        });
        parts.push(RequestPart::Text(self.prompt.clone()));
        parts
    }

    /// Converts a normalised (RGB PNG) user image.
    ///
    /// Returns `Ok(None)` when the model answered without a usable image.
    pub async fn convert(&self, user_png: Bytes) -> Result<Option<GeneratedImage>, ConvertError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(ConvertError::ClientNotInitialized)?;

        let parts = self.build_request(user_png);
        tracing::info!(
            model = %provider.model(),
            items = parts.len(),
            references = self.references.len(),
            "Generating content"
        );

        let start = Instant::now();
        let result = provider.generate(&parts).await;
        metrics::record_upstream_latency(start.elapsed().as_secs_f64(), result.is_ok());

        let response = result.map_err(|e| {
            tracing::error!(error = %e, "Upstream generation request failed");
            ConvertError::Upstream(e)
        })?;

        let Some(raw) = extract_first_image(&response.parts) else {
            tracing::error!(
                finish_reason = %finish_reason(&response),
                "No image parts found in response"
            );
            return Ok(None);
        };

        match tokio::task::spawn_blocking(move || ensure_png(raw)).await {
            Ok(Ok(png)) => {
                tracing::info!(bytes = png.len(), "Successfully generated avatar");
                Ok(Some(GeneratedImage {
                    png: Bytes::from(png),
                }))
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Error processing image data");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(error = %e, "Image processing task failed");
                Ok(None)
            }
        }
    }
}

/// Applies the extraction policy to an ordered list of response parts.
///
/// The first inline image wins: binary payloads are used as-is, text
/// payloads are base64-decoded. Later images are ignored even when the first
/// one fails to decode. Text parts are logged, never returned.
pub fn extract_first_image(parts: &[ResponsePart]) -> Option<Vec<u8>> {
    let mut payloads = parts.iter().filter_map(|part| match part {
        ResponsePart::InlineImage { payload, .. } => Some(payload),
        ResponsePart::Text(_) => None,
    });

    let Some(first) = payloads.next() else {
        for part in parts {
            if let ResponsePart::Text(text) = part {
                tracing::info!(
                    text = %truncate_chars(text, LOGGED_TEXT_CHARS),
                    "Model returned text instead of an image"
                );
            }
        }
        return None;
    };

    tracing::info!(image_parts = 1 + payloads.count(), "Found image parts");

    match first {
        InlinePayload::Binary(bytes) => Some(bytes.to_vec()),
        InlinePayload::Base64(text) => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            match BASE64.decode(compact.as_bytes()) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        prefix = %truncate_chars(text, LOGGED_PAYLOAD_CHARS),
                        "Error decoding base64 image payload"
                    );
                    None
                }
            }
        }
    }
}

/// Finish reason for logging; `IMAGE_SAFETY` and similar reasons explain a missing image.
fn finish_reason(response: &ProviderResponse) -> &str {
    response.finish_reason.as_deref().unwrap_or("UNSPECIFIED")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
