//! Generative image provider abstractions and implementations.
//!
//! The converter talks to a `dyn ImageProvider`, so the Gemini backend can be
//! swapped for the mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One element of the multimodal request, sent in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    InlineImage { mime_type: String, data: Bytes },
    Text(String),
}

/// Image data embedded in a response.
#[derive(Debug, Clone, PartialEq)]
pub enum InlinePayload {
    /// Raw bytes, used as-is.
    Binary(Bytes),
    /// Base64 text, decoded before use.
    Base64(String),
}

/// One element of the model's answer, in the order the model produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    InlineImage {
        mime_type: String,
        payload: InlinePayload,
    },
    Text(String),
}

/// Provider-neutral view of the first candidate of a response.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub parts: Vec<ResponsePart>,
    pub finish_reason: Option<String>,
}

/// Trait for multimodal image generation backends (e.g., Gemini).
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Send one request and wait for the complete answer.
    async fn generate(&self, parts: &[RequestPart]) -> Result<ProviderResponse, ProviderError>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}
