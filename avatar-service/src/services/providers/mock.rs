//! Mock provider implementation for testing.

use super::{ImageProvider, ProviderError, ProviderResponse, RequestPart, ResponsePart};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum MockBehavior {
    Respond(Vec<ResponsePart>),
    Fail(String),
}

/// Mock image provider that replays a canned answer and records every call.
pub struct MockImageProvider {
    behavior: MockBehavior,
    finish_reason: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<RequestPart>>>,
}

impl MockImageProvider {
    /// Answers every request with `parts`.
    pub fn returning(parts: Vec<ResponsePart>) -> Self {
        Self::with_behavior(MockBehavior::Respond(parts))
    }

    /// Fails every request with an API error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(message.into()))
    }

    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            finish_reason: "STOP".to_string(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Finish reason reported with canned answers (default `STOP`).
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = reason.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Vec<RequestPart>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    async fn generate(&self, parts: &[RequestPart]) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(parts.to_vec());

        match &self.behavior {
            MockBehavior::Respond(parts) => Ok(ProviderResponse {
                parts: parts.clone(),
                finish_reason: Some(self.finish_reason.clone()),
            }),
            MockBehavior::Fail(message) => Err(ProviderError::ApiError(message.clone())),
        }
    }

    fn model(&self) -> &str {
        "mock-image-model"
    }
}
