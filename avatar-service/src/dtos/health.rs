use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339, server local time.
    pub timestamp: String,
    pub genai_initialized: bool,
    pub reference_images_loaded: usize,
    pub api_key_configured: bool,
}
