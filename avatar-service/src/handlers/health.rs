use crate::dtos::HealthResponse;
use crate::startup::AppState;
use axum::{extract::State, Json};

/// Liveness plus a snapshot of what was initialised at startup.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Local::now().to_rfc3339(),
        genai_initialized: state.converter.is_initialized(),
        reference_images_loaded: state.converter.references().len(),
        api_key_configured: state.api_key_configured,
    })
}
