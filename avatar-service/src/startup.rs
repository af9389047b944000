//! Application startup and lifecycle management.

use crate::config::AvatarConfig;
use crate::handlers::{convert_image, health_check, metrics};
use crate::services::metrics::init_metrics;
use crate::services::providers::gemini::{GeminiConfig, GeminiImageProvider};
use crate::services::providers::ImageProvider;
use crate::services::{ImageValidator, OutputStore, ReferenceSet, StyleConverter};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::any::Any;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<StyleConverter>,
    pub store: OutputStore,
    pub validator: ImageValidator,
    pub public_dir: PathBuf,
    pub api_key_configured: bool,
}

/// Build the HTTP router around an already constructed state.
pub fn build_router(state: AppState) -> Router {
    // Leave room above the file limit so oversized uploads reach the validator
    // and get its message rather than a bare 413.
    let body_limit = state.validator.max_bytes().saturating_mul(2);

    Router::new()
        .route_service("/", ServeFile::new(state.public_dir.join("index.html")))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route(
            "/convert",
            post(convert_image).layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest_service("/outputs", ServeDir::new(state.store.base_path()))
        .fallback_service(ServeDir::new(&state.public_dir))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::InternalError(anyhow::anyhow!("request handler panicked: {}", detail)).into_response()
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Fails when the API key is missing or the model client cannot be built;
    /// the service never starts without a working client.
    pub async fn build(config: AvatarConfig) -> Result<Self, AppError> {
        let api_key = config.google.api_key.clone().ok_or_else(|| {
            tracing::error!("GEMINI_API_KEY not found in environment variables");
            AppError::ConfigError(anyhow::anyhow!("GEMINI_API_KEY is required but not set"))
        })?;

        let timeout = match config.models.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let provider = GeminiImageProvider::new(GeminiConfig {
            api_key,
            model: config.models.image_model.clone(),
            api_base: config.models.api_base.clone(),
            timeout,
        })
        .map_err(|e| {
            tracing::error!("Failed to initialize GenAI client: {}", e);
            AppError::ConfigError(anyhow::Error::new(e))
        })?;
        tracing::info!(model = %config.models.image_model, "GenAI client initialized");

        let provider: Arc<dyn ImageProvider> = Arc::new(provider);
        Self::build_with_provider(config, Some(provider)).await
    }

    /// Build the application around an explicit provider.
    pub async fn build_with_provider(
        config: AvatarConfig,
        provider: Option<Arc<dyn ImageProvider>>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let references =
            ReferenceSet::load(&config.assets.public_dir, &config.assets.reference_files).await;

        let store = OutputStore::new(&config.assets.output_dir)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create output directory: {}", e);
                AppError::ConfigError(anyhow::Error::new(e))
            })?;

        let state = AppState {
            converter: Arc::new(StyleConverter::new(provider, references)),
            store,
            validator: ImageValidator::new(config.limits.max_upload_bytes),
            public_dir: config.assets.public_dir.clone(),
            api_key_configured: config.api_key_configured(),
        };

        // Port 0 binds a random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            api_key_configured = state.api_key_configured,
            reference_images_loaded = state.converter.references().len(),
            "Avatar service ready"
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
