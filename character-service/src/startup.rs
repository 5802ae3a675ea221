//! Application startup and lifecycle management.
//!
//! Builds the provider, image store and router, binds the listener and
//! serves until a shutdown signal arrives.

use crate::config::CharacterConfig;
use crate::handlers;
use crate::services::providers::gemini::{GeminiConfig, GeminiImageProvider};
use crate::services::providers::{ImageParams, ImageProvider};
use crate::services::{init_metrics, CharacterGenerator, ImageStore};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Base images arrive inline as base64, well past axum's 2 MB default.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<CharacterGenerator>,
}

/// Build the HTTP router for `state`.
pub fn router(state: AppState) -> Router {
    let images = ServeDir::new(state.generator.store().base_path());

    Router::new()
        .route("/", get(handlers::service_status))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/generate-character", post(handlers::generate_character))
        .route("/generate-expressions", post(handlers::generate_expressions))
        .nest_service("/images", images)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the Gemini provider described by `config`.
    pub async fn build(config: CharacterConfig) -> Result<Self, AppError> {
        let gemini_config = GeminiConfig {
            api_key: config.google.api_key.clone(),
            api_base: config.google.api_base.clone(),
            character_model: config.models.character_model.clone(),
            expression_model: config.models.expression_model.clone(),
            timeout: Duration::from_secs(config.google.timeout_secs),
        };

        if gemini_config.api_key.trim().is_empty() {
            tracing::warn!("GOOGLE_API_KEY is not set; generation requests will fail");
        }

        let provider: Arc<dyn ImageProvider> = Arc::new(GeminiImageProvider::new(gemini_config)?);

        tracing::info!(
            character_model = %config.models.character_model,
            expression_model = %config.models.expression_model,
            "Initialized Gemini image provider"
        );

        Self::build_with_provider(config, provider).await
    }

    /// Build the application around an already constructed provider.
    pub async fn build_with_provider(
        config: CharacterConfig,
        provider: Arc<dyn ImageProvider>,
    ) -> Result<Self, AppError> {
        init_metrics();

        // Bind first (port 0 = random port for testing) so the public URL
        // can name the real port.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let store = ImageStore::new(&config.storage.images_dir, config.public_base_url(port))
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize image directory at {}: {}",
                    config.storage.images_dir,
                    e
                );
                e
            })?;

        tracing::info!(
            images_dir = %store.base_path().display(),
            "Serving generated images"
        );

        let params = ImageParams {
            aspect_ratio: config.generation.aspect_ratio.clone(),
            number_of_images: config.generation.number_of_images,
        };
        let generator = Arc::new(CharacterGenerator::new(provider, store, params));

        tracing::info!("Character service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState { generator },
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
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::services::providers::mock::MockImageProvider;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    async fn test_router(images_dir: &str) -> Router {
        let provider = Arc::new(MockImageProvider::new(true));
        let app = Application::build_with_provider(test_config(images_dir), provider)
            .await
            .unwrap();
        router(app.state().clone())
    }

    fn scratch_dir() -> String {
        format!("target/test-router-{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn cors_preflight_is_allowed() {
        let dir = scratch_dir();
        let response = test_router(&dir)
            .await
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/generate-character")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let dir = scratch_dir();
        let body = format!(
            r#"{{"baseImage":"{}","expressions":["happy"]}}"#,
            "A".repeat(MAX_BODY_BYTES + 1)
        );
        let response = test_router(&dir)
            .await
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/generate-expressions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
