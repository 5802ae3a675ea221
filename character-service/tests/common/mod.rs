#![allow(dead_code)]

use character_service::config::{
    CharacterConfig, GenerationConfig, GoogleConfig, ModelConfig, StorageConfig,
    DEFAULT_GEMINI_API_BASE,
};
use character_service::services::providers::mock::MockImageProvider;
use character_service::startup::Application;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use uuid::Uuid;

/// 1x1 transparent PNG.
pub const TINY_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub provider: Arc<MockImageProvider>,
    pub images_dir: String,
}

pub fn test_config(images_dir: &str) -> CharacterConfig {
    CharacterConfig {
        common: CoreConfig {
            port: 0, // Random port for testing
            ..CoreConfig::default()
        },
        google: GoogleConfig {
            api_key: "test-api-key".to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: 5,
        },
        models: ModelConfig {
            character_model: "imagen-4.0-generate-001".to_string(),
            expression_model: "gemini-2.5-flash-image".to_string(),
        },
        generation: GenerationConfig {
            aspect_ratio: "1:1".to_string(),
            number_of_images: 1,
        },
        storage: StorageConfig {
            images_dir: images_dir.to_string(),
            public_base_url: None,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockImageProvider::new(true)).await
    }

    pub async fn spawn_with(provider: MockImageProvider) -> Self {
        let images_dir = format!("target/test-images-{}", Uuid::new_v4());
        let provider = Arc::new(provider);

        let app = Application::build_with_provider(test_config(&images_dir), provider.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            provider,
            images_dir,
        }
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn image_file_count(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.images_dir).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let mut count = 0;
        while let Ok(Some(_)) = entries.next_entry().await {
            count += 1;
        }
        count
    }

    /// Remove the images directory created for this app.
    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.images_dir).await;
    }
}
