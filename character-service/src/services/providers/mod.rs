//! Image provider abstractions and implementations.
//!
//! This module provides a trait-based abstraction for image generation
//! backends, allowing the HTTP layer to run against Gemini or a mock.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// MIME type assumed for base images sent without a data-URL header.
pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/png";

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("No image generated")]
    NoImage,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered(_) => "content_filtered",
            ProviderError::NoImage => "no_image",
            ProviderError::InvalidResponse(_) => "invalid_response",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

/// An image returned by a provider, already base64-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A base64 image forwarded to the provider as inline data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL.
    ///
    /// The data-URL header is stripped so both forms forward the same payload.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();

        let (mime_type, data) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',')?;
                let mime = header
                    .split(';')
                    .next()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_IMAGE_MIME_TYPE);
                (mime.to_string(), payload.trim())
            }
            None => (DEFAULT_IMAGE_MIME_TYPE.to_string(), input),
        };

        if data.is_empty() {
            return None;
        }

        Some(Self {
            mime_type,
            data: data.to_string(),
        })
    }
}

/// Generation parameters for text-to-image requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    /// Aspect ratio such as `1:1` or `9:16`.
    pub aspect_ratio: String,

    /// Number of images to request.
    pub number_of_images: u32,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            aspect_ratio: "1:1".to_string(),
            number_of_images: 1,
        }
    }
}

/// Trait for image generation providers (e.g., Gemini, Imagen).
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name used in metrics and logs.
    fn name(&self) -> &str;

    /// Generate images from a text prompt.
    ///
    /// An empty vector is never returned; the absence of images is reported
    /// as [`ProviderError::NoImage`] or [`ProviderError::ContentFiltered`].
    async fn generate_images(
        &self,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<Vec<GeneratedImage>, ProviderError>;

    /// Produce a modified version of `image` following `prompt`.
    async fn edit_image(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<GeneratedImage, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
