//! Gemini image provider implementation.
//!
//! Character portraits are produced either by an Imagen model through
//! `:predict` or by a Gemini image model through `:generateContent`, picked
//! from the configured model id. Expression edits always go through
//! `:generateContent` with the base image attached as inline data.

use super::{GeneratedImage, ImageParams, ImageProvider, InlineImage, ProviderError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Finish reasons that mean the provider refused to produce content.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "RECITATION",
];

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub character_model: String,
    pub expression_model: String,
    pub timeout: Duration,
}

/// Which REST method a model is driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMethod {
    /// `models/{model}:predict`, used by Imagen.
    Predict,
    /// `models/{model}:generateContent`, used by multimodal Gemini models.
    GenerateContent,
}

impl GenerationMethod {
    pub fn for_model(model: &str) -> Self {
        if model.trim_start_matches("models/").starts_with("imagen") {
            GenerationMethod::Predict
        } else {
            GenerationMethod::GenerateContent
        }
    }
}

/// Gemini image provider.
pub struct GeminiImageProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiImageProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            model.trim_start_matches("models/"),
            method
        )
    }

    fn ensure_configured(&self) -> Result<(), ProviderError> {
        if self.config.api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "GOOGLE_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }

    async fn post_json<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status,
                api_error_message(&error_text)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    async fn predict(
        &self,
        model: &str,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters {
                sample_count: params.number_of_images.max(1),
                aspect_ratio: params.aspect_ratio.clone(),
            },
        };

        let response: PredictResponse = self
            .post_json(&self.api_url(model, "predict"), &request)
            .await?;

        images_from_predictions(response)
    }

    async fn generate_content(
        &self,
        model: &str,
        parts: Vec<Part>,
        aspect_ratio: Option<&str>,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                image_config: aspect_ratio.map(|ratio| ImageConfig {
                    aspect_ratio: ratio.to_string(),
                }),
            }),
        };

        let response: GenerateContentResponse = self
            .post_json(&self.api_url(model, "generateContent"), &request)
            .await?;

        images_from_content(response)
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_images(
        &self,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        self.ensure_configured()?;

        let model = &self.config.character_model;
        let method = GenerationMethod::for_model(model);

        tracing::debug!(
            model = %model,
            method = ?method,
            prompt_len = prompt.len(),
            aspect_ratio = %params.aspect_ratio,
            "Sending image generation request"
        );

        match method {
            GenerationMethod::Predict => self.predict(model, prompt, params).await,
            GenerationMethod::GenerateContent => {
                let parts = vec![Part::text(prompt)];
                self.generate_content(model, parts, Some(&params.aspect_ratio))
                    .await
            }
        }
    }

    async fn edit_image(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<GeneratedImage, ProviderError> {
        self.ensure_configured()?;

        let model = &self.config.expression_model;

        tracing::debug!(
            model = %model,
            prompt_len = prompt.len(),
            image_len = image.data.len(),
            mime_type = %image.mime_type,
            "Sending image edit request"
        );

        let parts = vec![Part::text(prompt), Part::inline(image)];
        // Only the first inline image is used.
        self.generate_content(model, parts, None)
            .await?
            .into_iter()
            .next()
            .ok_or(ProviderError::NoImage)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.ensure_configured()?;

        let url = format!(
            "{}/models/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.character_model.trim_start_matches("models/")
        );

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

/// Pull `error.message` out of a Google error envelope, or return the body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.to_string())
}

fn decode_image(data: &str, mime_type: Option<String>) -> Result<GeneratedImage, ProviderError> {
    let bytes = BASE64
        .decode(data.trim().as_bytes())
        .map_err(|e| ProviderError::InvalidResponse(format!("image base64 decode failed: {}", e)))?;

    Ok(GeneratedImage {
        bytes,
        mime_type: mime_type.unwrap_or_else(|| super::DEFAULT_IMAGE_MIME_TYPE.to_string()),
    })
}

fn images_from_predictions(response: PredictResponse) -> Result<Vec<GeneratedImage>, ProviderError> {
    let mut images = Vec::new();
    let mut filtered_reason = None;

    for prediction in response.predictions {
        match prediction.bytes_base64_encoded {
            Some(data) if !data.is_empty() => {
                images.push(decode_image(&data, prediction.mime_type)?);
            }
            _ => {
                if let Some(reason) = prediction.rai_filtered_reason {
                    filtered_reason.get_or_insert(reason);
                }
            }
        }
    }

    if !images.is_empty() {
        return Ok(images);
    }

    match filtered_reason {
        Some(reason) => Err(ProviderError::ContentFiltered(reason)),
        None => Err(ProviderError::NoImage),
    }
}

fn images_from_content(
    response: GenerateContentResponse,
) -> Result<Vec<GeneratedImage>, ProviderError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::ContentFiltered(reason));
    }

    let mut images = Vec::new();
    let mut blocked = None;

    for candidate in response.candidates {
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        for part in parts {
            if let Some(inline) = part.inline_data {
                images.push(decode_image(&inline.data, Some(inline.mime_type))?);
            }
        }

        if let Some(reason) = candidate.finish_reason {
            if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) {
                let detail = match candidate.finish_message {
                    Some(message) => format!("{}: {}", reason, message),
                    None => reason,
                };
                blocked.get_or_insert(detail);
            }
        }
    }

    if !images.is_empty() {
        return Ok(images);
    }

    match blocked {
        Some(reason) => Err(ProviderError::ContentFiltered(reason)),
        None => Err(ProviderError::NoImage),
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn inline(image: &InlineImage) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
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
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    finish_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}
