//! Character and expression generation.
//!
//! Wraps the configured [`ImageProvider`] with prompt construction, input
//! checks and persistence of the returned images.

use super::metrics;
use super::providers::{ImageParams, ImageProvider, InlineImage, ProviderError};
use super::storage::{sanitize_label, ImageStore, StoredImage};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;

/// Appended to every character prompt.
pub const CHARACTER_STYLE_SUFFIX: &str = ". Create a highly realistic human character suitable for narrating horror stories. Photorealistic, detailed face, natural lighting, professional portrait photography.";

pub fn character_prompt(prompt: &str) -> String {
    format!("{}{}", prompt, CHARACTER_STYLE_SUFFIX)
}

pub fn expression_prompt(expression: &str) -> String {
    format!(
        "Take this character and create a {0} expression. Maintain the same person, same appearance, only change the facial expression to be {0}. Photorealistic, highly detailed.",
        expression
    )
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::UpstreamError(err.to_string())
    }
}

/// One successfully rendered expression.
#[derive(Debug, Clone)]
pub struct ExpressionImage {
    pub expression: String,
    pub image: StoredImage,
}

pub struct CharacterGenerator {
    provider: Arc<dyn ImageProvider>,
    store: ImageStore,
    params: ImageParams,
}

impl CharacterGenerator {
    pub fn new(provider: Arc<dyn ImageProvider>, store: ImageStore, params: ImageParams) -> Self {
        Self {
            provider,
            store,
            params,
        }
    }

    pub fn provider(&self) -> &Arc<dyn ImageProvider> {
        &self.provider
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Render a portrait for `prompt` and store the first returned image.
    pub async fn generate_character(&self, prompt: &str) -> Result<StoredImage, AppError> {
        if prompt.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Prompt is required")));
        }

        let full_prompt = character_prompt(prompt);
        let start = Instant::now();
        let result = self
            .provider
            .generate_images(&full_prompt, &self.params)
            .await;
        self.observe("generate_character", start, &result);

        let image = result?
            .into_iter()
            .next()
            .ok_or(ProviderError::NoImage)?;

        let stored = self
            .store
            .save("character", &image.bytes, &image.mime_type)
            .await?;
        metrics::record_image_stored("character");

        tracing::info!(
            filename = %stored.filename,
            size = image.bytes.len(),
            "Character image generated"
        );

        Ok(stored)
    }

    /// Re-render `base_image` once per label, in order.
    ///
    /// A label whose call or write fails is logged and left out of the
    /// result; the rest of the batch still runs.
    pub async fn generate_expressions(
        &self,
        base_image: &str,
        expressions: &[String],
    ) -> Result<Vec<ExpressionImage>, AppError> {
        let image = InlineImage::parse(base_image)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Base image is required")))?;

        if expressions.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "At least one expression is required"
            )));
        }
        if expressions.iter().any(|e| e.trim().is_empty()) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Expressions must not be blank"
            )));
        }

        let mut results = Vec::with_capacity(expressions.len());
        for expression in expressions {
            let expression = expression.trim();
            match self.render_expression(expression, &image).await {
                Ok(rendered) => results.push(rendered),
                Err(e) => {
                    tracing::warn!(
                        expression = %expression,
                        error = %e,
                        "Skipping expression that produced no image"
                    );
                }
            }
        }

        tracing::info!(
            requested = expressions.len(),
            generated = results.len(),
            "Expression batch finished"
        );

        Ok(results)
    }

    async fn render_expression(
        &self,
        expression: &str,
        image: &InlineImage,
    ) -> Result<ExpressionImage, AppError> {
        let prompt = expression_prompt(expression);
        let start = Instant::now();
        let result = self.provider.edit_image(&prompt, image).await;
        self.observe("generate_expression", start, &result);
        let generated = result?;

        let prefix = format!("expression_{}", sanitize_label(expression));
        let stored = self
            .store
            .save(&prefix, &generated.bytes, &generated.mime_type)
            .await?;
        metrics::record_image_stored("expression");

        Ok(ExpressionImage {
            expression: expression.to_string(),
            image: stored,
        })
    }

    fn observe<T>(&self, operation: &str, start: Instant, result: &Result<T, ProviderError>) {
        let provider = self.provider.name();
        metrics::record_provider_latency(provider, operation, start.elapsed().as_secs_f64());
        if let Err(e) = result {
            metrics::record_provider_error(provider, e.kind());
            tracing::debug!(
                provider = provider,
                operation = operation,
                error = %e,
                "Provider call failed"
            );
        }
    }
}
