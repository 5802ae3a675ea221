//! Request and response bodies of the HTTP API.

use crate::services::{ExpressionImage, StoredImage};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateCharacterRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Prompt is required"))]
    pub prompt: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateExpressionsRequest {
    /// Raw base64 or a `data:image/...;base64,` URL.
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Base image is required"))]
    pub base_image: String,

    #[serde(default)]
    #[validate(
        length(min = 1, message = "At least one expression is required"),
        custom(function = "no_blank_labels", message = "Expressions must not be blank")
    )]
    pub expressions: Vec<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn no_blank_labels(labels: &[String]) -> Result<(), ValidationError> {
    if labels.iter().any(|label| label.trim().is_empty()) {
        return Err(ValidationError::new("blank_label"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCharacterResponse {
    pub success: bool,
    pub image_url: String,
    pub filepath: String,
}

impl From<StoredImage> for GenerateCharacterResponse {
    fn from(image: StoredImage) -> Self {
        Self {
            success: true,
            image_url: image.url,
            filepath: image.filepath.display().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionResult {
    pub expression: String,
    pub image_url: String,
    pub filepath: String,
}

impl From<ExpressionImage> for ExpressionResult {
    fn from(result: ExpressionImage) -> Self {
        Self {
            expression: result.expression,
            image_url: result.image.url,
            filepath: result.image.filepath.display().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateExpressionsResponse {
    pub success: bool,
    pub expressions: Vec<ExpressionResult>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}
