//! Mock provider implementation for testing.

use super::{GeneratedImage, ImageParams, ImageProvider, InlineImage, ProviderError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Bytes returned by the default text-to-image outcome.
pub const MOCK_CHARACTER_BYTES: &[u8] = b"mock-character-png";

/// A call received by [`MockImageProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Generate { prompt: String, params: ImageParams },
    Edit { prompt: String, image: InlineImage },
}

/// Scriptable image provider that records every call.
///
/// Text-to-image requests return [`MOCK_CHARACTER_BYTES`] unless overridden.
/// Edits return `mock-edit:<prompt>` unless the prompt contains a needle
/// registered with [`MockImageProvider::fail_edit_when`].
pub struct MockImageProvider {
    enabled: bool,
    generate_result: Result<Vec<GeneratedImage>, ProviderError>,
    edit_failures: Vec<(String, ProviderError)>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockImageProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            generate_result: Ok(vec![GeneratedImage {
                bytes: MOCK_CHARACTER_BYTES.to_vec(),
                mime_type: "image/png".to_string(),
            }]),
            edit_failures: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_generate_result(
        mut self,
        result: Result<Vec<GeneratedImage>, ProviderError>,
    ) -> Self {
        self.generate_result = result;
        self
    }

    pub fn fail_edit_when(mut self, needle: impl Into<String>, error: ProviderError) -> Self {
        self.edit_failures.push((needle.into(), error));
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check_enabled(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock image provider not enabled".to_string(),
            ))
        }
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_images(
        &self,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        self.record(MockCall::Generate {
            prompt: prompt.to_string(),
            params: params.clone(),
        });
        self.check_enabled()?;

        match &self.generate_result {
            Ok(images) if images.is_empty() => Err(ProviderError::NoImage),
            other => other.clone(),
        }
    }

    async fn edit_image(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<GeneratedImage, ProviderError> {
        self.record(MockCall::Edit {
            prompt: prompt.to_string(),
            image: image.clone(),
        });
        self.check_enabled()?;

        if let Some((_, error)) = self
            .edit_failures
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
        {
            return Err(error.clone());
        }

        Ok(GeneratedImage {
            bytes: format!("mock-edit:{}", prompt).into_bytes(),
            mime_type: image.mime_type.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.check_enabled()
    }
}
