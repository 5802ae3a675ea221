use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Outbound provider timeout, matching the Gemini client defaults.
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub generation: GenerationConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// Empty when unset outside production; requests then fail with a
    /// missing-configuration error instead of reaching the provider.
    pub api_key: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model used for character portraits (e.g., imagen-4.0-generate-001).
    pub character_model: String,
    /// Multimodal model used to re-render expressions (e.g., gemini-2.5-flash-image).
    pub expression_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub aspect_ratio: String,
    pub number_of_images: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub images_dir: String,
    /// Prefix for returned image URLs. Derived from the bound port when unset.
    pub public_base_url: Option<String>,
}

impl CharacterConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(CharacterConfig {
            common: common_config,
            google: GoogleConfig {
                api_key: checked_api_key(
                    get_env("GOOGLE_API_KEY", Some(""), is_prod)?,
                    is_prod,
                )?,
                api_base: get_env("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE), is_prod)?,
                timeout_secs: parse_env(
                    "PROVIDER_TIMEOUT_SECS",
                    DEFAULT_PROVIDER_TIMEOUT_SECS,
                    is_prod,
                )?,
            },
            models: ModelConfig {
                character_model: get_env(
                    "CHARACTER_IMAGE_MODEL",
                    Some("imagen-4.0-generate-001"),
                    is_prod,
                )?,
                expression_model: get_env(
                    "EXPRESSION_IMAGE_MODEL",
                    Some("gemini-2.5-flash-image"),
                    is_prod,
                )?,
            },
            generation: GenerationConfig {
                aspect_ratio: get_env("CHARACTER_ASPECT_RATIO", Some("1:1"), is_prod)?,
                number_of_images: parse_env("CHARACTER_IMAGE_COUNT", 1, is_prod)?.max(1),
            },
            storage: StorageConfig {
                images_dir: get_env("IMAGES_DIR", Some("images"), is_prod)?,
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty()),
            },
        })
    }

    /// URL prefix for stored images, falling back to localhost on `port`.
    pub fn public_base_url(&self, port: u16) -> String {
        match &self.storage.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", port),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config(images_dir: &str) -> CharacterConfig {
    CharacterConfig {
        common: core_config::Config {
            port: 0,
            ..core_config::Config::default()
        },
        google: GoogleConfig {
            api_key: String::new(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
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

/// A blank key is tolerated outside production only.
fn checked_api_key(value: String, is_prod: bool) -> Result<String, AppError> {
    if is_prod && value.trim().is_empty() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "GOOGLE_API_KEY must not be empty in production"
        )));
    }
    Ok(value)
}

fn parse_env<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(&default.to_string()), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
