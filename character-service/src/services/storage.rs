use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// A generated image written to the images directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub filename: String,
    /// Absolute path on local disk.
    pub filepath: PathBuf,
    /// Public URL served from `/images/<filename>`.
    pub url: String,
}

/// Flat directory of generated images, served back at `/images`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl ImageStore {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        let base_path = fs::canonicalize(&base_path).await?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/images/{}", self.public_base_url, filename)
    }

    /// Write `bytes` under a fresh `<prefix>_<epoch-ms>_<token>.<ext>` name.
    pub async fn save(
        &self,
        prefix: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<StoredImage, AppError> {
        let filename = unique_filename(prefix, extension_for(mime_type));
        let filepath = self.base_path.join(&filename);

        fs::write(&filepath, bytes).await?;

        tracing::debug!(
            filename = %filename,
            size = bytes.len(),
            "Stored generated image"
        );

        Ok(StoredImage {
            url: self.url_for(&filename),
            filename,
            filepath,
        })
    }
}

/// Millisecond timestamp plus a random token, so names stay unique when two
/// requests land in the same clock tick.
pub fn unique_filename(prefix: &str, extension: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        &token[..12],
        extension
    )
}

/// Reduce an expression label to `[a-z0-9_-]` for use inside a file name.
pub fn sanitize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let capped: String = out.trim_start_matches('_').chars().take(48).collect();
    let trimmed = capped.trim_end_matches('_');
    if trimmed.is_empty() {
        "custom".to_string()
    } else {
        trimmed.to_string()
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
