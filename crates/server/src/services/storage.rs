// On-disk storage for uploaded item payloads.
//
// Stored paths are relative to the media root (e.g. `images/<uuid>-photo.png`)
// so they double as the public `/media/...` URL suffix.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Clone, Debug)]
pub struct MediaStorage {
    base_path: PathBuf,
}

impl MediaStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create media directory: {e}")))?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, stored: &str) -> Result<PathBuf> {
        let relative = Path::new(stored);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Internal(format!("Refusing media path {stored:?}")));
        }
        Ok(self.base_path.join(relative))
    }

    /// Writes an upload below `dir` and returns its stored path.
    pub async fn save(&self, dir: &str, file_name: &str, data: &[u8]) -> Result<String> {
        let stored = format!("{dir}/{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = self.resolve(&stored)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create directories: {e}")))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write upload: {e}")))?;

        tracing::debug!(path = %stored, bytes = data.len(), "stored upload");
        Ok(stored)
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn delete(&self, stored: &str) -> Result<()> {
        let path = self.resolve(stored)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("Failed to delete {stored}: {e}"))),
        }
    }

    /// Best-effort removal used after a database change has committed.
    pub async fn discard(&self, stored: &str) {
        if let Err(e) = self.delete(stored).await {
            tracing::warn!("Could not remove stored file: {e}");
        }
    }
}

/// Keeps the final path segment and replaces anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
