//! Upload storage: raw images saved as `{timestamp}_{sanitized original name}`.

use crate::error::StorageError;
use std::path::PathBuf;

const FALLBACK_NAME: &str = "upload";
const MAX_NAME_LEN: usize = 128;

/// Reduce a client-supplied file name to something safe to join onto the upload directory.
///
/// Spaces become `_`, directory components are dropped, and anything outside
/// `[A-Za-z0-9._-]` is replaced with `_`. Leading dots are stripped so the
/// result is never hidden, `.` or `..`.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.len() != cleaned.len() {
        cleaned = trimmed.to_string();
    }

    if cleaned.len() > MAX_NAME_LEN {
        // keep the extension when truncating
        let ext = cleaned
            .rfind('.')
            .map(|i| cleaned[i..].to_string())
            .filter(|e| e.len() < 16)
            .unwrap_or_default();
        cleaned.truncate(MAX_NAME_LEN - ext.len());
        cleaned.push_str(&ext);
    }

    if cleaned.trim_matches('_').is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Stored name for an upload received at `timestamp`.
pub fn stored_name(timestamp: i64, original: &str) -> String {
    format!("{timestamp}_{}", sanitize_filename(original))
}

/// A stored name is valid only if it is a single, plain path component.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.')
}

#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the upload directory if needed.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Io {
                path: self.dir.clone(),
                source,
            })
    }

    /// Absolute-or-relative path of a stored name inside the upload directory.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_name(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    /// Writes `bytes` under the generated name and returns `(name, path)`.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(
        &self,
        timestamp: i64,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<(String, PathBuf), StorageError> {
        let name = stored_name(timestamp, original_name);
        let path = self.path_of(&name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(stored = %name, "Saved upload");
        Ok((name, path))
    }

    /// Deletes a stored upload. Already gone counts as success.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Reads a previously stored upload.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_of(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Content type for a stored upload, from its extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}
