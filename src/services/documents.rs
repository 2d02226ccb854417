use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::Settings;
use crate::services::storage::{StorageError, StorageService, UPLOAD_KEY_PREFIX};

#[derive(Debug, Error)]
pub(crate) enum DocumentError {
    #[error("document reference is not allowed: {0}")]
    InvalidReference(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("document exceeds {0} bytes")]
    TooLarge(u64),
    #[error("document contains no text")]
    Empty,
    #[error("document storage error: {0}")]
    Storage(String),
}

/// Resolves a document reference to its raw text.
#[async_trait]
pub(crate) trait DocumentSource: Send + Sync {
    async fn fetch_text(&self, document_ref: &str) -> Result<String, DocumentError>;

    /// Removing a document that is already gone succeeds.
    async fn remove(&self, document_ref: &str) -> Result<(), DocumentError>;
}

pub(crate) struct StoredDocuments {
    storage: Option<StorageService>,
    local_dir: PathBuf,
    max_bytes: u64,
}

impl StoredDocuments {
    pub(crate) fn new(storage: Option<StorageService>, settings: &Settings) -> Self {
        Self {
            storage,
            local_dir: PathBuf::from(&settings.ingestion().local_document_dir),
            max_bytes: settings.ingestion().max_document_size_mb.saturating_mul(1024 * 1024),
        }
    }

    async fn read_local(&self, document_ref: &str) -> Result<Vec<u8>, DocumentError> {
        let path = resolve_local_path(&self.local_dir, document_ref)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| DocumentError::NotFound(document_ref.to_string()))?;
        if metadata.len() > self.max_bytes {
            return Err(DocumentError::TooLarge(self.max_bytes));
        }
        tokio::fs::read(&path).await.map_err(|err| DocumentError::Storage(err.to_string()))
    }
}

#[async_trait]
impl DocumentSource for StoredDocuments {
    async fn fetch_text(&self, document_ref: &str) -> Result<String, DocumentError> {
        let bytes = match &self.storage {
            Some(storage) if document_ref.starts_with(UPLOAD_KEY_PREFIX) => {
                storage.download(document_ref, self.max_bytes).await.map_err(|err| match err {
                    StorageError::NotFound(key) => DocumentError::NotFound(key),
                    StorageError::TooLarge { limit, .. } => DocumentError::TooLarge(limit),
                    other => DocumentError::Storage(other.to_string()),
                })?
            }
            _ => self.read_local(document_ref).await?,
        };

        decode_text(&bytes)
    }

    async fn remove(&self, document_ref: &str) -> Result<(), DocumentError> {
        match &self.storage {
            Some(storage) if document_ref.starts_with(UPLOAD_KEY_PREFIX) => storage
                .delete(document_ref)
                .await
                .map_err(|err| DocumentError::Storage(err.to_string())),
            _ => {
                let path = resolve_local_path(&self.local_dir, document_ref)?;
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => Ok(()),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(err) => Err(DocumentError::Storage(err.to_string())),
                }
            }
        }
    }
}

pub(crate) fn decode_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(text.to_string())
}

/// Only relative paths that stay inside `root` are accepted.
pub(crate) fn resolve_local_path(
    root: &Path,
    document_ref: &str,
) -> Result<PathBuf, DocumentError> {
    let relative = Path::new(document_ref);
    let safe = !document_ref.trim().is_empty()
        && relative.components().all(|component| matches!(component, Component::Normal(_)));
    if !safe {
        return Err(DocumentError::InvalidReference(document_ref.to_string()));
    }
    Ok(root.join(relative))
}
