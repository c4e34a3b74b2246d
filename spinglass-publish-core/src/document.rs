//! Source documents read from the local store.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read document `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

/// A styled HTML article. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path-like identifier; also drives phase classification.
    pub path: String,
    pub content: String,
    pub modified: DateTime<Utc>,
}

impl Document {
    pub fn new(path: impl Into<String>, content: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            modified,
        }
    }

    /// Read a document and its modification time from disk.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path).map_err(|e| {
            error!(path = %path.display(), error = ?e, "Failed to read document");
            DocumentError::Io(path.to_path_buf(), e)
        })?;
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|e| DocumentError::Io(path.to_path_buf(), e))?;

        debug!(path = %path.display(), bytes = content.len(), "Loaded document");
        Ok(Self {
            path: path.to_string_lossy().into_owned(),
            content,
            modified,
        })
    }
}
