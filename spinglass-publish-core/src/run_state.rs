//! Incremental run tracking.
//!
//! A single text file holds the run cutoff as epoch seconds (a float). A
//! document is a candidate for the next run when its modification time is
//! strictly later than the cutoff. The file is not locked; concurrent
//! invocations against the same store may race.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into while scanning the store.
const IGNORED_DIRS: &[&str] = &[".git", "target"];
const DOCUMENT_EXTENSION: &str = "html";
const PHASE_DIR_PREFIX: &str = "phase";

#[derive(Debug, Error)]
pub enum RunStateError {
    #[error("failed to access run state `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("run state `{path}` does not hold a timestamp: {content:?}")]
    Parse { path: PathBuf, content: String },
}

/// When the cutoff is persisted relative to publishing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Persist before publishing. A document that fails is not retried.
    #[default]
    AtMostOnce,
    /// Persist after the batch, and only if every content publish succeeded.
    AtLeastOnce,
}

/// Scans a document store and maintains its run cutoff.
#[derive(Debug, Clone)]
pub struct RunStateTracker {
    root: PathBuf,
    state_file: PathBuf,
}

impl RunStateTracker {
    pub fn new(root: impl Into<PathBuf>, state_file: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state_file: state_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Read the persisted cutoff. A missing file means 0; an unreadable or
    /// garbled one is logged and also treated as 0.
    pub fn load_cutoff(&self) -> f64 {
        match self.read_cutoff() {
            Ok(Some(cutoff)) => {
                debug!(cutoff, "[RUN-STATE] Loaded cutoff");
                cutoff
            }
            Ok(None) => {
                debug!(path = %self.state_file.display(), "[RUN-STATE] No state file, cutoff is 0");
                0.0
            }
            Err(e) => {
                warn!(error = %e, "[RUN-STATE] Ignoring unusable state file, cutoff is 0");
                0.0
            }
        }
    }

    fn read_cutoff(&self) -> Result<Option<f64>, RunStateError> {
        let content = match fs::read_to_string(&self.state_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RunStateError::Io(self.state_file.clone(), e)),
        };
        match content.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(RunStateError::Parse {
                path: self.state_file.clone(),
                content,
            }),
        }
    }

    /// Record the current wall-clock time as the new cutoff.
    pub fn advance_cutoff(&self) -> Result<f64, RunStateError> {
        self.advance_cutoff_to(now_seconds())
    }

    /// Record `now` as the cutoff, never moving it backwards.
    pub fn advance_cutoff_to(&self, now: f64) -> Result<f64, RunStateError> {
        let previous = self.load_cutoff();
        let cutoff = now.max(previous);
        fs::write(&self.state_file, cutoff.to_string())
            .map_err(|e| RunStateError::Io(self.state_file.clone(), e))?;
        info!(cutoff, previous, path = %self.state_file.display(), "[RUN-STATE] Advanced cutoff");
        Ok(cutoff)
    }

    /// Every document in the store, sorted by path.
    pub fn all_documents(&self) -> Vec<PathBuf> {
        self.scan(None)
    }

    /// Documents modified strictly after `cutoff`, sorted by path.
    pub fn find_candidates(&self, cutoff: f64) -> Vec<PathBuf> {
        let candidates = self.scan(Some(cutoff));
        info!(cutoff, candidates = candidates.len(), "[RUN-STATE] Found candidates");
        candidates
    }

    fn scan(&self, cutoff: Option<f64>) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e))
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "[RUN-STATE] Skipping unreadable store entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && is_store_document(e.path()))
            .filter(|e| match cutoff {
                None => true,
                Some(cutoff) => modified_seconds(e).is_some_and(|m| m > cutoff),
            })
            .map(DirEntry::into_path)
            .collect();
        paths.sort();
        paths
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

/// `*.html` directly inside a directory whose name starts with `phase`.
pub fn is_store_document(path: &Path) -> bool {
    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
    let in_phase_dir = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_lowercase().starts_with(PHASE_DIR_PREFIX));
    is_html && in_phase_dir
}

fn modified_seconds(entry: &DirEntry) -> Option<f64> {
    match entry.metadata().map_err(io::Error::from).and_then(|m| m.modified()) {
        Ok(modified) => Some(epoch_seconds(modified)),
        Err(e) => {
            warn!(path = %entry.path().display(), error = ?e, "[RUN-STATE] No modification time, skipping");
            None
        }
    }
}

/// The current wall-clock time in epoch seconds, the unit cutoffs are stored in.
pub fn now_seconds() -> f64 {
    epoch_seconds(SystemTime::now())
}

fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_documents_need_phase_parent_and_html_extension() {
        assert!(is_store_document(Path::new("phaseα/intro.html")));
        assert!(is_store_document(Path::new("a/PhaseB/x.HTML")));
        assert!(!is_store_document(Path::new("phaseα/notes.md")));
        assert!(!is_store_document(Path::new("drafts/intro.html")));
        assert!(!is_store_document(Path::new("phase1/sub/intro.html")));
    }
}
