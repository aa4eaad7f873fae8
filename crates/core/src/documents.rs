//! The user-maintained document list.
//!
//! Only the fields the refresher reads are modelled; anything else in the
//! JSON file (theme, window state, ...) is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

/// One entry of the `files` array: either a bare path or an object with an
/// `enabled` switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
}

fn default_enabled() -> bool {
    true
}

impl DocumentEntry {
    pub fn path(&self) -> &str {
        match self {
            DocumentEntry::Path(p) => p,
            DocumentEntry::Detailed { path, .. } => path,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            DocumentEntry::Path(_) => true,
            DocumentEntry::Detailed { enabled, .. } => *enabled,
        }
    }
}

/// Parsed document list file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentList {
    #[serde(default)]
    pub files: Vec<DocumentEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule_times: Vec<String>,
    /// Single-time field written by older versions of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_time: Option<String>,
    #[serde(default)]
    pub auto_refresh_enabled: bool,
}

impl DocumentList {
    pub fn from_json(raw: &str, path: &Path) -> CoreResult<Self> {
        serde_json::from_str(raw).map_err(|source| CoreError::DocumentList {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw, path)
    }

    /// Like [`load`](Self::load) but never fails: a missing file yields an
    /// empty list, a corrupt one is logged and also yields an empty list.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(list) => list,
            Err(CoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "document list not found, using empty list");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read document list, using empty list");
                Self::default()
            }
        }
    }

    /// Enabled, non-blank paths in file order.
    pub fn enabled_paths(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|entry| entry.is_enabled())
            .map(|entry| entry.path().trim())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// Saved schedule times, preferring the list field over the legacy one.
    pub fn schedule_times(&self) -> Vec<String> {
        if !self.schedule_times.is_empty() {
            return self.schedule_times.clone();
        }
        self.schedule_time.iter().cloned().collect()
    }
}

/// Supplies the ordered list of documents to refresh.
pub trait DocumentListProvider: Send + Sync {
    fn enabled_document_paths(&self) -> Vec<PathBuf>;
}

impl DocumentListProvider for Vec<PathBuf> {
    fn enabled_document_paths(&self) -> Vec<PathBuf> {
        self.clone()
    }
}

/// Re-reads a JSON document list on every request so edits made while the
/// daemon is running are picked up by the next batch.
#[derive(Debug, Clone)]
pub struct JsonDocumentList {
    path: PathBuf,
}

impl JsonDocumentList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> DocumentList {
        DocumentList::load_or_default(&self.path)
    }
}

impl DocumentListProvider for JsonDocumentList {
    fn enabled_document_paths(&self) -> Vec<PathBuf> {
        self.load().enabled_paths()
    }
}
