//! Writes turn output to disk.

use crate::error::PersistError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Saves text under a root directory.
///
/// Existing files are overwritten; there is no partial-write protection.
#[derive(Debug, Clone)]
pub struct ResponsePersister {
    root: PathBuf,
}

impl ResponsePersister {
    /// Creates a persister rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the full path `relative` is written to.
    ///
    /// An absolute `relative` replaces the root.
    #[must_use]
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes `content` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or the file cannot
    /// be written.
    pub fn save(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf, PersistError> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistError::CreateDirectory {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        fs::write(&path, content).map_err(|e| PersistError::Write {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), bytes = content.len(), "saved output");
        Ok(path)
    }
}
