//! Chrome profile directory management.
//!
//! Every session gets its own UUID-named profile directory so concurrent
//! sessions never fight over SingletonLock.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// RAII wrapper for a Chrome profile directory.
///
/// Removes the directory on drop unless `into_path()` transfers ownership to
/// another cleanup mechanism (the session that launched Chrome into it).
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    /// Create a unique profile directory under the system temp dir.
    ///
    /// Uses `create_dir` (not `create_dir_all`) so a UUID collision fails
    /// loudly instead of silently sharing a directory.
    pub fn create(prefix: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("{}_{}", prefix, Uuid::new_v4()));
        debug!("Creating browser profile directory: {}", path.display());
        std::fs::create_dir(&path)
            .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;
        Ok(Self {
            path,
            cleanup_on_drop: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume the profile and return the path, disabling auto-cleanup.
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            debug!("Removing browser profile directory: {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(
                    "Failed to clean up profile directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
