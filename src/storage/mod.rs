//! Object-store collaborator.
//!
//! Collected artifacts are mirrored to durable storage after a run. The
//! trait keeps the engine independent of the backend; `LocalMirrorStore`
//! copies into a directory tree and is what the tests use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    /// List object paths under `prefix`. Non-recursive listing returns only
    /// direct children.
    async fn list_files(&self, prefix: &str, recursive: bool) -> Result<Vec<String>>;

    /// List the direct child "directories" under `prefix`.
    async fn list_directories(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Filesystem-backed store: remote paths map to paths under a root
/// directory.
pub struct LocalMirrorStore {
    root: PathBuf,
}

impl LocalMirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, remote_path: &str) -> PathBuf {
        self.root.join(remote_path.trim_start_matches('/'))
    }

    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[async_trait]
impl ObjectStore for LocalMirrorStore {
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let target = self.resolve(remote_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::copy(local_path, &target)
            .await
            .with_context(|| {
                format!(
                    "Failed to upload {} to {}",
                    local_path.display(),
                    target.display()
                )
            })?;
        Ok(())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let source = self.resolve(remote_path);
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::copy(&source, local_path)
            .await
            .with_context(|| format!("Failed to download {}", source.display()))?;
        Ok(())
    }

    async fn list_files(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        let base = self.resolve(prefix);
        if !base.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        let mut stack = vec![base];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to read {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    if recursive {
                        stack.push(path);
                    }
                } else {
                    files.push(self.relative_name(&path));
                }
            }
        }
        files.sort();
        Ok(files)
    }

    async fn list_directories(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve(prefix);
        if !base.exists() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        let mut entries = tokio::fs::read_dir(&base)
            .await
            .with_context(|| format!("Failed to read {}", base.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(self.relative_name(&path));
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

const UPLOAD_ATTEMPTS: u32 = 3;
const UPLOAD_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Upload with retry for transient contention.
///
/// Only "resource busy" style errors are retried (the mirror backend throws
/// them when another writer holds the object); anything else fails
/// immediately.
pub async fn upload_with_retry(
    store: &dyn ObjectStore,
    local_path: &Path,
    remote_path: &str,
) -> Result<()> {
    let mut attempt = 1;
    loop {
        match store.upload(local_path, remote_path).await {
            Ok(()) => {
                info!(remote = remote_path, "Uploaded artifact");
                return Ok(());
            }
            Err(e) if attempt < UPLOAD_ATTEMPTS && is_transient_busy(&e) => {
                warn!(
                    remote = remote_path,
                    attempt, "Transient upload error, retrying: {}", e
                );
                sleep(UPLOAD_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient_busy(err: &anyhow::Error) -> bool {
    let msg = format!("{err:#}").to_lowercase();
    msg.contains("resource busy")
        || msg.contains("resource temporarily unavailable")
        || msg.contains("would block")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyStore {
        failures_before_success: u32,
        calls: AtomicU32,
        inner: LocalMirrorStore,
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                anyhow::bail!("Resource busy: object is locked");
            }
            self.inner.upload(local_path, remote_path).await
        }

        async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
            self.inner.download(remote_path, local_path).await
        }

        async fn list_files(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
            self.inner.list_files(prefix, recursive).await
        }

        async fn list_directories(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list_directories(prefix).await
        }
    }

    #[tokio::test]
    async fn mirror_round_trip_and_listing() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        let store = LocalMirrorStore::new(remote.path());

        let src = local.path().join("a.docx");
        std::fs::write(&src, b"content").unwrap();
        store.upload(&src, "fl/gainesville/a.docx").await.unwrap();

        let files = store.list_files("fl/gainesville", false).await.unwrap();
        assert_eq!(files, vec!["fl/gainesville/a.docx".to_string()]);

        let dirs = store.list_directories("fl").await.unwrap();
        assert_eq!(dirs, vec!["fl/gainesville".to_string()]);

        let dest = local.path().join("back.docx");
        store.download("fl/gainesville/a.docx", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"content");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_busy_errors_are_retried() {
        let local = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        let src = local.path().join("a.docx");
        std::fs::write(&src, b"content").unwrap();

        let store = FlakyStore {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
            inner: LocalMirrorStore::new(remote.path()),
        };
        upload_with_retry(&store, &src, "x/a.docx").await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    struct FailingStore {
        message: &'static str,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn upload(&self, _: &Path, _: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("{}", self.message);
        }
        async fn download(&self, _: &str, _: &Path) -> Result<()> {
            unimplemented!()
        }
        async fn list_files(&self, _: &str, _: bool) -> Result<Vec<String>> {
            unimplemented!()
        }
        async fn list_directories(&self, _: &str) -> Result<Vec<String>> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_three_attempts() {
        let local = tempfile::tempdir().unwrap();
        let src = local.path().join("a.docx");
        std::fs::write(&src, b"content").unwrap();

        let store = FailingStore {
            message: "Resource busy: object is locked",
            calls: AtomicU32::new(0),
        };
        assert!(upload_with_retry(&store, &src, "x/a.docx").await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let local = tempfile::tempdir().unwrap();
        let src = local.path().join("a.docx");
        std::fs::write(&src, b"content").unwrap();

        let store = FailingStore {
            message: "permission denied",
            calls: AtomicU32::new(0),
        };
        assert!(upload_with_retry(&store, &src, "x/a.docx").await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
