//! Download completion detection.
//!
//! The browser saves artifacts with names of its own choosing, so completion
//! is inferred from the filesystem: a new file with the right extension, no
//! in-progress suffix, and a size that holds still across a re-check.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::EngineResult;

/// Suffixes the browser appends while a download is still being written.
pub const IN_PROGRESS_SUFFIXES: [&str; 3] = [".crdownload", ".tmp", ".part"];

/// Outcome of waiting for an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    Completed {
        artifact_path: PathBuf,
        size_bytes: u64,
    },
    /// Diagnostics for the timeout log line: how many matching files exist,
    /// how many are new since the snapshot, how many are still in progress.
    TimedOut {
        total: usize,
        new: usize,
        incomplete: usize,
    },
}

pub struct DownloadWatcher {
    poll_interval: Duration,
    stability_window: Duration,
}

impl Default for DownloadWatcher {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            stability_window: Duration::from_secs(1),
        }
    }
}

impl DownloadWatcher {
    pub fn new(poll_interval: Duration, stability_window: Duration) -> Self {
        Self {
            poll_interval,
            stability_window,
        }
    }

    /// Snapshot the completed artifacts currently in `dir`, for diffing
    /// after the trigger fires.
    pub fn snapshot(dir: &Path, extension: &str) -> std::io::Result<HashSet<PathBuf>> {
        let mut present = HashSet::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if is_complete_artifact(&path, extension) {
                present.insert(path);
            }
        }
        Ok(present)
    }

    /// Wait for a new artifact to finish landing in `dir`.
    ///
    /// Polls until `timeout`; a candidate only counts once its size is
    /// non-zero and unchanged across the stability window. When several new
    /// files exist the most recently modified one wins.
    pub async fn await_artifact(
        &self,
        dir: &Path,
        extension: &str,
        before: &HashSet<PathBuf>,
        timeout: Duration,
    ) -> EngineResult<CompletionResult> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(candidate) = self.newest_new_artifact(dir, extension, before)? {
                let first = std::fs::metadata(&candidate)?.len();
                sleep(self.stability_window).await;
                // candidate may have been renamed away between stats
                match std::fs::metadata(&candidate) {
                    Ok(meta) if meta.len() == first && first > 0 => {
                        debug!(
                            artifact = %candidate.display(),
                            size_bytes = first,
                            "Download complete"
                        );
                        return Ok(CompletionResult::Completed {
                            artifact_path: candidate,
                            size_bytes: first,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Candidate disappeared during stability check: {}", e),
                }
            }

            if tokio::time::Instant::now() >= deadline {
                let (total, new, incomplete) = self.diagnostics(dir, extension, before)?;
                warn!(
                    total, new, incomplete,
                    "Timed out waiting for download to complete"
                );
                return Ok(CompletionResult::TimedOut {
                    total,
                    new,
                    incomplete,
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    fn newest_new_artifact(
        &self,
        dir: &Path,
        extension: &str,
        before: &HashSet<PathBuf>,
    ) -> std::io::Result<Option<PathBuf>> {
        let mut newest: Option<(PathBuf, SystemTime)> = None;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_complete_artifact(&path, extension) || before.contains(&path) {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            match &newest {
                Some((_, best)) if *best >= modified => {}
                _ => newest = Some((path, modified)),
            }
        }
        Ok(newest.map(|(path, _)| path))
    }

    fn diagnostics(
        &self,
        dir: &Path,
        extension: &str,
        before: &HashSet<PathBuf>,
    ) -> std::io::Result<(usize, usize, usize)> {
        let mut total = 0;
        let mut new = 0;
        let mut incomplete = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if is_in_progress(&path) {
                incomplete += 1;
            } else if is_complete_artifact(&path, extension) {
                total += 1;
                if !before.contains(&path) {
                    new += 1;
                }
            }
        }
        Ok((total, new, incomplete))
    }
}

fn is_in_progress(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    IN_PROGRESS_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn is_complete_artifact(path: &Path, extension: &str) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(extension) && !is_in_progress(path)
}
