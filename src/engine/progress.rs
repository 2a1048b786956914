//! Resume support and run accounting.
//!
//! There is no sidecar index file: an artifact existing at its deterministic
//! target path *is* the record of completion. Re-runs therefore resume
//! correctly even after a crash, and deleting an artifact re-queues it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::task::DownloadTask;

pub struct ProgressIndex {
    download_dir: PathBuf,
}

impl ProgressIndex {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    /// A task is done iff its target artifact exists.
    pub fn is_done(&self, task: &DownloadTask) -> bool {
        self.download_dir.join(&task.target_name).exists()
    }

    /// Split tasks into (pending, already-done), preserving order.
    pub fn partition(&self, tasks: Vec<DownloadTask>) -> (Vec<DownloadTask>, Vec<DownloadTask>) {
        let (done, pending): (Vec<_>, Vec<_>) =
            tasks.into_iter().partition(|task| self.is_done(task));
        for task in &done {
            debug!(section = %task.label(), "Artifact already present, skipping");
        }
        (pending, done)
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

/// Final accounting for one collection run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub section: String,
    pub error: String,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_by_artifact_presence() {
        let dir = tempfile::tempdir().unwrap();
        let done = DownloadTask::new(vec!["Done".to_string()], None, "1", ".docx");
        let pending = DownloadTask::new(vec!["Pending".to_string()], None, "2", ".docx");
        std::fs::write(dir.path().join(&done.target_name), b"artifact").unwrap();

        let index = ProgressIndex::new(dir.path());
        assert!(index.is_done(&done));
        assert!(!index.is_done(&pending));

        let (still_pending, skipped) = index.partition(vec![done, pending]);
        assert_eq!(still_pending.len(), 1);
        assert_eq!(still_pending[0].node_id, "2");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].node_id, "1");
    }
}
