//! Core configuration type for collection runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::selectors::PanelSelectors;

use super::builder::CollectConfigBuilder;

/// Configuration for one collection run.
///
/// Construct via [`CollectConfig::builder`]. Defaults: headless, `.docx`
/// artifacts, rotation after 5 downloads, one retry pass, 60 s artifact
/// timeout, 4 workers, 1.0–3.0 s politeness delay.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub(crate) download_root: PathBuf,
    pub(crate) resource_url: String,
    pub(crate) headless: bool,
    pub(crate) artifact_extension: String,
    pub(crate) rotate_after_downloads: u32,
    pub(crate) max_retries: u8,
    pub(crate) artifact_timeout: Duration,
    pub(crate) find_timeout: Duration,
    pub(crate) panel_timeout: Duration,
    pub(crate) worker_count: usize,
    pub(crate) politeness_delay_ms: (u64, u64),
    pub(crate) shutdown_deadline: Duration,
    pub(crate) selectors: PanelSelectors,
}

impl CollectConfig {
    #[must_use]
    pub fn builder() -> CollectConfigBuilder<()> {
        CollectConfigBuilder::default()
    }

    /// Root under which per-municipality download directories are created.
    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    /// Extension (with leading dot) of the artifacts the site produces.
    pub fn artifact_extension(&self) -> &str {
        &self.artifact_extension
    }

    /// Successful downloads between session rotations; 0 disables rotation.
    pub fn rotate_after_downloads(&self) -> u32 {
        self.rotate_after_downloads
    }

    /// Replay passes granted to a failed task beyond its initial attempt.
    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    pub fn artifact_timeout(&self) -> Duration {
        self.artifact_timeout
    }

    pub fn find_timeout(&self) -> Duration {
        self.find_timeout
    }

    /// How long to search for the panel open button.
    pub fn panel_timeout(&self) -> Duration {
        self.panel_timeout
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Inclusive bounds, in milliseconds, of the randomized delay between
    /// downloads.
    pub fn politeness_delay_ms(&self) -> (u64, u64) {
        self.politeness_delay_ms
    }

    pub fn shutdown_deadline(&self) -> Duration {
        self.shutdown_deadline
    }

    pub fn selectors(&self) -> &PanelSelectors {
        &self.selectors
    }
}
