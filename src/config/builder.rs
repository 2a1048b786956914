//! Type-safe builder for `CollectConfig` using the typestate pattern
//!
//! The download root and resource URL are required; the compiler refuses a
//! `build()` call until both have been provided.

use anyhow::{anyhow, Result};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::selectors::PanelSelectors;

use super::types::CollectConfig;

// Type states for the builder
pub struct WithDownloadRoot;
pub struct WithResourceUrl;

pub struct CollectConfigBuilder<State = ()> {
    pub(crate) download_root: Option<PathBuf>,
    pub(crate) resource_url: Option<String>,
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
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for CollectConfigBuilder<()> {
    fn default() -> Self {
        Self {
            download_root: None,
            resource_url: None,
            headless: true,
            artifact_extension: ".docx".to_string(),
            rotate_after_downloads: 5,
            max_retries: 1,
            artifact_timeout: Duration::from_secs(60),
            find_timeout: Duration::from_secs(10),
            panel_timeout: Duration::from_secs(30),
            worker_count: 4,
            politeness_delay_ms: (1_000, 3_000),
            shutdown_deadline: Duration::from_secs(300),
            selectors: PanelSelectors::default(),
            _phantom: PhantomData,
        }
    }
}

impl CollectConfigBuilder<()> {
    pub fn download_root(self, dir: impl Into<PathBuf>) -> CollectConfigBuilder<WithDownloadRoot> {
        CollectConfigBuilder {
            download_root: Some(dir.into()),
            resource_url: self.resource_url,
            headless: self.headless,
            artifact_extension: self.artifact_extension,
            rotate_after_downloads: self.rotate_after_downloads,
            max_retries: self.max_retries,
            artifact_timeout: self.artifact_timeout,
            find_timeout: self.find_timeout,
            panel_timeout: self.panel_timeout,
            worker_count: self.worker_count,
            politeness_delay_ms: self.politeness_delay_ms,
            shutdown_deadline: self.shutdown_deadline,
            selectors: self.selectors,
            _phantom: PhantomData,
        }
    }
}

impl CollectConfigBuilder<WithDownloadRoot> {
    pub fn resource_url(self, url: impl Into<String>) -> CollectConfigBuilder<WithResourceUrl> {
        let url_string = url.into();

        // Normalize URL: add https:// if no scheme is present
        let normalized_url =
            if url_string.starts_with("http://") || url_string.starts_with("https://") {
                url_string
            } else {
                format!("https://{url_string}")
            };

        CollectConfigBuilder {
            download_root: self.download_root,
            resource_url: Some(normalized_url),
            headless: self.headless,
            artifact_extension: self.artifact_extension,
            rotate_after_downloads: self.rotate_after_downloads,
            max_retries: self.max_retries,
            artifact_timeout: self.artifact_timeout,
            find_timeout: self.find_timeout,
            panel_timeout: self.panel_timeout,
            worker_count: self.worker_count,
            politeness_delay_ms: self.politeness_delay_ms,
            shutdown_deadline: self.shutdown_deadline,
            selectors: self.selectors,
            _phantom: PhantomData,
        }
    }
}

// Optional knobs, available in any state
impl<State> CollectConfigBuilder<State> {
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn artifact_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.artifact_extension = if extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        self
    }

    #[must_use]
    pub fn rotate_after_downloads(mut self, count: u32) -> Self {
        self.rotate_after_downloads = count;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn artifact_timeout(mut self, timeout: Duration) -> Self {
        self.artifact_timeout = timeout;
        self
    }

    #[must_use]
    pub fn find_timeout(mut self, timeout: Duration) -> Self {
        self.find_timeout = timeout;
        self
    }

    #[must_use]
    pub fn panel_timeout(mut self, timeout: Duration) -> Self {
        self.panel_timeout = timeout;
        self
    }

    #[must_use]
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    #[must_use]
    pub fn politeness_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.politeness_delay_ms = (min, max);
        self
    }

    #[must_use]
    pub fn shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.shutdown_deadline = deadline;
        self
    }

    #[must_use]
    pub fn selectors(mut self, selectors: PanelSelectors) -> Self {
        self.selectors = selectors;
        self
    }
}

// Build method only available when all required fields are set
impl CollectConfigBuilder<WithResourceUrl> {
    pub fn build(self) -> Result<CollectConfig> {
        if self.worker_count == 0 {
            return Err(anyhow!("worker_count must be at least 1"));
        }
        let (min_delay, max_delay) = self.politeness_delay_ms;
        if min_delay > max_delay {
            return Err(anyhow!(
                "politeness delay bounds are inverted: {min_delay} > {max_delay}"
            ));
        }
        if self.artifact_extension == "." || self.artifact_extension.is_empty() {
            return Err(anyhow!("artifact_extension must not be empty"));
        }

        Ok(CollectConfig {
            download_root: self
                .download_root
                .ok_or_else(|| anyhow!("download_root is required"))?,
            resource_url: self
                .resource_url
                .ok_or_else(|| anyhow!("resource_url is required"))?,
            headless: self.headless,
            artifact_extension: self.artifact_extension,
            rotate_after_downloads: self.rotate_after_downloads,
            max_retries: self.max_retries,
            artifact_timeout: self.artifact_timeout,
            find_timeout: self.find_timeout,
            panel_timeout: self.panel_timeout,
            worker_count: self.worker_count,
            politeness_delay_ms: self.politeness_delay_ms,
            shutdown_deadline: self.shutdown_deadline,
            selectors: self.selectors,
        })
    }
}
