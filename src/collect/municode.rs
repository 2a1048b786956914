//! The Municode collector: discovery, sequential download pipeline with
//! rotation and politeness, one retry pass, then upload and metadata.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};

use super::Collector;
use crate::browser::{AutomationSurface, SessionFactory, WaitPolicy};
use crate::config::CollectConfig;
use crate::engine::{
    panel, DownloadTask, DownloadWatcher, EngineError, FailureReport, ProgressIndex, RetryQueue,
    RunSummary, SectionDownloader, SessionRotationPolicy, TreeDiscovery,
};
use crate::storage::{upload_with_retry, ObjectStore};

pub struct MunicodeCollector<F: SessionFactory> {
    state_abbrev: String,
    municipality: String,
    config: CollectConfig,
    factory: F,
    store: Option<Arc<dyn ObjectStore>>,
}

impl<F: SessionFactory> MunicodeCollector<F> {
    pub fn new(
        state_abbrev: impl Into<String>,
        municipality: impl Into<String>,
        config: CollectConfig,
        factory: F,
    ) -> Self {
        Self {
            state_abbrev: state_abbrev.into().to_lowercase(),
            municipality: municipality.into().to_lowercase(),
            config,
            factory,
            store: None,
        }
    }

    /// Mirror artifacts to `store` after the download pipeline finishes.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    async fn politeness_pause(&self) {
        let (min_ms, max_ms) = self.config.politeness_delay_ms();
        if max_ms == 0 {
            return;
        }
        let delay_ms = {
            let mut rng = rand::rng();
            rng.random_range(min_ms..=max_ms)
        };
        sleep(Duration::from_millis(delay_ms)).await;
    }

    /// Tear the current session down, then bring up a fresh one pointed at
    /// the resource root. Destroy-then-create, so only one browser identity
    /// is ever alive. Failures here are fatal: without a working session
    /// nothing further can download.
    async fn rotate_session(&self, slot: &mut Option<F::Surface>) -> Result<(), EngineError> {
        info!("Rotating browser session");
        if let Some(old) = slot.take() {
            if let Err(e) = self.factory.destroy(old).await {
                warn!("Old session teardown failed: {}", e);
            }
        }
        let fresh = self
            .factory
            .create()
            .await
            .context("failed to create replacement session")?;
        fresh
            .navigate(self.config.resource_url(), WaitPolicy::Load)
            .await
            .context("failed to re-navigate after rotation")?;
        panel::dismiss_overlays(&fresh, self.config.selectors()).await;
        *slot = Some(fresh);
        Ok(())
    }

    fn write_metadata(&self, download_dir: &std::path::Path) -> Result<PathBuf> {
        let metadata = json!({
            "state": self.state_abbrev,
            "municipality": self.municipality,
            "source_url": self.config.resource_url(),
        });
        let path = download_dir.join("metadata.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&metadata)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    async fn upload_artifacts(&self, download_dir: &std::path::Path) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let prefix = self.remote_prefix();
        let mut uploaded = 0;
        for entry in std::fs::read_dir(download_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let is_artifact = name.ends_with(self.config.artifact_extension());
            if !is_artifact && name != "metadata.json" {
                continue;
            }
            let remote = format!("{prefix}/{name}");
            match upload_with_retry(store.as_ref(), &path, &remote).await {
                Ok(()) => uploaded += 1,
                Err(e) => warn!(remote = remote.as_str(), "Upload failed: {:#}", e),
            }
        }
        Ok(uploaded)
    }
}

#[async_trait]
impl<F: SessionFactory> Collector for MunicodeCollector<F> {
    fn resource_url(&self) -> &str {
        self.config.resource_url()
    }

    fn download_directory(&self) -> PathBuf {
        self.config
            .download_root()
            .join(&self.state_abbrev)
            .join(&self.municipality)
    }

    fn remote_prefix(&self) -> String {
        format!("zoning_ordinance/{}/{}", self.state_abbrev, self.municipality)
    }

    async fn collect(&mut self) -> Result<RunSummary> {
        let download_dir = self.download_directory();
        std::fs::create_dir_all(&download_dir)
            .with_context(|| format!("Failed to create {}", download_dir.display()))?;

        let mut session = Some(
            self.factory
                .create()
                .await
                .context("failed to create browser session")?,
        );

        let watcher = DownloadWatcher::default();
        let mut summary = RunSummary::default();

        let result = self
            .run_pipeline(&mut session, &watcher, &download_dir, &mut summary)
            .await;

        if let Some(session) = session.take() {
            if let Err(e) = self.factory.destroy(session).await {
                warn!("Session teardown failed: {}", e);
            }
        }
        result?;

        self.write_metadata(&download_dir)?;
        let uploaded = self.upload_artifacts(&download_dir).await?;
        if uploaded > 0 {
            info!(uploaded, "Mirrored artifacts to object store");
        }

        info!(
            municipality = self.municipality.as_str(),
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "Collection finished"
        );
        Ok(summary)
    }
}

impl<F: SessionFactory> MunicodeCollector<F> {
    async fn run_pipeline(
        &self,
        session: &mut Option<F::Surface>,
        watcher: &DownloadWatcher,
        download_dir: &std::path::Path,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let surface = session.as_ref().context("browser session unavailable")?;
        let discovery = TreeDiscovery::new(surface, &self.config);
        let tasks = discovery
            .discover(self.config.resource_url())
            .await
            .context("tree discovery failed")?;

        let index = ProgressIndex::new(download_dir);
        let (pending, skipped) = index.partition(tasks);
        summary.skipped = skipped.len();
        info!(
            pending = pending.len(),
            skipped = summary.skipped,
            "Starting download pipeline"
        );

        let mut rotation = SessionRotationPolicy::new(self.config.rotate_after_downloads());
        let mut retries = RetryQueue::new(self.config.max_retries());
        let total = pending.len();

        for (i, mut task) in pending.into_iter().enumerate() {
            if rotation.rotation_due() {
                self.rotate_session(session).await?;
                rotation.reset();
            }

            let surface = session.as_ref().context("browser session unavailable")?;
            let downloader =
                SectionDownloader::new(surface, &self.config, watcher, download_dir);
            match downloader.run(&mut task).await {
                Ok(_) => {
                    summary.succeeded += 1;
                    rotation.record_success();
                }
                Err(e) if e.is_fatal() => {
                    return Err(anyhow::Error::from(e).context("download pipeline aborted"));
                }
                Err(e) => {
                    if u32::from(task.attempts) > u32::from(self.config.max_retries()) {
                        summary.failed.push(FailureReport {
                            section: task.label(),
                            error: e.to_string(),
                        });
                    } else {
                        warn!(section = %task.label(), "Queued for retry: {}", e);
                        retries.push(task);
                    }
                }
            }

            if i + 1 < total {
                self.politeness_pause().await;
            }
        }

        // single ordered replay of everything that failed
        let eligible = retries.drain_eligible();
        if !eligible.is_empty() {
            info!(count = eligible.len(), "Replaying failed sections");
        }
        for mut task in eligible {
            if rotation.rotation_due() {
                self.rotate_session(session).await?;
                rotation.reset();
            }
            let surface = session.as_ref().context("browser session unavailable")?;
            let downloader =
                SectionDownloader::new(surface, &self.config, watcher, download_dir);
            match downloader.run(&mut task).await {
                Ok(_) => {
                    summary.succeeded += 1;
                    rotation.record_success();
                }
                Err(e) if e.is_fatal() => {
                    return Err(anyhow::Error::from(e).context("retry pass aborted"));
                }
                Err(e) => summary.failed.push(FailureReport {
                    section: task.label(),
                    error: e.to_string(),
                }),
            }
            self.politeness_pause().await;
        }

        Ok(())
    }
}

/// Build the download tasks a pipeline would run, without running them.
/// Exposed for dry-run inspection from the CLI.
pub async fn preview_tasks<S: AutomationSurface>(
    surface: &S,
    config: &CollectConfig,
) -> Result<Vec<DownloadTask>> {
    let discovery = TreeDiscovery::new(surface, config);
    let tasks = discovery
        .discover(config.resource_url())
        .await
        .context("tree discovery failed")?;
    Ok(tasks)
}
