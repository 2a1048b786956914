//! Per-section download state machine.
//!
//! Drives one `DownloadTask` through the full panel cycle. Exactly one
//! section is in flight per session at any time, and the panel is closed on
//! every exit path so the next task starts from a known page state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::error::{EngineError, EngineResult};
use super::panel;
use super::task::{DownloadTask, TaskStatus};
use super::watcher::{CompletionResult, DownloadWatcher};
use crate::browser::AutomationSurface;
use crate::config::CollectConfig;

/// Phases of a single section download, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PanelOpen,
    ParentExpanded,
    NodeSelected,
    Triggered,
    AwaitingArtifact,
    Succeeded,
    TimedOut,
    PanelClosed,
}

pub struct SectionDownloader<'a, S: AutomationSurface> {
    surface: &'a S,
    config: &'a CollectConfig,
    watcher: &'a DownloadWatcher,
    download_dir: &'a Path,
}

impl<'a, S: AutomationSurface> SectionDownloader<'a, S> {
    pub fn new(
        surface: &'a S,
        config: &'a CollectConfig,
        watcher: &'a DownloadWatcher,
        download_dir: &'a Path,
    ) -> Self {
        Self {
            surface,
            config,
            watcher,
            download_dir,
        }
    }

    /// Run the full download cycle for one task. Updates the task's attempt
    /// count and status; on success returns the path of the renamed
    /// artifact.
    pub async fn run(&self, task: &mut DownloadTask) -> EngineResult<PathBuf> {
        task.attempts += 1;
        task.status = TaskStatus::InProgress;
        info!(
            section = %task.label(),
            node_id = %task.node_id,
            attempt = task.attempts,
            "Downloading section"
        );

        let result = self.drive(task).await;

        let terminal = match &result {
            Ok(_) => Phase::Succeeded,
            Err(EngineError::ArtifactTimeout { .. }) => Phase::TimedOut,
            Err(_) => Phase::Idle,
        };
        debug!(phase = ?terminal, node_id = %task.node_id, "Section download finished");

        // the panel is closed no matter how the cycle ended
        panel::close_panel(self.surface, self.config.selectors()).await;
        debug!(phase = ?Phase::PanelClosed, node_id = %task.node_id, "Panel closed");

        match &result {
            Ok(path) => {
                task.status = TaskStatus::Succeeded;
                info!(section = %task.label(), artifact = %path.display(), "Section downloaded");
            }
            Err(e) => {
                task.status = TaskStatus::Failed;
                warn!(section = %task.label(), error = %e, "Section download failed");
            }
        }
        result
    }

    async fn drive(&self, task: &DownloadTask) -> EngineResult<PathBuf> {
        let selectors = self.config.selectors();
        let mut phase = Phase::Idle;
        let mut snapshot: HashSet<PathBuf> = HashSet::new();

        loop {
            debug!(phase = ?phase, node_id = %task.node_id, "Section phase");
            phase = match phase {
                Phase::Idle => {
                    panel::open_panel(self.surface, selectors, self.config.panel_timeout())
                        .await?;
                    Phase::PanelOpen
                }
                Phase::PanelOpen => {
                    panel::expand_parent(
                        self.surface,
                        selectors,
                        task.parent_id.as_deref(),
                        self.config.find_timeout(),
                    )
                    .await?;
                    Phase::ParentExpanded
                }
                Phase::ParentExpanded => {
                    self.select_node(&task.node_id).await?;
                    Phase::NodeSelected
                }
                Phase::NodeSelected => {
                    snapshot = DownloadWatcher::snapshot(
                        self.download_dir,
                        self.config.artifact_extension(),
                    )?;
                    self.trigger_download().await?;
                    Phase::Triggered
                }
                Phase::Triggered => Phase::AwaitingArtifact,
                Phase::AwaitingArtifact => {
                    match self
                        .watcher
                        .await_artifact(
                            self.download_dir,
                            self.config.artifact_extension(),
                            &snapshot,
                            self.config.artifact_timeout(),
                        )
                        .await?
                    {
                        CompletionResult::Completed { artifact_path, .. } => {
                            return self.finalize(task, &artifact_path);
                        }
                        CompletionResult::TimedOut {
                            total,
                            new,
                            incomplete,
                        } => {
                            return Err(EngineError::ArtifactTimeout {
                                timeout: self.config.artifact_timeout(),
                                total,
                                new,
                                incomplete,
                            });
                        }
                    }
                }
                Phase::Succeeded | Phase::TimedOut | Phase::PanelClosed => {
                    // terminal phases are handled by the arms above
                    unreachable!("terminal phase reached inside drive loop")
                }
            };
        }
    }

    /// Toggle the node's checkbox to checked and verify via the checked
    /// attribute, with one corrective click if the first did not register.
    async fn select_node(&self, node_id: &str) -> EngineResult<()> {
        let selectors = self.config.selectors();
        let find_timeout = self.config.find_timeout();

        if self
            .surface
            .find_one(&selectors.node_item(node_id), find_timeout)
            .await?
            .is_none()
        {
            return Err(EngineError::Selection {
                node_id: node_id.to_string(),
                reason: "node not present in tree".to_string(),
            });
        }

        if self.is_checked(node_id).await? {
            debug!(node_id, "Node already selected");
            return Ok(());
        }

        self.click_checkbox(node_id).await?;
        sleep(Duration::from_millis(500)).await;

        if self.is_checked(node_id).await? {
            return Ok(());
        }

        // one corrective click before giving up
        debug!(node_id, "Selection did not register, clicking again");
        self.click_checkbox(node_id).await?;
        sleep(Duration::from_millis(500)).await;

        if self.is_checked(node_id).await? {
            Ok(())
        } else {
            Err(EngineError::Selection {
                node_id: node_id.to_string(),
                reason: "checkbox did not reach checked state".to_string(),
            })
        }
    }

    async fn click_checkbox(&self, node_id: &str) -> EngineResult<()> {
        let handle = self
            .surface
            .find_one(
                &self.config.selectors().node_checkbox(node_id),
                self.config.find_timeout(),
            )
            .await?
            .ok_or_else(|| EngineError::Selection {
                node_id: node_id.to_string(),
                reason: "selection checkbox not found".to_string(),
            })?;
        self.surface.click(&handle).await?;
        Ok(())
    }

    async fn is_checked(&self, node_id: &str) -> EngineResult<bool> {
        // re-locate on every read; the widget re-renders on toggle
        let handle = self
            .surface
            .find_one(
                &self.config.selectors().node_checkbox(node_id),
                self.config.find_timeout(),
            )
            .await?
            .ok_or_else(|| EngineError::Selection {
                node_id: node_id.to_string(),
                reason: "selection checkbox not found".to_string(),
            })?;
        let checked = self
            .surface
            .read_attribute(&handle, &self.config.selectors().checked_attr)
            .await?;
        Ok(checked.as_deref() == Some("true"))
    }

    /// Click the download trigger. A missing or disabled trigger produces a
    /// diagnostic screenshot before failing.
    async fn trigger_download(&self) -> EngineResult<()> {
        let selectors = self.config.selectors();
        let trigger = match self
            .surface
            .find_one(&selectors.trigger_button, self.config.find_timeout())
            .await?
        {
            Some(handle) => handle,
            None => {
                self.capture_diagnostic("trigger_missing").await;
                return Err(EngineError::Trigger(
                    "download button not found".to_string(),
                ));
            }
        };

        let disabled = self
            .surface
            .read_attribute(&trigger, &selectors.disabled_attr)
            .await?
            .is_some();
        if disabled {
            self.capture_diagnostic("trigger_disabled").await;
            return Err(EngineError::Trigger("download button is disabled".to_string()));
        }

        self.surface.click(&trigger).await?;
        sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    async fn capture_diagnostic(&self, label: &str) {
        let path = self.download_dir.join(format!("debug_{label}.png"));
        match self.surface.screenshot(&path).await {
            Ok(()) => warn!(screenshot = %path.display(), "Captured diagnostic screenshot"),
            Err(e) => warn!("Diagnostic screenshot failed: {}", e),
        }
    }

    /// Rename the browser-named artifact to the task's deterministic target
    /// name.
    fn finalize(&self, task: &DownloadTask, artifact: &Path) -> EngineResult<PathBuf> {
        let target = self.download_dir.join(&task.target_name);
        if artifact != target {
            std::fs::rename(artifact, &target)?;
        }
        Ok(target)
    }
}
