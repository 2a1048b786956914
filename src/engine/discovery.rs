//! Tree discovery: enumerate downloadable sections one level deep.
//!
//! Opens the download panel, expands every top-level node once, and turns
//! each visible node into a `DownloadTask` carrying the stable node id used
//! to re-locate it later. Panel or tree absence is fatal; a single broken
//! node is logged and skipped.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::error::{EngineError, EngineResult};
use super::panel;
use super::task::DownloadTask;
use crate::browser::{AutomationSurface, WaitPolicy};
use crate::config::CollectConfig;

/// Leaf nodes have no child list, so polling for one with the full find
/// timeout would stall discovery on every leaf. Children render fast once
/// the parent is expanded; a short probe is enough.
const CHILD_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TreeDiscovery<'a, S: AutomationSurface> {
    surface: &'a S,
    config: &'a CollectConfig,
}

impl<'a, S: AutomationSurface> TreeDiscovery<'a, S> {
    pub fn new(surface: &'a S, config: &'a CollectConfig) -> Self {
        Self { surface, config }
    }

    /// Discover download tasks for every section reachable within one level
    /// of expansion. Parents with children yield one task per child; parents
    /// without children yield a single task for themselves.
    pub async fn discover(&self, resource_url: &str) -> EngineResult<Vec<DownloadTask>> {
        let selectors = self.config.selectors();
        let find_timeout = self.config.find_timeout();

        self.surface.navigate(resource_url, WaitPolicy::Load).await?;
        panel::open_panel(self.surface, selectors, self.config.panel_timeout()).await?;

        let root_ids = self.root_node_ids().await?;
        if root_ids.is_empty() {
            return Err(EngineError::Discovery(
                "document tree has no top-level nodes".to_string(),
            ));
        }
        info!(count = root_ids.len(), "Discovered top-level nodes");

        // expand everything first so child lists are rendered before we read
        for id in &root_ids {
            match self
                .surface
                .find_one(&selectors.node_expander(id), find_timeout)
                .await?
            {
                Some(handle) => {
                    if let Err(e) = self.surface.click(&handle).await {
                        warn!(node_id = id.as_str(), "Expander click failed: {}", e);
                    }
                    sleep(Duration::from_millis(200)).await;
                }
                None => debug!(node_id = id.as_str(), "No expander; node is a leaf"),
            }
        }
        sleep(Duration::from_millis(500)).await;

        let mut tasks = Vec::new();
        for id in &root_ids {
            let heading = match self.node_heading(id).await {
                Ok(heading) => heading,
                Err(e) => {
                    warn!(node_id = id.as_str(), "Skipping unreadable node: {}", e);
                    continue;
                }
            };

            let children = self
                .surface
                .find_all(&selectors.child_items(id), CHILD_PROBE_TIMEOUT)
                .await?;

            if children.is_empty() {
                tasks.push(DownloadTask::new(
                    vec![heading],
                    None,
                    id.clone(),
                    self.config.artifact_extension(),
                ));
                continue;
            }

            for child in &children {
                let child_id = match self
                    .surface
                    .read_attribute(child, &selectors.node_id_attr)
                    .await
                {
                    Ok(Some(child_id)) if !child_id.is_empty() => child_id,
                    Ok(_) => {
                        warn!(parent = id.as_str(), "Child node without id, skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!(parent = id.as_str(), "Child id read failed: {}", e);
                        continue;
                    }
                };
                match self.node_heading(&child_id).await {
                    Ok(child_heading) => tasks.push(DownloadTask::new(
                        vec![heading.clone(), child_heading],
                        Some(id.clone()),
                        child_id,
                        self.config.artifact_extension(),
                    )),
                    Err(e) => {
                        warn!(node_id = child_id.as_str(), "Skipping unreadable child: {}", e)
                    }
                }
            }
        }

        panel::close_panel(self.surface, selectors).await;
        info!(count = tasks.len(), "Discovery produced download tasks");
        Ok(tasks)
    }

    async fn root_node_ids(&self) -> EngineResult<Vec<String>> {
        let selectors = self.config.selectors();
        let items = self
            .surface
            .find_all(&selectors.root_items, self.config.find_timeout())
            .await?;
        let mut ids = Vec::with_capacity(items.len());
        for item in &items {
            match self
                .surface
                .read_attribute(item, &selectors.node_id_attr)
                .await
            {
                Ok(Some(id)) if !id.is_empty() => ids.push(id),
                Ok(_) => warn!("Top-level node without id, skipping"),
                Err(e) => warn!("Top-level node id read failed: {}", e),
            }
        }
        Ok(ids)
    }

    async fn node_heading(&self, node_id: &str) -> EngineResult<String> {
        let selectors = self.config.selectors();
        let handle = self
            .surface
            .find_one(&selectors.node_heading(node_id), self.config.find_timeout())
            .await?
            .ok_or_else(|| EngineError::Discovery(format!("heading of node {node_id} not found")))?;
        let heading = self.surface.read_text(&handle).await?;
        if heading.is_empty() {
            return Err(EngineError::Discovery(format!(
                "heading of node {node_id} is empty"
            )));
        }
        Ok(heading)
    }
}
