//! Shared panel choreography: overlay dismissal, opening and closing the
//! download panel, expanding a parent node.
//!
//! Used by both tree discovery and the per-section state machine so the two
//! drive the page identically.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::{EngineError, EngineResult};
use super::selectors::PanelSelectors;
use crate::browser::AutomationSurface;

const OVERLAY_TIMEOUT: Duration = Duration::from_millis(500);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
const PANEL_APPEAR_TIMEOUT: Duration = Duration::from_secs(10);

/// Click away tour/onboarding overlays. Best effort; absence is normal.
pub async fn dismiss_overlays<S: AutomationSurface>(surface: &S, selectors: &PanelSelectors) {
    for closer in &selectors.overlay_closers {
        match surface.find_one(closer, OVERLAY_TIMEOUT).await {
            Ok(Some(handle)) => {
                debug!(selector = closer.as_str(), "Dismissing overlay");
                if surface.click(&handle).await.is_ok() {
                    sleep(Duration::from_millis(500)).await;
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Overlay probe failed: {}", e),
        }
    }
}

/// Close the panel if it is open. Best effort; the next open re-syncs state.
pub async fn close_panel<S: AutomationSurface>(surface: &S, selectors: &PanelSelectors) {
    match surface.find_one(&selectors.panel_close, CLOSE_TIMEOUT).await {
        Ok(Some(handle)) => {
            if let Err(e) = surface.click(&handle).await {
                warn!("Panel close click failed: {}", e);
            } else {
                sleep(Duration::from_secs(1)).await;
            }
        }
        Ok(None) => {}
        Err(e) => debug!("Panel close probe failed: {}", e),
    }
}

/// Open the download panel and wait for it to become active.
///
/// Starts from a clean slate (overlays dismissed, any stale panel closed).
/// Failure to locate the open button or the active panel means the page is
/// not serving the expected layout at all.
pub async fn open_panel<S: AutomationSurface>(
    surface: &S,
    selectors: &PanelSelectors,
    button_timeout: Duration,
) -> EngineResult<()> {
    dismiss_overlays(surface, selectors).await;
    close_panel(surface, selectors).await;

    let mut open_button = None;
    for candidate in &selectors.open_buttons {
        if let Some(handle) = surface.find_one(candidate, button_timeout).await? {
            debug!(selector = candidate.as_str(), "Found download panel button");
            open_button = Some(handle);
            break;
        }
    }
    let open_button = open_button
        .ok_or_else(|| EngineError::Discovery("download panel button not found".to_string()))?;

    surface.click(&open_button).await?;

    surface
        .find_one(&selectors.active_panel, PANEL_APPEAR_TIMEOUT)
        .await?
        .ok_or_else(|| EngineError::Discovery("download panel did not open".to_string()))?;

    // let the tree widget render
    sleep(Duration::from_secs(2)).await;
    Ok(())
}

/// Expand a parent node so its children become selectable. No-op for
/// top-level tasks; a missing expander is logged, not fatal, since leaf
/// parents have none.
pub async fn expand_parent<S: AutomationSurface>(
    surface: &S,
    selectors: &PanelSelectors,
    parent_id: Option<&str>,
    find_timeout: Duration,
) -> EngineResult<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    match surface
        .find_one(&selectors.node_expander(parent_id), find_timeout)
        .await?
    {
        Some(handle) => {
            surface.click(&handle).await?;
            sleep(Duration::from_millis(300)).await;
        }
        None => warn!(parent_id, "Parent expander not found"),
    }
    Ok(())
}
