//! The seam between the download engine and a live browser.
//!
//! Everything above this trait speaks in selector strings and opaque element
//! handles; only `session.rs` knows about chromiumoxide. Selectors are CSS by
//! default, XPath when they begin with `//`. The engine never retains a
//! handle across a panel open/close cycle — it re-locates by stable node id.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// How long to wait after navigation before handing control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Return as soon as navigation is committed.
    None,
    /// Wait for the load event (plus a settle delay for script-rendered UI).
    Load,
}

/// Minimal driving surface over a browser page.
///
/// `find_one`/`find_all` poll until the element appears or `timeout`
/// elapses; absence after the timeout is `Ok(None)` / an empty vec, not an
/// error. Errors mean the session itself is unusable.
#[async_trait]
pub trait AutomationSurface: Send + Sync {
    type Handle: Send + Sync;

    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<()>;

    async fn find_one(&self, selector: &str, timeout: Duration) -> Result<Option<Self::Handle>>;

    async fn find_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Self::Handle>>;

    async fn click(&self, handle: &Self::Handle) -> Result<()>;

    async fn read_text(&self, handle: &Self::Handle) -> Result<String>;

    async fn read_attribute(
        &self,
        handle: &Self::Handle,
        name: &str,
    ) -> Result<Option<String>>;

    async fn evaluate(&self, js: &str) -> Result<()>;

    async fn screenshot(&self, path: &Path) -> Result<()>;
}

/// Creates fresh automation surfaces, each with its own browser identity.
///
/// Session rotation and the worker pool both go through this so that tests
/// can substitute a mock surface for the real Chrome-backed one.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Surface: AutomationSurface + Send + Sync + 'static;

    async fn create(&self) -> Result<Self::Surface>;

    /// Graceful teardown. The default just drops the surface and relies on
    /// its RAII cleanup.
    async fn destroy(&self, surface: Self::Surface) -> Result<()> {
        drop(surface);
        Ok(())
    }
}
