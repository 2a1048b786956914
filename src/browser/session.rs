//! Chrome-backed session: owns the browser process, its CDP handler task,
//! one page, and the identity it presents. Implements `AutomationSurface`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::identity::BrowserIdentity;
use super::launch;
use super::profile::BrowserProfile;
use super::stealth;
use super::surface::{AutomationSurface, SessionFactory, WaitPolicy};

const FIND_POLL_INTERVAL: Duration = Duration::from_millis(100);
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// One live browser session.
///
/// Dropping a session aborts the handler task and removes the profile
/// directory; the browser process itself is killed by `Browser`'s own drop.
/// Prefer `close()` for a graceful shutdown.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    identity: BrowserIdentity,
    profile_dir: PathBuf,
    download_dir: PathBuf,
}

impl BrowserSession {
    /// Launch Chrome with a fresh identity and profile directory, and route
    /// downloads into `download_dir`.
    pub async fn launch(headless: bool, download_dir: PathBuf) -> Result<Self> {
        let identity = BrowserIdentity::random();
        let profile = BrowserProfile::create("municrawl_chrome")?;

        std::fs::create_dir_all(&download_dir).with_context(|| {
            format!("Failed to create download directory: {}", download_dir.display())
        })?;

        let (browser, handler) = launch::launch_browser(
            headless,
            profile.path().to_path_buf(),
            identity.user_agent(),
        )
        .await?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open initial page")?;

        stealth::harden_page(&page, identity.user_agent()).await?;

        let download_behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy().to_string())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build download behavior params: {e}"))?;
        page.execute(download_behavior)
            .await
            .context("Failed to set download behavior")?;

        info!(
            user_agent = identity.user_agent(),
            download_dir = %download_dir.display(),
            "Browser session ready"
        );

        Ok(Self {
            browser,
            handler,
            page,
            identity,
            profile_dir: profile.into_path(),
            download_dir,
        })
    }

    pub fn identity(&self) -> &BrowserIdentity {
        &self.identity
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Graceful teardown: close the browser, wait for the process to exit,
    /// then let drop handle the rest.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close request failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process wait error: {}", e);
        }
        Ok(())
    }

    async fn try_find(&self, selector: &str) -> Result<Option<Element>, chromiumoxide::error::CdpError> {
        if selector.starts_with("//") {
            self.page.find_xpath(selector).await.map(Some)
        } else {
            self.page.find_element(selector).await.map(Some)
        }
    }

    async fn try_find_all(
        &self,
        selector: &str,
    ) -> Result<Vec<Element>, chromiumoxide::error::CdpError> {
        if selector.starts_with("//") {
            self.page.find_xpaths(selector).await
        } else {
            self.page.find_elements(selector).await
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        if self.profile_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
                warn!(
                    "Failed to clean up profile directory {}: {}",
                    self.profile_dir.display(),
                    e
                );
            }
        }
    }
}

#[async_trait]
impl AutomationSurface for BrowserSession {
    type Handle = Element;

    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<()> {
        debug!(url, "Navigating");
        tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url))
            .await
            .map_err(|_| anyhow::anyhow!("Navigation to {url} timed out"))?
            .with_context(|| format!("Failed to navigate to {url}"))?;

        if wait == WaitPolicy::Load {
            if let Err(e) =
                tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.wait_for_navigation()).await
            {
                debug!("Load wait elapsed without event: {}", e);
            }
            // Angular needs a beat to render after the load event
            sleep(Duration::from_secs(2)).await;
        }
        Ok(())
    }

    async fn find_one(&self, selector: &str, timeout: Duration) -> Result<Option<Element>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.try_find(selector).await {
                Ok(found) => return Ok(found),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    sleep(FIND_POLL_INTERVAL).await;
                }
                Err(_) => return Ok(None),
            }
        }
    }

    async fn find_all(&self, selector: &str, timeout: Duration) -> Result<Vec<Element>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.try_find_all(selector).await {
                Ok(elements) if !elements.is_empty() => return Ok(elements),
                Ok(_) | Err(_) if tokio::time::Instant::now() < deadline => {
                    sleep(FIND_POLL_INTERVAL).await;
                }
                Ok(elements) => return Ok(elements),
                Err(_) => return Ok(Vec::new()),
            }
        }
    }

    async fn click(&self, handle: &Element) -> Result<()> {
        handle.click().await.context("Click failed")?;
        Ok(())
    }

    async fn read_text(&self, handle: &Element) -> Result<String> {
        let text = handle.inner_text().await.context("Failed to read text")?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn read_attribute(&self, handle: &Element, name: &str) -> Result<Option<String>> {
        handle
            .attribute(name)
            .await
            .with_context(|| format!("Failed to read attribute '{name}'"))
    }

    async fn evaluate(&self, js: &str) -> Result<()> {
        self.page.evaluate(js).await.context("Script evaluation failed")?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().build(), path)
            .await
            .with_context(|| format!("Failed to save screenshot to {}", path.display()))?;
        Ok(())
    }
}

/// Factory for Chrome-backed sessions, all sharing one download directory.
#[derive(Debug, Clone)]
pub struct CdpSessionFactory {
    headless: bool,
    download_dir: PathBuf,
}

impl CdpSessionFactory {
    pub fn new(headless: bool, download_dir: PathBuf) -> Self {
        Self {
            headless,
            download_dir,
        }
    }
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
    type Surface = BrowserSession;

    async fn create(&self) -> Result<BrowserSession> {
        BrowserSession::launch(self.headless, self.download_dir.clone()).await
    }

    async fn destroy(&self, surface: BrowserSession) -> Result<()> {
        surface.close().await
    }
}
