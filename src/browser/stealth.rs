//! JavaScript-level hardening applied to every new page.
//!
//! Municode serves an Angular app that refuses to render the download panel
//! for obvious automation, so the navigator surface is patched to look like
//! a plain desktop Chrome.

use anyhow::Result;
use chromiumoxide::Page;
use tracing::debug;

pub async fn harden_page(page: &Page, user_agent: &str) -> Result<()> {
    debug!("Applying navigator hardening to page");

    page.evaluate(
        r"
        Object.defineProperty(navigator, 'webdriver', {
            get: () => false
        });
    ",
    )
    .await?;

    let user_agent_js = format!(
        r"
        Object.defineProperty(navigator, 'userAgent', {{
            value: '{user_agent}'
        }});
    "
    );
    page.evaluate(user_agent_js.as_str()).await?;

    page.evaluate(
        r"
        Object.defineProperty(navigator, 'languages', {
            get: () => ['en-US', 'en']
        });
    ",
    )
    .await?;

    page.evaluate(
        r"
        if (!window.chrome) {
            window.chrome = {};
        }
        if (!window.chrome.runtime) {
            window.chrome.runtime = {
                connect: () => ({
                    onMessage: { addListener: () => {}, removeListener: () => {} },
                    postMessage: () => {}
                })
            };
        }
    ",
    )
    .await?;

    Ok(())
}
