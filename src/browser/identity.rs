//! Browser identity: the user-agent fingerprint a session presents, plus
//! bookkeeping for how much work it has served.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// Desktop Chrome user agents rotated across sessions.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

/// Identity a single browser session presents to the remote site.
///
/// An identity is fixed at session construction. Rotation never mutates a
/// live identity; it tears the session down and builds a new one with a
/// freshly chosen fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct BrowserIdentity {
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub downloads_served: u32,
}

impl BrowserIdentity {
    /// Pick a random fingerprint from the pool.
    pub fn random() -> Self {
        let idx = rand::rng().random_range(0..USER_AGENTS.len());
        Self {
            fingerprint: USER_AGENTS[idx].to_string(),
            created_at: Utc::now(),
            downloads_served: 0,
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.fingerprint
    }

    pub fn record_download(&mut self) {
        self.downloads_served += 1;
    }
}
