//! Discovery against the Municode library site: which municipalities a
//! state has, and where a municipality's code of ordinances lives.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::browser::{AutomationSurface, WaitPolicy};

pub const LIBRARY_BASE_URL: &str = "https://library.municode.com";

/// Path segments that appear under a state but are not municipalities.
const RESERVED_SEGMENTS: [&str; 4] = ["codes", "ordinances", "charter", "browse"];

/// Href fragments that mark a link as pointing at a code of ordinances,
/// in preference order.
const CODE_PATH_PATTERNS: [&str; 3] = [
    "codes/code_of_ordinances",
    "codes/zoning",
    "codes/land_development_code",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Municipality {
    pub name: String,
    pub slug: String,
    pub state_abbrev: String,
    pub url: String,
}

const ANCHOR_TIMEOUT: Duration = Duration::from_secs(10);

/// List the two-letter state codes the library publishes.
pub async fn list_states<S: AutomationSurface>(surface: &S) -> Result<Vec<String>> {
    surface.navigate(LIBRARY_BASE_URL, WaitPolicy::Load).await?;
    let anchors = surface.find_all("a[href]", ANCHOR_TIMEOUT).await?;

    let mut states: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for anchor in &anchors {
        let Some(href) = surface.read_attribute(anchor, "href").await? else {
            continue;
        };
        if let Some(code) = state_code(&href)
            && seen.insert(code.clone())
        {
            states.push(code);
        }
    }
    states.sort();
    info!(count = states.len(), "Listed states");
    Ok(states)
}

/// List the municipalities published for a state.
pub async fn list_municipalities<S: AutomationSurface>(
    surface: &S,
    state_abbrev: &str,
) -> Result<Vec<Municipality>> {
    let state = state_abbrev.to_lowercase();
    let state_url = format!("{LIBRARY_BASE_URL}/{state}");
    surface.navigate(&state_url, WaitPolicy::Load).await?;

    let anchors = surface
        .find_all(&format!("a[href*='/{state}/']"), ANCHOR_TIMEOUT)
        .await?;
    debug!(count = anchors.len(), "Found candidate municipality links");

    let mut seen: HashSet<String> = HashSet::new();
    let mut municipalities = Vec::new();
    for anchor in &anchors {
        let Some(href) = surface.read_attribute(anchor, "href").await? else {
            continue;
        };
        let Some(slug) = municipality_slug(&href, &state) else {
            continue;
        };
        if !seen.insert(slug.clone()) {
            continue;
        }
        let name = surface.read_text(anchor).await.unwrap_or_default();
        let name = if name.is_empty() {
            slug.replace('_', " ")
        } else {
            name
        };
        municipalities.push(Municipality {
            name,
            url: format!("{LIBRARY_BASE_URL}/{state}/{slug}"),
            slug,
            state_abbrev: state.clone(),
        });
    }

    info!(
        state = state.as_str(),
        count = municipalities.len(),
        "Listed municipalities"
    );
    Ok(municipalities)
}

/// Resolve the codes URL for one municipality by probing known link
/// patterns on its landing page. `Ok(None)` means the municipality
/// publishes no recognizable code of ordinances.
pub async fn find_codes_url<S: AutomationSurface>(
    surface: &S,
    state_abbrev: &str,
    slug: &str,
) -> Result<Option<String>> {
    let state = state_abbrev.to_lowercase();
    let landing = format!("{LIBRARY_BASE_URL}/{state}/{slug}");
    surface.navigate(&landing, WaitPolicy::Load).await?;

    for pattern in CODE_PATH_PATTERNS {
        let selector = format!("a[href*='{pattern}']");
        if let Some(anchor) = surface.find_one(&selector, ANCHOR_TIMEOUT).await?
            && let Some(href) = surface.read_attribute(&anchor, "href").await?
        {
            let url = absolutize(&href);
            info!(slug, url = url.as_str(), "Resolved codes URL");
            return Ok(Some(url));
        }
    }
    debug!(slug, "No codes link found");
    Ok(None)
}

/// Extract a state code from an href of the form `.../{xx}` where `xx` is
/// two letters.
fn state_code(href: &str) -> Option<String> {
    let pattern = Regex::new(r"(?i)^(?:https?://[^/]+)?/([a-z]{2})/?$").ok()?;
    let trimmed = href.strip_prefix(LIBRARY_BASE_URL).unwrap_or(href);
    let code = pattern.captures(trimmed)?.get(1)?.as_str().to_lowercase();
    Some(code)
}

/// Extract the municipality slug from an href of the form
/// `.../{state}/{slug}` (more path segments mean it is a deep link, not a
/// municipality landing page).
fn municipality_slug(href: &str, state: &str) -> Option<String> {
    let pattern = Regex::new(&format!(
        r"(?i)/{}/([A-Za-z0-9_\-]+)/?$",
        regex::escape(state)
    ))
    .ok()?;
    let slug = pattern.captures(href)?.get(1)?.as_str().to_lowercase();
    if RESERVED_SEGMENTS.contains(&slug.as_str()) {
        return None;
    }
    Some(slug)
}

fn absolutize(href: &str) -> String {
    match Url::parse(href) {
        Ok(url) => url.to_string(),
        Err(_) => Url::parse(LIBRARY_BASE_URL)
            .and_then(|base| base.join(href))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}/{}", LIBRARY_BASE_URL, href.trim_start_matches('/'))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_extraction() {
        assert_eq!(
            municipality_slug("https://library.municode.com/fl/gainesville", "fl"),
            Some("gainesville".to_string())
        );
        assert_eq!(municipality_slug("/fl/alachua_county/", "fl"), Some("alachua_county".to_string()));
        // deep links and reserved segments are not municipalities
        assert_eq!(
            municipality_slug("/fl/gainesville/codes/code_of_ordinances", "fl"),
            None
        );
        assert_eq!(municipality_slug("/fl/browse", "fl"), None);
        assert_eq!(municipality_slug("/ga/atlanta", "fl"), None);
    }

    #[test]
    fn state_code_extraction() {
        assert_eq!(
            state_code("https://library.municode.com/fl"),
            Some("fl".to_string())
        );
        assert_eq!(state_code("/GA/"), Some("ga".to_string()));
        assert_eq!(state_code("/fl/gainesville"), None);
        assert_eq!(state_code("/browse"), None);
    }

    #[test]
    fn absolutize_handles_relative_hrefs() {
        assert_eq!(
            absolutize("/fl/gainesville/codes/code_of_ordinances"),
            "https://library.municode.com/fl/gainesville/codes/code_of_ordinances"
        );
        assert_eq!(absolutize("https://x.test/a"), "https://x.test/a");
    }
}
