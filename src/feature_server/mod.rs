//! Client for ArcGIS-style feature services.
//!
//! Enumerates a service's layers and pulls every feature from each. Layers
//! that advertise `supportsPagination` are read with offset windows; the
//! rest fall back to fetching all object ids and POSTing them back in
//! `maxRecordCount`-sized chunks. Raw feature JSON is returned untouched.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const DEFAULT_MAX_RECORD_COUNT: usize = 1_000;

#[derive(Debug, Deserialize)]
struct ServiceInfo {
    #[serde(default)]
    layers: Vec<LayerSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerSummary {
    pub id: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct LayerDetail {
    #[serde(default, rename = "supportsPagination")]
    supports_pagination: bool,
    #[serde(default = "default_max_record_count", rename = "maxRecordCount")]
    max_record_count: usize,
}

fn default_max_record_count() -> usize {
    DEFAULT_MAX_RECORD_COUNT
}

#[derive(Debug, Default, Deserialize)]
struct QueryPage {
    #[serde(default)]
    features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct IdsResponse {
    #[serde(default, rename = "objectIds")]
    object_ids: Option<Vec<i64>>,
}

pub struct FeatureServerClient {
    http: reqwest::Client,
    empty_retry_attempts: u32,
    retry_backoff: Duration,
    page_delay: Duration,
}

impl Default for FeatureServerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureServerClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            empty_retry_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            page_delay: Duration::from_millis(200),
        }
    }

    /// Shrink the fixed backoff; tests use this to avoid real waits.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// List the layers a feature service exposes.
    pub async fn service_layers(&self, service_url: &str) -> Result<Vec<LayerSummary>> {
        let info: ServiceInfo = self
            .http
            .get(service_url)
            .query(&[("f", "json")])
            .send()
            .await
            .context("Service info request failed")?
            .error_for_status()
            .context("Service info request rejected")?
            .json()
            .await
            .context("Service info was not valid JSON")?;
        Ok(info.layers)
    }

    /// Fetch every feature of one layer.
    pub async fn fetch_layer(&self, service_url: &str, layer: &LayerSummary) -> Result<Vec<Value>> {
        let layer_url = format!("{}/{}", service_url.trim_end_matches('/'), layer.id);
        let detail: LayerDetail = self
            .http
            .get(&layer_url)
            .query(&[("f", "json")])
            .send()
            .await
            .context("Layer info request failed")?
            .error_for_status()
            .context("Layer info request rejected")?
            .json()
            .await
            .context("Layer info was not valid JSON")?;

        let query_url = format!("{layer_url}/query");
        let features = if detail.supports_pagination {
            self.fetch_paginated(&query_url, detail.max_record_count)
                .await?
        } else {
            debug!(
                layer = layer.name.as_str(),
                "Layer does not support pagination, falling back to id chunking"
            );
            self.fetch_chunked(&query_url, detail.max_record_count)
                .await?
        };

        info!(
            layer = layer.name.as_str(),
            features = features.len(),
            "Fetched layer"
        );
        Ok(features)
    }

    /// Fetch every feature of every layer. A failing layer is skipped, not
    /// fatal to the whole service.
    pub async fn download_all(&self, service_url: &str) -> Result<Vec<Value>> {
        let layers = self.service_layers(service_url).await?;
        info!(layers = layers.len(), service_url, "Enumerated feature service");

        let mut all = Vec::new();
        for layer in &layers {
            match self.fetch_layer(service_url, layer).await {
                Ok(mut features) => all.append(&mut features),
                Err(e) => warn!(
                    layer = layer.name.as_str(),
                    "Skipping layer after error: {:#}", e
                ),
            }
        }
        Ok(all)
    }

    async fn fetch_paginated(&self, query_url: &str, window: usize) -> Result<Vec<Value>> {
        let mut features = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = self
                .query_with_retry(|| {
                    self.http
                        .get(query_url)
                        .query(&[
                            ("where", "1=1"),
                            ("outFields", "*"),
                            ("returnGeometry", "true"),
                            ("f", "json"),
                            ("resultOffset", &offset.to_string()),
                            ("resultRecordCount", &window.to_string()),
                        ])
                        .send()
                })
                .await?;

            let got = page.features.len();
            debug!(offset, got, "Fetched feature page");
            features.extend(page.features);
            if got == 0 || got < window {
                break;
            }
            offset += got;
            sleep(self.page_delay).await;
        }
        Ok(features)
    }

    async fn fetch_chunked(&self, query_url: &str, chunk_size: usize) -> Result<Vec<Value>> {
        let ids: IdsResponse = self
            .http
            .get(query_url)
            .query(&[("where", "1=1"), ("returnIdsOnly", "true"), ("f", "json")])
            .send()
            .await
            .context("Object id request failed")?
            .error_for_status()
            .context("Object id request rejected")?
            .json()
            .await
            .context("Object id response was not valid JSON")?;

        let Some(ids) = ids.object_ids.filter(|ids| !ids.is_empty()) else {
            warn!("Layer returned no object ids");
            return Ok(Vec::new());
        };

        let mut features = Vec::new();
        for chunk in ids.chunks(chunk_size.max(1)) {
            let joined = chunk
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let page = self
                .query_with_retry(|| {
                    self.http
                        .post(query_url)
                        .form(&[
                            ("objectIds", joined.as_str()),
                            ("outFields", "*"),
                            ("returnGeometry", "true"),
                            ("f", "json"),
                        ])
                        .send()
                })
                .await?;
            debug!(chunk = chunk.len(), got = page.features.len(), "Fetched id chunk");
            features.extend(page.features);
            sleep(self.page_delay).await;
        }
        Ok(features)
    }

    /// Run one query, retrying transient failures (HTTP errors or an empty
    /// body) with a fixed backoff. An exhausted budget of empty bodies
    /// yields an empty page so pagination can terminate; an exhausted
    /// budget of HTTP failures is an error, never silent truncation.
    async fn query_with_retry<F, Fut>(&self, request: F) -> Result<QueryPage>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = reqwest::Result<reqwest::Response>>,
    {
        let mut last_error: Option<anyhow::Error> = None;
        for attempt in 1..=self.empty_retry_attempts {
            match request().await {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await.unwrap_or_default();
                    if !body.trim().is_empty() {
                        return serde_json::from_str(&body)
                            .context("Query response was not valid JSON");
                    }
                    warn!(attempt, "Empty query response");
                    last_error = None;
                }
                Ok(response) => {
                    warn!(
                        attempt,
                        status = %response.status(),
                        "Query rejected"
                    );
                    last_error =
                        Some(anyhow!("query rejected with status {}", response.status()));
                }
                Err(e) => {
                    warn!(attempt, "Query request failed: {}", e);
                    last_error = Some(e.into());
                }
            }
            if attempt < self.empty_retry_attempts {
                sleep(self.retry_backoff).await;
            }
        }
        match last_error {
            Some(e) => Err(e.context("query retries exhausted")),
            None => {
                warn!("Query retry budget exhausted, treating as empty page");
                Ok(QueryPage::default())
            }
        }
    }
}
