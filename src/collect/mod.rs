//! Collectors: the orchestration layer that turns a configured resource
//! into downloaded artifacts plus a run summary.

pub mod library;
pub mod municode;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::engine::RunSummary;

/// A source of municipal documents.
///
/// One implementation per site family; the Municode collector is the only
/// one today, but the discovery CLI and upload plumbing only speak this
/// trait.
#[async_trait]
pub trait Collector: Send {
    /// URL of the resource root this collector drives.
    fn resource_url(&self) -> &str;

    /// Local directory artifacts land in.
    fn download_directory(&self) -> PathBuf;

    /// Prefix under which artifacts are mirrored to the object store.
    fn remote_prefix(&self) -> String;

    /// Run the full collection: discovery, downloads, retry pass, upload.
    async fn collect(&mut self) -> Result<RunSummary>;
}
