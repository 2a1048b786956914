//! Configuration for collection runs
//!
//! Provides the `CollectConfig` struct and its type-safe builder; the two
//! required fields (download root and resource URL) are enforced at compile
//! time via the typestate pattern.

pub mod builder;
pub mod types;

pub use builder::{CollectConfigBuilder, WithDownloadRoot, WithResourceUrl};
pub use types::CollectConfig;
