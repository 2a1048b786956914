//! Engine error taxonomy.
//!
//! The split that matters to callers: `Discovery` and `Session` mean the run
//! (or the owning worker's pipeline) cannot continue; everything else is a
//! per-task failure that goes to the retry queue.

use std::time::Duration;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Download panel or tree root could not be located.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// A node's selection toggle could not be driven to the checked state.
    #[error("selection of node {node_id} failed: {reason}")]
    Selection { node_id: String, reason: String },

    /// The download trigger was missing or disabled.
    #[error("download trigger unusable: {0}")]
    Trigger(String),

    /// No completed artifact appeared before the deadline.
    #[error(
        "no completed artifact within {timeout:?} \
         ({total} matching files, {new} new, {incomplete} in progress)"
    )]
    ArtifactTimeout {
        timeout: Duration,
        total: usize,
        new: usize,
        incomplete: usize,
    },

    /// The browser session itself is unusable.
    #[error("browser session error: {0}")]
    Session(#[from] anyhow::Error),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Errors that end the owning pipeline instead of a single task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Discovery(_) | Self::Session(_))
    }
}
