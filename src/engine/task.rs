//! Task model: discovered tree nodes and the download work derived from
//! them.

use serde::{Deserialize, Serialize};

/// Separator between heading segments in an artifact file name. Chosen for
/// being visually distinct and never appearing in municipal code headings.
pub const PATH_SEPARATOR: &str = "⫸";

/// A node in the document tree as rendered by the selection panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Stable site-assigned identifier (the `data-nodeid` attribute).
    pub id: String,
    pub heading: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

/// One unit of download work: a single selectable section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Heading path from the tree root down to this node.
    pub path_segments: Vec<String>,
    /// Parent to expand before this node becomes selectable. `None` for
    /// top-level nodes.
    pub parent_id: Option<String>,
    pub node_id: String,
    /// Final artifact file name, derived from `path_segments`.
    pub target_name: String,
    #[serde(default)]
    pub attempts: u8,
    pub status: TaskStatus,
}

impl DownloadTask {
    pub fn new(
        path_segments: Vec<String>,
        parent_id: Option<String>,
        node_id: impl Into<String>,
        extension: &str,
    ) -> Self {
        let target_name = target_name(&path_segments, extension);
        Self {
            path_segments,
            parent_id,
            node_id: node_id.into(),
            target_name,
            attempts: 0,
            status: TaskStatus::Pending,
        }
    }

    /// Human-readable label for logs.
    pub fn label(&self) -> String {
        self.path_segments.join(" > ")
    }
}

/// Derive the artifact file name for a heading path.
///
/// Deterministic: the same segments always produce the same name, which is
/// what makes artifact existence usable as a progress index.
pub fn target_name(segments: &[String], extension: &str) -> String {
    let joined = segments.join(PATH_SEPARATOR);
    format!("{}{}", sanitize_filename::sanitize(joined), extension)
}
