//! The download engine: tree discovery, the per-section download state
//! machine and its collaborators (completion watcher, retry queue, rotation
//! policy, progress index), and the bounded worker pool.

pub mod discovery;
pub mod error;
pub mod panel;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod rotation;
pub mod section;
pub mod selectors;
pub mod task;
pub mod watcher;

pub use discovery::TreeDiscovery;
pub use error::{EngineError, EngineResult};
pub use pool::{PoolOutcome, WorkUnit, WorkerPool};
pub use progress::{FailureReport, ProgressIndex, RunSummary};
pub use retry::RetryQueue;
pub use rotation::SessionRotationPolicy;
pub use section::{Phase, SectionDownloader};
pub use selectors::PanelSelectors;
pub use task::{DownloadTask, TaskStatus, TreeNode, PATH_SEPARATOR};
pub use watcher::{CompletionResult, DownloadWatcher};
