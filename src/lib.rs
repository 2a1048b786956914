pub mod browser;
pub mod collect;
pub mod config;
pub mod db;
pub mod engine;
pub mod feature_server;
pub mod storage;

pub use browser::{
    AutomationSurface, BrowserIdentity, BrowserSession, CdpSessionFactory, SessionFactory,
    WaitPolicy,
};
pub use collect::municode::MunicodeCollector;
pub use collect::Collector;
pub use config::CollectConfig;
pub use engine::{
    CompletionResult, DownloadTask, DownloadWatcher, EngineError, PanelSelectors, PoolOutcome,
    ProgressIndex, RetryQueue, RunSummary, SectionDownloader, SessionRotationPolicy, TaskStatus,
    TreeDiscovery, WorkUnit, WorkerPool,
};
pub use feature_server::FeatureServerClient;
pub use storage::{LocalMirrorStore, ObjectStore};
