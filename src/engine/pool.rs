//! Bounded worker pool for independent collection units.
//!
//! Workers pull from a shared queue; each unit is processed by a handler
//! that builds (and tears down) its own browser session, so at most
//! `worker_count` sessions are ever alive. Results go through one coarse
//! lock — contention is irrelevant next to download time.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::error::EngineError;

/// One independent unit of work (one municipality, one resource root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// External identifier of the unit, e.g. a municipality slug.
    pub external_ref: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl WorkUnit {
    pub fn new(external_ref: impl Into<String>) -> Self {
        Self {
            external_ref: external_ref.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct PoolOutcome {
    pub succeeded: Vec<WorkUnit>,
    pub failed: Vec<(WorkUnit, String)>,
}

pub struct WorkerPool {
    worker_count: usize,
    shutdown_deadline: Duration,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
            shutdown_deadline: Duration::from_secs(300),
        }
    }

    pub fn with_shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.shutdown_deadline = deadline;
        self
    }

    /// Process every unit with at most `worker_count` concurrent handlers.
    ///
    /// A handler error fails that unit only, unless it is a fatal engine
    /// error, in which case the worker that hit it stops pulling further
    /// units. When the shutdown deadline passes, workers are aborted and
    /// their in-flight units reported as failed; units still queued are
    /// reported as failed too. Every unit appears in exactly one outcome
    /// bucket, never silently dropped.
    pub async fn run_all<F, Fut>(&self, units: Vec<WorkUnit>, handler: F) -> PoolOutcome
    where
        F: Fn(WorkUnit) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let total = units.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(units)));
        let outcome = Arc::new(Mutex::new(PoolOutcome::default()));
        let in_flight: Arc<Mutex<HashMap<usize, WorkUnit>>> =
            Arc::new(Mutex::new(HashMap::new()));

        info!(total, workers = self.worker_count, "Starting worker pool");

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let queue = Arc::clone(&queue);
            let outcome = Arc::clone(&outcome);
            let in_flight = Arc::clone(&in_flight);
            let handler = handler.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let unit = queue.lock().await.pop_front();
                    let Some(unit) = unit else { break };
                    info!(worker_id, unit = %unit.external_ref, "Processing unit");
                    in_flight.lock().await.insert(worker_id, unit.clone());
                    let result = handler(unit.clone()).await;
                    match result {
                        Ok(()) => outcome.lock().await.succeeded.push(unit),
                        Err(e) => {
                            let fatal = e
                                .downcast_ref::<EngineError>()
                                .is_some_and(EngineError::is_fatal);
                            warn!(
                                worker_id,
                                unit = %unit.external_ref,
                                error = %e,
                                "Unit failed"
                            );
                            outcome.lock().await.failed.push((unit, e.to_string()));
                            if fatal {
                                error!(worker_id, "Fatal error, worker stopping");
                                in_flight.lock().await.remove(&worker_id);
                                break;
                            }
                        }
                    }
                    in_flight.lock().await.remove(&worker_id);
                }
            }));
        }

        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        if timeout(self.shutdown_deadline, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(
                deadline_secs = self.shutdown_deadline.as_secs(),
                "Shutdown deadline reached, aborting workers"
            );
            for handle in &abort_handles {
                handle.abort();
            }
            // units a worker had popped but not finished; skip any the
            // worker managed to record before the abort landed
            let mut in_flight = in_flight.lock().await;
            let mut outcome = outcome.lock().await;
            for (_, unit) in in_flight.drain() {
                let already_recorded = outcome.succeeded.contains(&unit)
                    || outcome.failed.iter().any(|(u, _)| u == &unit);
                if !already_recorded {
                    outcome
                        .failed
                        .push((unit, "aborted at shutdown deadline".to_string()));
                }
            }
        }

        // anything never picked up still gets accounted for
        {
            let mut queue = queue.lock().await;
            let mut outcome = outcome.lock().await;
            while let Some(unit) = queue.pop_front() {
                outcome
                    .failed
                    .push((unit, "aborted before processing".to_string()));
            }
        }

        let outcome = outcome.lock().await.clone();
        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Worker pool finished"
        );
        outcome
    }
}
