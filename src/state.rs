use crate::clock::TimeSource;
use crate::engine::StopwatchEngine;
use crate::stats::StatsAggregator;
use crate::storage::PersistenceBackend;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one interactive session owns.
pub struct Session {
    pub backend: Arc<dyn PersistenceBackend>,
    pub clock: Arc<dyn TimeSource>,
    pub engine: StopwatchEngine,
    pub stats: StatsAggregator,
}

impl Session {
    pub async fn start(backend: Arc<dyn PersistenceBackend>, clock: Arc<dyn TimeSource>) -> Self {
        let engine = StopwatchEngine::restore(backend.clone(), clock.clone()).await;
        let stats = StatsAggregator::new(backend.clone());
        info!("session started on {:?} backend", backend.kind());
        if let Some(err) = backend.storage_error().await {
            warn!("stored data could not be loaded, run reset-storage to start over: {err}");
        }
        Self {
            backend,
            clock,
            engine,
            stats,
        }
    }

    /// Rebuilds the engine from the store, e.g. after an import.
    pub async fn reinitialize(&mut self) {
        self.engine.flush().await;
        self.engine = StopwatchEngine::restore(self.backend.clone(), self.clock.clone()).await;
    }

    pub async fn shutdown(&self) {
        self.engine.flush().await;
        info!("session closed");
    }
}
