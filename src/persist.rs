use crate::models::StopwatchSnapshot;
use crate::storage::PersistenceBackend;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, warn};

const FAILURE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOp {
    Save,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistFailure {
    pub op: PersistOp,
    pub message: String,
}

enum Job {
    Save(StopwatchSnapshot),
    Clear,
    Flush(oneshot::Sender<()>),
}

pub struct PersistWriter {
    jobs: mpsc::UnboundedSender<Job>,
    failures: broadcast::Sender<PersistFailure>,
}

impl PersistWriter {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(backend: Arc<dyn PersistenceBackend>) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(FAILURE_CAPACITY);
        tokio::spawn(run_worker(backend, rx, failures.clone()));
        Self { jobs, failures }
    }

    pub fn save(&self, snapshot: StopwatchSnapshot) {
        self.submit(Job::Save(snapshot));
    }

    pub fn clear(&self) {
        self.submit(Job::Clear);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PersistFailure> {
        self.failures.subscribe()
    }

    /// Waits until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.jobs.send(Job::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    fn submit(&self, job: Job) {
        let op = match job {
            Job::Clear => PersistOp::Clear,
            _ => PersistOp::Save,
        };
        if self.jobs.send(job).is_err() {
            let failure = PersistFailure {
                op,
                message: crate::errors::StoreError::WriterClosed.to_string(),
            };
            error!("dropping stopwatch write: {}", failure.message);
            let _ = self.failures.send(failure);
        }
    }
}

async fn run_worker(
    backend: Arc<dyn PersistenceBackend>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    failures: broadcast::Sender<PersistFailure>,
) {
    while let Some(job) = jobs.recv().await {
        let outcome = match job {
            Job::Save(snapshot) => {
                let elapsed = snapshot.elapsed_ms;
                backend
                    .set_stopwatch_state(snapshot)
                    .await
                    .map(|_| debug!("persisted stopwatch snapshot at {elapsed}ms"))
                    .map_err(|err| (PersistOp::Save, err))
            }
            Job::Clear => backend
                .clear_stopwatch_state()
                .await
                .map(|cleared| {
                    if !cleared {
                        warn!("backend reported nothing to clear");
                    }
                })
                .map_err(|err| (PersistOp::Clear, err)),
            Job::Flush(done) => {
                let _ = done.send(());
                Ok(())
            }
        };

        if let Err((op, err)) = outcome {
            error!("stopwatch persistence {op:?} failed: {err}");
            let _ = failures.send(PersistFailure {
                op,
                message: err.to_string(),
            });
        }
    }
}
