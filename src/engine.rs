use crate::clock::TimeSource;
use crate::models::{LapEntry, Phase, StopwatchSnapshot};
use crate::persist::{PersistFailure, PersistWriter};
use crate::storage::{BackendKind, PersistenceBackend};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunState {
    pub phase: Phase,
    /// Start of the current running interval; only set while running.
    pub started_at_ms: Option<u64>,
    /// Time banked from finished running intervals.
    pub accumulated_ms: u64,
}

impl RunState {
    pub fn elapsed_at(&self, now_ms: u64) -> u64 {
        match (self.phase, self.started_at_ms) {
            (Phase::Running, Some(started)) => self
                .accumulated_ms
                .saturating_add(now_ms.saturating_sub(started)),
            _ => self.accumulated_ms,
        }
    }
}

/// Numbers laps and derives splits from their positions in `totals`.
///
/// Results are in chronological order; reverse afterwards for display.
pub fn lap_entries(totals: &[u64]) -> Vec<LapEntry> {
    let mut previous = 0;
    totals
        .iter()
        .enumerate()
        .map(|(index, &total_ms)| {
            let entry = LapEntry {
                lap_no: index + 1,
                total_ms,
                split_ms: total_ms.saturating_sub(previous),
            };
            previous = total_ms;
            entry
        })
        .collect()
}

pub struct StopwatchEngine {
    clock: Arc<dyn TimeSource>,
    writer: PersistWriter,
    state: RunState,
    lap_totals_ms: Vec<u64>,
    state_tx: watch::Sender<RunState>,
}

impl StopwatchEngine {
    /// Fresh engine in `ready` with nothing loaded from the backend.
    pub fn new(backend: Arc<dyn PersistenceBackend>, clock: Arc<dyn TimeSource>) -> Self {
        let (state_tx, _) = watch::channel(RunState::default());
        Self {
            clock,
            writer: PersistWriter::spawn(backend),
            state: RunState::default(),
            lap_totals_ms: Vec::new(),
            state_tx,
        }
    }

    /// Loads the last snapshot and lands in `paused`, whatever was saved.
    pub async fn restore(backend: Arc<dyn PersistenceBackend>, clock: Arc<dyn TimeSource>) -> Self {
        let loaded = backend.get_stopwatch_state().await;
        let kind = backend.kind();
        let mut engine = Self::new(backend, clock);

        let snapshot = loaded.clone().unwrap_or_default();
        engine.state = RunState {
            phase: Phase::Paused,
            started_at_ms: None,
            accumulated_ms: snapshot.elapsed_ms,
        };
        engine.lap_totals_ms = snapshot.lap_totals_ms;
        engine.publish();

        if let Some(snapshot) = loaded {
            info!(
                "restored stopwatch at {}ms with {} laps",
                snapshot.elapsed_ms,
                snapshot.lap_totals_ms.len()
            );
            if kind == BackendKind::LocalFallback {
                engine.writer.save(engine.snapshot());
            }
        }
        engine
    }

    pub fn start(&mut self) -> bool {
        if self.state.phase.is_running() {
            return false;
        }
        self.state.phase = Phase::Running;
        self.state.started_at_ms = Some(self.clock.now_ms());
        debug!("stopwatch started from {}ms", self.state.accumulated_ms);
        self.publish();
        true
    }

    pub fn stop(&mut self) -> bool {
        if !self.state.phase.is_running() {
            return false;
        }
        self.state.accumulated_ms = self.current_elapsed_ms();
        self.state.started_at_ms = None;
        self.state.phase = Phase::Paused;
        debug!("stopwatch paused at {}ms", self.state.accumulated_ms);
        self.publish();
        self.persist();
        true
    }

    /// Single start/pause button.
    pub fn toggle(&mut self) -> Phase {
        if self.state.phase.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.state.phase
    }

    pub fn reset(&mut self) {
        self.state = RunState::default();
        self.lap_totals_ms.clear();
        debug!("stopwatch reset");
        self.publish();
        self.writer.clear();
    }

    /// Records the current elapsed time as a lap. Ignored at zero elapsed.
    pub fn lap(&mut self) -> Option<LapEntry> {
        let current = self.current_elapsed_ms();
        if current == 0 {
            return None;
        }
        self.lap_totals_ms.push(current);
        self.persist();
        lap_entries(&self.lap_totals_ms).pop()
    }

    /// Removes the lap at `index` (0-based). Out-of-range indexes are ignored.
    pub fn delete_lap(&mut self, index: usize) -> bool {
        if index >= self.lap_totals_ms.len() {
            return false;
        }
        self.lap_totals_ms.remove(index);
        self.persist();
        true
    }

    pub fn clear_laps(&mut self) {
        self.lap_totals_ms.clear();
        self.persist();
    }

    pub fn current_elapsed_ms(&self) -> u64 {
        self.state.elapsed_at(self.clock.now_ms())
    }

    pub fn laps(&self) -> Vec<LapEntry> {
        lap_entries(&self.lap_totals_ms)
    }

    pub fn lap_totals_ms(&self) -> &[u64] {
        &self.lap_totals_ms
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            elapsed_ms: self.current_elapsed_ms(),
            lap_totals_ms: self.lap_totals_ms.clone(),
        }
    }

    /// Receives the run state after every transition.
    pub fn watch(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<PersistFailure> {
        self.writer.subscribe()
    }

    /// Waits for every queued write to be attempted.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    fn persist(&self) {
        self.writer.save(self.snapshot());
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state);
    }
}
