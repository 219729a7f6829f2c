use crate::clock::TimeSource;
use crate::engine::RunState;
use crate::models::LapEntry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// `MM:SS.cc`; minutes keep growing past 59.
pub fn format_stopwatch(ms: u64) -> String {
    let total_centis = ms / 10;
    let centis = total_centis % 100;
    let total_seconds = total_centis / 100;
    let seconds = total_seconds % 60;
    let minutes = total_seconds / 60;
    format!("{minutes:02}:{seconds:02}.{centis:02}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LapRow {
    pub index: usize,
    pub label: String,
    pub total: String,
    pub split: String,
}

/// Lap rows newest first. `index` is the position to pass to `delete_lap`.
pub fn lap_rows(laps: &[LapEntry]) -> Vec<LapRow> {
    laps.iter()
        .rev()
        .map(|lap| LapRow {
            index: lap.lap_no - 1,
            label: format!("Lap {}", lap.lap_no),
            total: format_stopwatch(lap.total_ms),
            split: format!("+{}", format_stopwatch(lap.split_ms)),
        })
        .collect()
}

/// Calls `on_tick` with the recomputed elapsed time every `period` while the
/// stopwatch runs, and idles otherwise. Ends when the engine is dropped.
pub fn spawn_ticker<F>(
    mut state: watch::Receiver<RunState>,
    clock: Arc<dyn TimeSource>,
    period: Duration,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut(u64) + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let current = *state.borrow_and_update();
            if current.phase.is_running() {
                tokio::select! {
                    _ = interval.tick() => on_tick(current.elapsed_at(clock.now_ms())),
                    changed = state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            } else {
                on_tick(current.accumulated_ms);
                if state.changed().await.is_err() {
                    break;
                }
                interval.reset();
            }
        }
    })
}
