use crate::clock::TimeSource;
use crate::errors::StoreResult;
use crate::models::{DailyStats, DayRecord, HostData, StopwatchSnapshot, TodoItem};
use crate::storage::{BackendKind, PersistenceBackend};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::{fs, sync::Mutex};
use tracing::{debug, error, info};

pub struct HostStore {
    path: PathBuf,
    data: Mutex<HostData>,
    load_error: Mutex<Option<String>>,
    clock: Arc<dyn TimeSource>,
}

impl HostStore {
    pub async fn open(path: PathBuf, clock: Arc<dyn TimeSource>) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let (data, load_error) = match load_data(&path).await {
            Ok(data) => (data, None),
            Err(err) => {
                error!("failed to load host data file {}: {err}", path.display());
                (HostData::default(), Some(err.to_string()))
            }
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
            load_error: Mutex::new(load_error),
            clock,
        })
    }

    pub async fn data(&self) -> HostData {
        self.data.lock().await.clone()
    }

    /// Writes `next` to disk and only then makes it the served state.
    async fn commit(&self, data: &mut HostData, next: HostData) -> StoreResult<()> {
        persist_data(&self.path, &next).await?;
        *data = next;
        Ok(())
    }
}

/// A missing file is an empty document; anything unreadable is an error.
pub async fn load_data(path: &Path) -> StoreResult<HostData> {
    match fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HostData::default()),
        Err(err) => Err(err.into()),
    }
}

pub async fn persist_data(path: &Path, data: &HostData) -> StoreResult<()> {
    let payload = serde_json::to_vec_pretty(data)?;
    fs::write(path, payload).await?;
    Ok(())
}

/// Credits today's record with running time and laps added since the
/// previous save. Shrinking snapshots (lap deletion, imports of older state)
/// credit nothing.
fn record_stopwatch_activity(
    day: &mut DayRecord,
    previous: Option<&StopwatchSnapshot>,
    next: &StopwatchSnapshot,
) {
    let prev_elapsed = previous.map_or(0, |s| s.elapsed_ms);
    day.focus_time_ms = day
        .focus_time_ms
        .saturating_add(next.elapsed_ms.saturating_sub(prev_elapsed));

    let prev_laps: &[u64] = previous.map(|s| s.lap_totals_ms.as_slice()).unwrap_or_default();
    if next.lap_totals_ms.len() <= prev_laps.len() || !next.lap_totals_ms.starts_with(prev_laps) {
        return;
    }
    for index in prev_laps.len()..next.lap_totals_ms.len() {
        let before = if index == 0 {
            0
        } else {
            next.lap_totals_ms[index - 1]
        };
        let split = next.lap_totals_ms[index].saturating_sub(before);
        day.lap_count = day.lap_count.saturating_add(1);
        day.lap_time_total_ms = day.lap_time_total_ms.saturating_add(split);
    }
}

fn count_newly_completed(previous: &[TodoItem], next: &[TodoItem]) -> u64 {
    next.iter()
        .filter(|task| task.completed)
        .filter(|task| {
            !previous
                .iter()
                .any(|old| old.id == task.id && old.completed)
        })
        .count() as u64
}

#[async_trait]
impl PersistenceBackend for HostStore {
    fn kind(&self) -> BackendKind {
        BackendKind::NativeHost
    }

    async fn get_stopwatch_state(&self) -> Option<StopwatchSnapshot> {
        self.data.lock().await.stopwatch.clone()
    }

    async fn set_stopwatch_state(&self, snapshot: StopwatchSnapshot) -> StoreResult<StopwatchSnapshot> {
        let today = self.clock.today();
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let day = next.days.entry(today).or_default();
        record_stopwatch_activity(day, data.stopwatch.as_ref(), &snapshot);
        next.stopwatch = Some(snapshot.clone());

        self.commit(&mut data, next).await?;
        debug!("host stored stopwatch at {}ms", snapshot.elapsed_ms);
        Ok(snapshot)
    }

    async fn clear_stopwatch_state(&self) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        let next = HostData {
            stopwatch: None,
            ..data.clone()
        };
        self.commit(&mut data, next).await?;
        Ok(true)
    }

    async fn get_tasks(&self) -> Vec<TodoItem> {
        self.data.lock().await.tasks.clone()
    }

    async fn set_tasks(&self, tasks: Vec<TodoItem>) -> StoreResult<Vec<TodoItem>> {
        let today = self.clock.today();
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let completed = count_newly_completed(&data.tasks, &tasks);
        if completed > 0 {
            let day = next.days.entry(today).or_default();
            day.tasks_completed = day.tasks_completed.saturating_add(completed);
        }
        next.tasks = tasks.clone();
        self.commit(&mut data, next).await?;
        Ok(tasks)
    }

    async fn append_task(&self, task: TodoItem) -> StoreResult<Vec<TodoItem>> {
        let today = self.clock.today();
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let day = next.days.entry(today).or_default();
        day.tasks_created = day.tasks_created.saturating_add(1);
        if task.completed {
            day.tasks_completed = day.tasks_completed.saturating_add(1);
        }
        next.tasks.insert(0, task);
        let tasks = next.tasks.clone();
        self.commit(&mut data, next).await?;
        Ok(tasks)
    }

    async fn get_daily_stats(&self, date: NaiveDate) -> DailyStats {
        let data = self.data.lock().await;
        data.days
            .get(&date)
            .map(|day| day.to_daily_stats(date))
            .unwrap_or_else(|| DailyStats::zeroed(date))
    }

    async fn storage_error(&self) -> Option<String> {
        self.load_error.lock().await.clone()
    }

    async fn reset_storage(&self) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        *data = HostData::default();
        *self.load_error.lock().await = None;
        info!("host storage reset at {}", self.path.display());
        Ok(())
    }
}
