use crate::errors::StoreResult;
use crate::models::{DailyStats, StopwatchSnapshot, TodoItem};
use crate::storage::{BackendKind, PersistenceBackend};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

pub const STOPWATCH_KEY: &str = "todo_app_stopwatch_state_v1";
pub const TASKS_KEY: &str = "todo_app_tasks_v1";

pub struct FallbackStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FallbackStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn open(path: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let entries = load_entries(&path).await;
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Raw access, mostly for tests that need to plant malformed values.
    pub async fn set_raw(&self, key: &str, value: impl Into<String>) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.into());
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }

    pub async fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let payload = serde_json::to_vec_pretty(entries)?;
        fs::write(path, payload).await?;
        debug!("local store written to {}", path.display());
        Ok(())
    }

    async fn read_json(&self, key: &str) -> Option<Value> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("ignoring unreadable local value for {key}: {err}");
                None
            }
        }
    }

    async fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, raw).await
    }
}

async fn load_entries(path: &Path) -> BTreeMap<String, String> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to parse local store, starting empty: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            warn!("failed to read local store, starting empty: {err}");
            BTreeMap::new()
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl PersistenceBackend for FallbackStore {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalFallback
    }

    async fn get_stopwatch_state(&self) -> Option<StopwatchSnapshot> {
        let value = self.read_json(STOPWATCH_KEY).await?;
        if is_falsy(&value) {
            return None;
        }
        Some(StopwatchSnapshot::from_value(&value))
    }

    async fn set_stopwatch_state(&self, snapshot: StopwatchSnapshot) -> StoreResult<StopwatchSnapshot> {
        self.write_json(STOPWATCH_KEY, &snapshot).await?;
        Ok(snapshot)
    }

    async fn clear_stopwatch_state(&self) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.remove(STOPWATCH_KEY);
        self.flush(&next).await?;
        *entries = next;
        Ok(true)
    }

    async fn get_tasks(&self) -> Vec<TodoItem> {
        match self.read_json(TASKS_KEY).await {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    async fn set_tasks(&self, tasks: Vec<TodoItem>) -> StoreResult<Vec<TodoItem>> {
        self.write_json(TASKS_KEY, &tasks).await?;
        Ok(tasks)
    }

    async fn append_task(&self, task: TodoItem) -> StoreResult<Vec<TodoItem>> {
        let mut tasks = self.get_tasks().await;
        tasks.insert(0, task);
        self.set_tasks(tasks).await
    }

    async fn get_daily_stats(&self, date: NaiveDate) -> DailyStats {
        DailyStats::zeroed(date)
    }

    async fn reset_storage(&self) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        self.flush(&BTreeMap::new()).await?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_path() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "focus_widget_local_{}_{nanos}.json",
            std::process::id()
        ))
    }

    fn task(id: u64, text: &str) -> TodoItem {
        TodoItem {
            id,
            text: text.to_string(),
            completed: false,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn stopwatch_state_round_trips() {
        let store = FallbackStore::in_memory();
        assert_eq!(store.get_stopwatch_state().await, None);

        let snapshot = StopwatchSnapshot {
            elapsed_ms: 4_000,
            lap_totals_ms: vec![1_000, 2_500, 2_500],
        };
        let echoed = store.set_stopwatch_state(snapshot.clone()).await.unwrap();
        assert_eq!(echoed, snapshot);
        assert_eq!(store.get_stopwatch_state().await, Some(snapshot));
    }

    #[tokio::test]
    async fn clear_removes_the_key() {
        let store = FallbackStore::in_memory();
        store
            .set_stopwatch_state(StopwatchSnapshot::default())
            .await
            .unwrap();
        assert!(store.clear_stopwatch_state().await.unwrap());
        assert_eq!(store.get_raw(STOPWATCH_KEY).await, None);
        assert_eq!(store.get_stopwatch_state().await, None);
    }

    #[tokio::test]
    async fn malformed_values_degrade_to_defaults() {
        let store = FallbackStore::in_memory();
        store.set_raw(STOPWATCH_KEY, "{not json").await.unwrap();
        assert_eq!(store.get_stopwatch_state().await, None);

        store.set_raw(STOPWATCH_KEY, "null").await.unwrap();
        assert_eq!(store.get_stopwatch_state().await, None);

        store
            .set_raw(STOPWATCH_KEY, r#"{"elapsed_ms":-3,"lap_totals_ms":[5,"bad",-1]}"#)
            .await
            .unwrap();
        assert_eq!(
            store.get_stopwatch_state().await,
            Some(StopwatchSnapshot {
                elapsed_ms: 0,
                lap_totals_ms: vec![5],
            })
        );

        store.set_raw(TASKS_KEY, r#"{"oops":true}"#).await.unwrap();
        assert!(store.get_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn append_task_puts_newest_first() {
        let store = FallbackStore::in_memory();
        store.append_task(task(1, "first")).await.unwrap();
        let tasks = store.append_task(task(2, "second")).await.unwrap();
        let ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(store.get_tasks().await, tasks);
    }

    #[tokio::test]
    async fn daily_stats_are_always_zeroed() {
        let store = FallbackStore::in_memory();
        store.append_task(task(1, "counted nowhere")).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(store.get_daily_stats(date).await, DailyStats::zeroed(date));
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let path = unique_path();
        let snapshot = StopwatchSnapshot {
            elapsed_ms: 900,
            lap_totals_ms: vec![300],
        };
        {
            let store = FallbackStore::open(path.clone()).await.unwrap();
            store.set_stopwatch_state(snapshot.clone()).await.unwrap();
        }
        let reopened = FallbackStore::open(path.clone()).await.unwrap();
        assert_eq!(reopened.get_stopwatch_state().await, Some(snapshot));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn corrupt_store_file_opens_empty() {
        let path = unique_path();
        std::fs::write(&path, b"garbage").unwrap();
        let store = FallbackStore::open(path.clone()).await.unwrap();
        assert_eq!(store.get_stopwatch_state().await, None);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn failed_write_leaves_previous_values() {
        let dir = unique_path();
        std::fs::create_dir_all(&dir).unwrap();
        let store = FallbackStore::open(dir.clone()).await.unwrap();

        let result = store.set_stopwatch_state(StopwatchSnapshot::default()).await;
        assert!(result.is_err());
        assert_eq!(store.get_raw(STOPWATCH_KEY).await, None);
        assert!(store.set_tasks(vec![task(1, "lost")]).await.is_err());
        assert!(store.get_tasks().await.is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn reset_storage_forgets_everything() {
        let path = unique_path();
        let store = FallbackStore::open(path.clone()).await.unwrap();
        store.append_task(task(1, "gone")).await.unwrap();
        store
            .set_stopwatch_state(StopwatchSnapshot {
                elapsed_ms: 10,
                lap_totals_ms: vec![],
            })
            .await
            .unwrap();

        store.reset_storage().await.unwrap();
        assert_eq!(store.get_stopwatch_state().await, None);
        assert!(store.get_tasks().await.is_empty());
        assert_eq!(store.storage_error().await, None);

        let reopened = FallbackStore::open(path.clone()).await.unwrap();
        assert!(reopened.get_tasks().await.is_empty());
        let _ = std::fs::remove_file(path);
    }
}
