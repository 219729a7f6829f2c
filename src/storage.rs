use crate::clock::TimeSource;
use crate::config::WidgetConfig;
use crate::errors::StoreResult;
use crate::fallback::FallbackStore;
use crate::host::HostStore;
use crate::models::{DailyStats, StopwatchSnapshot, TodoItem};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    NativeHost,
    LocalFallback,
}

/// Where stopwatch snapshots and tasks live.
///
/// Reads never fail: absence and unreadable data come back as `None` or
/// defaults. Writes report I/O failures so the caller can log them.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn get_stopwatch_state(&self) -> Option<StopwatchSnapshot>;

    /// Overwrites the stored snapshot and echoes back what was stored.
    async fn set_stopwatch_state(&self, snapshot: StopwatchSnapshot) -> StoreResult<StopwatchSnapshot>;

    /// Removes the stored snapshot entirely.
    async fn clear_stopwatch_state(&self) -> StoreResult<bool>;

    async fn get_tasks(&self) -> Vec<TodoItem>;

    async fn set_tasks(&self, tasks: Vec<TodoItem>) -> StoreResult<Vec<TodoItem>>;

    /// Adds a task at the front of the list and returns the new list.
    async fn append_task(&self, task: TodoItem) -> StoreResult<Vec<TodoItem>>;

    async fn get_daily_stats(&self, date: NaiveDate) -> DailyStats;

    /// Problem found while loading the store at startup, if any.
    async fn storage_error(&self) -> Option<String> {
        None
    }

    /// Drops everything the store holds and forgets any load problem.
    async fn reset_storage(&self) -> StoreResult<()>;
}

/// Picks the backend once for the lifetime of the process.
pub async fn detect_backend(
    config: &WidgetConfig,
    clock: Arc<dyn TimeSource>,
) -> StoreResult<Arc<dyn PersistenceBackend>> {
    match &config.host_data_path {
        Some(path) => {
            info!("native host detected, using {}", path.display());
            Ok(Arc::new(HostStore::open(path.clone(), clock).await?))
        }
        None => {
            info!(
                "no native host, using local store at {}",
                config.local_store_path.display()
            );
            Ok(Arc::new(
                FallbackStore::open(config.local_store_path.clone()).await?,
            ))
        }
    }
}
