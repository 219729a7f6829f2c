use crate::errors::{StoreError, StoreResult};
use crate::models::{AppData, BUNDLE_VERSION};
use crate::storage::PersistenceBackend;
use std::path::Path;
use tokio::fs;
use tracing::info;

pub async fn export_bundle(backend: &dyn PersistenceBackend, path: &Path) -> StoreResult<AppData> {
    let data = AppData {
        v: BUNDLE_VERSION,
        tasks: backend.get_tasks().await,
        stopwatch: backend.get_stopwatch_state().await,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(&data)?;
    fs::write(path, payload).await?;
    info!("exported {} tasks to {}", data.tasks.len(), path.display());
    Ok(data)
}

/// Replaces stored tasks and stopwatch state with the bundle at `path`.
///
/// The running session must be rebuilt from the store afterwards.
pub async fn import_bundle(backend: &dyn PersistenceBackend, path: &Path) -> StoreResult<AppData> {
    let raw = fs::read(path).await?;
    let data: AppData = serde_json::from_slice(&raw)?;
    if data.v != BUNDLE_VERSION {
        return Err(StoreError::UnsupportedVersion(data.v));
    }

    backend.set_tasks(data.tasks.clone()).await?;
    match &data.stopwatch {
        Some(snapshot) => {
            backend.set_stopwatch_state(snapshot.clone()).await?;
        }
        None => {
            backend.clear_stopwatch_state().await?;
        }
    }
    info!("imported {} tasks from {}", data.tasks.len(), path.display());
    Ok(data)
}
