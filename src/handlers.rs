use crate::app::Command;
use crate::bundle::{export_bundle, import_bundle};
use crate::display::{format_stopwatch, lap_rows, LapRow};
use crate::errors::SessionError;
use crate::models::{LapEntry, Phase, StatsReport, TodoItem};
use crate::state::Session;
use crate::stats::DEFAULT_DAYS;
use crate::tasks::{self, TaskCounts};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct StopwatchView {
    pub phase: Phase,
    pub elapsed_ms: u64,
    pub display: String,
    pub laps: Vec<LapEntry>,
    pub rows: Vec<LapRow>,
}

#[derive(Debug, Serialize)]
pub struct TasksView {
    pub tasks: Vec<TodoItem>,
    pub counts: TaskCounts,
}

pub fn stopwatch_view(session: &Session) -> StopwatchView {
    let elapsed_ms = session.engine.current_elapsed_ms();
    let laps = session.engine.laps();
    StopwatchView {
        phase: session.engine.phase(),
        elapsed_ms,
        display: format_stopwatch(elapsed_ms),
        rows: lap_rows(&laps),
        laps,
    }
}

/// Runs one command and returns the JSON reply. `Quit` is handled by the caller.
pub async fn dispatch(session: &mut Session, command: Command) -> Result<Value, SessionError> {
    match command {
        Command::Start => {
            let applied = session.engine.start();
            Ok(stopwatch_reply("start", applied, session))
        }
        Command::Stop => {
            let applied = session.engine.stop();
            Ok(stopwatch_reply("stop", applied, session))
        }
        Command::Toggle => {
            session.engine.toggle();
            Ok(stopwatch_reply("toggle", true, session))
        }
        Command::Lap => {
            let applied = session.engine.lap().is_some();
            Ok(stopwatch_reply("lap", applied, session))
        }
        Command::Reset => {
            session.engine.reset();
            Ok(stopwatch_reply("reset", true, session))
        }
        Command::DeleteLap(index) => {
            let applied = usize::try_from(index)
                .map(|index| session.engine.delete_lap(index))
                .unwrap_or(false);
            Ok(stopwatch_reply("delete-lap", applied, session))
        }
        Command::ClearLaps => {
            session.engine.clear_laps();
            Ok(stopwatch_reply("clear-laps", true, session))
        }
        Command::Status | Command::Laps => Ok(stopwatch_reply("status", true, session)),
        Command::Stats(range) => {
            let report = get_stats(session, range).await;
            Ok(json!({ "command": "stats", "report": report }))
        }
        Command::Tasks => {
            let tasks = session.backend.get_tasks().await;
            tasks_reply("tasks", true, tasks)
        }
        Command::AddTask(text) => add_task(session, &text).await,
        Command::ToggleTask(id) => update_tasks(session, "toggle-task", |list| tasks::toggle(list, id)).await,
        Command::DeleteTask(id) => update_tasks(session, "delete-task", |list| tasks::remove(list, id)).await,
        Command::Export(path) => export(session, &path).await,
        Command::Import(path) => import(session, &path).await,
        Command::StorageError => {
            let error = session.backend.storage_error().await;
            Ok(json!({ "command": "storage-error", "error": error }))
        }
        Command::ResetStorage => reset_storage(session).await,
        Command::Quit => Ok(json!({ "command": "quit" })),
    }
}

fn stopwatch_reply(command: &str, applied: bool, session: &Session) -> Value {
    json!({
        "command": command,
        "applied": applied,
        "stopwatch": stopwatch_view(session),
    })
}

fn tasks_reply(command: &str, applied: bool, tasks: Vec<TodoItem>) -> Result<Value, SessionError> {
    let counts = tasks::counts(&tasks);
    let view = TasksView { tasks, counts };
    Ok(json!({ "command": command, "applied": applied, "tasks": view }))
}

async fn get_stats(
    session: &Session,
    range: Option<(chrono::NaiveDate, chrono::NaiveDate)>,
) -> StatsReport {
    match range {
        Some((start, end)) => session.stats.collect(start, end).await,
        None => {
            let today = session.clock.today();
            session.stats.last_days(today, DEFAULT_DAYS).await
        }
    }
}

async fn add_task(session: &Session, text: &str) -> Result<Value, SessionError> {
    let task = tasks::new_task(text, session.clock.as_ref())
        .ok_or_else(|| SessionError::bad_request("task text is empty"))?;
    let tasks = session.backend.append_task(task).await?;
    tasks_reply("add-task", true, tasks)
}

async fn update_tasks<F>(session: &Session, command: &str, change: F) -> Result<Value, SessionError>
where
    F: FnOnce(&mut Vec<TodoItem>) -> bool,
{
    let mut list = session.backend.get_tasks().await;
    if !change(&mut list) {
        return tasks_reply(command, false, list);
    }
    let list = session.backend.set_tasks(list).await?;
    tasks_reply(command, true, list)
}

async fn export(session: &Session, path: &Path) -> Result<Value, SessionError> {
    session.engine.flush().await;
    let data = export_bundle(session.backend.as_ref(), path).await?;
    Ok(json!({
        "command": "export",
        "path": path.display().to_string(),
        "tasks": data.tasks.len(),
        "stopwatch": data.stopwatch,
    }))
}

async fn import(session: &mut Session, path: &Path) -> Result<Value, SessionError> {
    session.engine.flush().await;
    let data = import_bundle(session.backend.as_ref(), path).await?;
    session.reinitialize().await;
    Ok(json!({
        "command": "import",
        "path": path.display().to_string(),
        "tasks": data.tasks.len(),
        "stopwatch": stopwatch_view(session),
    }))
}

async fn reset_storage(session: &mut Session) -> Result<Value, SessionError> {
    session.engine.flush().await;
    session.backend.reset_storage().await?;
    session.reinitialize().await;
    Ok(stopwatch_reply("reset-storage", true, session))
}
