use crate::clock::TimeSource;
use crate::models::TodoItem;
use serde::Serialize;

pub fn new_task(text: &str, clock: &dyn TimeSource) -> Option<TodoItem> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let now_ms = clock.now_ms();
    Some(TodoItem {
        id: now_ms,
        text: text.to_string(),
        completed: false,
        created_at: (now_ms / 1000) as i64,
    })
}

/// Flips completion of the task with `id`; unknown ids leave the list as is.
pub fn toggle(tasks: &mut [TodoItem], id: u64) -> bool {
    match tasks.iter_mut().find(|task| task.id == id) {
        Some(task) => {
            task.completed = !task.completed;
            true
        }
        None => false,
    }
}

pub fn remove(tasks: &mut Vec<TodoItem>, id: u64) -> bool {
    let before = tasks.len();
    tasks.retain(|task| task.id != id);
    tasks.len() != before
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub done: usize,
    pub in_progress: usize,
}

pub fn counts(tasks: &[TodoItem]) -> TaskCounts {
    let done = tasks.iter().filter(|task| task.completed).count();
    TaskCounts {
        total: tasks.len(),
        done,
        in_progress: tasks.len() - done,
    }
}
