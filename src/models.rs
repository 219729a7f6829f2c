use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const BUNDLE_VERSION: u32 = 1;

/// Durable stopwatch state: banked running time plus cumulative lap totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StopwatchSnapshot {
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub lap_totals_ms: Vec<u64>,
}

impl StopwatchSnapshot {
    /// Decodes whatever was stored, keeping what is usable.
    ///
    /// `elapsed_ms` falls back to 0 when missing, negative or not a finite
    /// number. Lap entries that are not finite non-negative numbers are dropped.
    pub fn from_value(value: &Value) -> Self {
        let elapsed_ms = value
            .get("elapsed_ms")
            .and_then(coerce_ms)
            .unwrap_or(0);
        let lap_totals_ms = value
            .get("lap_totals_ms")
            .and_then(Value::as_array)
            .map(|laps| laps.iter().filter_map(coerce_ms).collect())
            .unwrap_or_default();
        Self {
            elapsed_ms,
            lap_totals_ms,
        }
    }
}

fn coerce_ms(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(number.floor() as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Ready,
    Running,
    Paused,
}

impl Phase {
    pub fn is_running(self) -> bool {
        self == Phase::Running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LapEntry {
    pub lap_no: usize,
    pub total_ms: u64,
    pub split_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: i64,
}

/// Per-day record as reported by a persistence backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub tasks_completed: u64,
    pub tasks_created: u64,
    pub focus_time_ms: u64,
    pub lap_count: u64,
    pub avg_lap_time_ms: Option<f64>,
}

impl DailyStats {
    pub fn zeroed(date: NaiveDate) -> Self {
        Self {
            date,
            tasks_completed: 0,
            tasks_created: 0,
            focus_time_ms: 0,
            lap_count: 0,
            avg_lap_time_ms: None,
        }
    }
}

/// Activity the host accumulates for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DayRecord {
    #[serde(default)]
    pub tasks_created: u64,
    #[serde(default)]
    pub tasks_completed: u64,
    #[serde(default)]
    pub focus_time_ms: u64,
    #[serde(default)]
    pub lap_count: u64,
    #[serde(default)]
    pub lap_time_total_ms: u64,
}

impl DayRecord {
    pub fn to_daily_stats(&self, date: NaiveDate) -> DailyStats {
        let avg_lap_time_ms = if self.lap_count == 0 {
            None
        } else {
            Some(self.lap_time_total_ms as f64 / self.lap_count as f64)
        };
        DailyStats {
            date,
            tasks_completed: self.tasks_completed,
            tasks_created: self.tasks_created,
            focus_time_ms: self.focus_time_ms,
            lap_count: self.lap_count,
            avg_lap_time_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_completed: u64,
    pub total_created: u64,
    pub total_focus_ms: u64,
    pub total_laps: u64,
    pub avg_lap_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub label: String,
    pub completed: u64,
    pub created: u64,
    pub focus_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct StatsReport {
    pub summary: StatsSummary,
    pub days: Vec<DailyPoint>,
}

/// Full-state bundle used for file export/import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppData {
    pub v: u32,
    #[serde(default)]
    pub tasks: Vec<TodoItem>,
    #[serde(default)]
    pub stopwatch: Option<StopwatchSnapshot>,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            v: BUNDLE_VERSION,
            tasks: Vec::new(),
            stopwatch: None,
        }
    }
}

/// On-disk document owned by the native host.
///
/// Each section decodes on its own: an unusable entry is dropped without
/// discarding its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostData {
    #[serde(default = "default_version")]
    pub v: u32,
    #[serde(default, deserialize_with = "lenient_tasks")]
    pub tasks: Vec<TodoItem>,
    #[serde(default, deserialize_with = "lenient_snapshot")]
    pub stopwatch: Option<StopwatchSnapshot>,
    #[serde(default, deserialize_with = "lenient_days")]
    pub days: BTreeMap<NaiveDate, DayRecord>,
}

fn default_version() -> u32 {
    BUNDLE_VERSION
}

fn lenient_snapshot<'de, D>(deserializer: D) -> Result<Option<StopwatchSnapshot>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .is_object()
        .then(|| StopwatchSnapshot::from_value(&value)))
}

fn lenient_tasks<'de, D>(deserializer: D) -> Result<Vec<TodoItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let tasks = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(tasks)
}

fn lenient_days<'de, D>(deserializer: D) -> Result<BTreeMap<NaiveDate, DayRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let days = match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(date, record)| {
                Some((date.parse().ok()?, serde_json::from_value(record).ok()?))
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    Ok(days)
}

impl Default for HostData {
    fn default() -> Self {
        Self {
            v: BUNDLE_VERSION,
            tasks: Vec::new(),
            stopwatch: None,
            days: BTreeMap::new(),
        }
    }
}
