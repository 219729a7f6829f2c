use crate::models::{DailyPoint, DailyStats, StatsReport, StatsSummary};
use crate::storage::PersistenceBackend;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_DAYS: u32 = 7;

#[derive(Clone)]
pub struct StatsAggregator {
    backend: Arc<dyn PersistenceBackend>,
}

impl StatsAggregator {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    /// Queries every date in `[start, end]` once, in order, and reduces.
    pub async fn collect(&self, start: NaiveDate, end: NaiveDate) -> StatsReport {
        let dates = date_range(start, end);
        debug!("collecting stats for {} days from {start}", dates.len());
        let mut days = Vec::with_capacity(dates.len());
        for date in dates {
            days.push(self.backend.get_daily_stats(date).await);
        }
        summarize(&days)
    }

    /// The `days` most recent dates ending at `today`.
    pub async fn last_days(&self, today: NaiveDate, days: u32) -> StatsReport {
        if days == 0 {
            return StatsReport::default();
        }
        let start = today - Duration::days(i64::from(days) - 1);
        self.collect(start, today).await
    }
}

/// Ascending dates from `start` to `end` inclusive; empty when inverted.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

pub fn summarize(days: &[DailyStats]) -> StatsReport {
    let mut summary = StatsSummary::default();
    let mut lap_avg_sum = 0.0;
    let mut lap_avg_days = 0u32;

    for day in days {
        summary.total_completed = summary.total_completed.saturating_add(day.tasks_completed);
        summary.total_created = summary.total_created.saturating_add(day.tasks_created);
        summary.total_focus_ms = summary.total_focus_ms.saturating_add(day.focus_time_ms);
        summary.total_laps = summary.total_laps.saturating_add(day.lap_count);
        if let Some(avg) = day.avg_lap_time_ms {
            lap_avg_sum += avg;
            lap_avg_days += 1;
        }
    }
    summary.avg_lap_ms = (lap_avg_days > 0).then(|| lap_avg_sum / f64::from(lap_avg_days));

    let points = days
        .iter()
        .map(|day| DailyPoint {
            date: day.date,
            label: day_label(day.date),
            completed: day.tasks_completed,
            created: day.tasks_created,
            focus_minutes: day.focus_time_ms / 60_000,
        })
        .collect();

    StatsReport {
        summary,
        days: points,
    }
}

fn day_label(date: NaiveDate) -> String {
    date.format("%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreResult;
    use crate::models::{StopwatchSnapshot, TodoItem};
    use crate::storage::BackendKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Serves canned per-day stats and records which dates were asked for.
    #[derive(Default)]
    struct CannedStats {
        days: HashMap<NaiveDate, DailyStats>,
        asked: Mutex<Vec<NaiveDate>>,
    }

    #[async_trait]
    impl PersistenceBackend for CannedStats {
        fn kind(&self) -> BackendKind {
            BackendKind::NativeHost
        }

        async fn get_stopwatch_state(&self) -> Option<StopwatchSnapshot> {
            None
        }

        async fn set_stopwatch_state(&self, snapshot: StopwatchSnapshot) -> StoreResult<StopwatchSnapshot> {
            Ok(snapshot)
        }

        async fn clear_stopwatch_state(&self) -> StoreResult<bool> {
            Ok(true)
        }

        async fn get_tasks(&self) -> Vec<TodoItem> {
            Vec::new()
        }

        async fn set_tasks(&self, tasks: Vec<TodoItem>) -> StoreResult<Vec<TodoItem>> {
            Ok(tasks)
        }

        async fn append_task(&self, task: TodoItem) -> StoreResult<Vec<TodoItem>> {
            Ok(vec![task])
        }

        async fn get_daily_stats(&self, date: NaiveDate) -> DailyStats {
            self.asked.lock().unwrap().push(date);
            self.days
                .get(&date)
                .cloned()
                .unwrap_or_else(|| DailyStats::zeroed(date))
        }

        async fn reset_storage(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn day(date: NaiveDate, completed: u64, created: u64, focus_ms: u64, laps: u64, avg: Option<f64>) -> DailyStats {
        DailyStats {
            date,
            tasks_completed: completed,
            tasks_created: created,
            focus_time_ms: focus_ms,
            lap_count: laps,
            avg_lap_time_ms: avg,
        }
    }

    #[test]
    fn date_range_is_inclusive_and_ascending() {
        let dates = date_range(date(2026, 2, 27), date(2026, 3, 2));
        assert_eq!(
            dates,
            vec![date(2026, 2, 27), date(2026, 2, 28), date(2026, 3, 1), date(2026, 3, 2)]
        );
        assert_eq!(date_range(date(2026, 3, 2), date(2026, 3, 2)).len(), 1);
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(date_range(date(2026, 3, 2), date(2026, 3, 1)).is_empty());
        let report = summarize(&[]);
        assert_eq!(report.summary, StatsSummary::default());
        assert_eq!(report.summary.avg_lap_ms, None);
        assert!(report.days.is_empty());
    }

    #[test]
    fn average_ignores_days_without_laps() {
        let start = date(2026, 1, 5);
        let days: Vec<DailyStats> = (0..5)
            .map(|offset| {
                let d = start + Duration::days(offset);
                match offset {
                    1 => day(d, 0, 0, 0, 2, Some(10_000.0)),
                    3 => day(d, 0, 0, 0, 1, Some(30_000.0)),
                    _ => day(d, 0, 0, 0, 0, None),
                }
            })
            .collect();
        let report = summarize(&days);
        assert_eq!(report.summary.avg_lap_ms, Some(20_000.0));
        assert_eq!(report.summary.total_laps, 3);
    }

    #[test]
    fn sums_and_minute_series() {
        let days = vec![
            day(date(2026, 1, 5), 2, 3, 119_999, 0, None),
            day(date(2026, 1, 6), 1, 0, 120_000, 4, Some(2_500.0)),
        ];
        let report = summarize(&days);
        assert_eq!(report.summary.total_completed, 3);
        assert_eq!(report.summary.total_created, 3);
        assert_eq!(report.summary.total_focus_ms, 239_999);
        assert_eq!(report.summary.total_laps, 4);
        assert_eq!(report.summary.avg_lap_ms, Some(2_500.0));

        let minutes: Vec<u64> = report.days.iter().map(|p| p.focus_minutes).collect();
        assert_eq!(minutes, vec![1, 2]);
        assert_eq!(report.days[0].label, "01-05");
        assert_eq!(report.days[1].completed, 1);
    }

    #[tokio::test]
    async fn collect_queries_each_date_once_in_order() {
        let mut backend = CannedStats::default();
        backend
            .days
            .insert(date(2026, 1, 6), day(date(2026, 1, 6), 4, 5, 60_000, 1, Some(900.0)));
        let backend = Arc::new(backend);
        let aggregator = StatsAggregator::new(backend.clone());

        let report = aggregator.collect(date(2026, 1, 5), date(2026, 1, 7)).await;
        assert_eq!(
            *backend.asked.lock().unwrap(),
            vec![date(2026, 1, 5), date(2026, 1, 6), date(2026, 1, 7)]
        );
        assert_eq!(report.days.len(), 3);
        assert_eq!(report.summary.total_completed, 4);
        assert_eq!(report.summary.avg_lap_ms, Some(900.0));
    }

    #[tokio::test]
    async fn inverted_collect_asks_nothing() {
        let backend = Arc::new(CannedStats::default());
        let aggregator = StatsAggregator::new(backend.clone());
        let report = aggregator.collect(date(2026, 1, 7), date(2026, 1, 5)).await;
        assert!(backend.asked.lock().unwrap().is_empty());
        assert_eq!(report, StatsReport::default());
    }

    #[tokio::test]
    async fn last_days_ends_today() {
        let backend = Arc::new(CannedStats::default());
        let aggregator = StatsAggregator::new(backend.clone());
        let report = aggregator.last_days(date(2026, 1, 5), DEFAULT_DAYS).await;
        assert_eq!(report.days.len(), 7);
        assert_eq!(report.days.first().unwrap().date, date(2025, 12, 30));
        assert_eq!(report.days.last().unwrap().date, date(2026, 1, 5));
    }
}
