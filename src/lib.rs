pub mod app;
pub mod bundle;
pub mod clock;
pub mod config;
pub mod display;
pub mod engine;
pub mod errors;
pub mod fallback;
pub mod handlers;
pub mod host;
pub mod models;
pub mod persist;
pub mod state;
pub mod stats;
pub mod storage;
pub mod tasks;

pub use app::Command;
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::WidgetConfig;
pub use engine::StopwatchEngine;
pub use state::Session;
pub use stats::StatsAggregator;
pub use storage::{detect_backend, BackendKind, PersistenceBackend};
