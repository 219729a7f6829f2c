use std::{env, path::PathBuf, time::Duration};

pub const HOST_DATA_VAR: &str = "FOCUS_HOST_DATA";
pub const LOCAL_STORE_VAR: &str = "APP_DATA_PATH";
pub const TICK_MS_VAR: &str = "FOCUS_TICK_MS";

const DEFAULT_LOCAL_STORE: &str = "data/local_storage.json";
const DEFAULT_TICK_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Set when a native host is available; points at its data document.
    pub host_data_path: Option<PathBuf>,
    pub local_store_path: PathBuf,
    /// `None` disables the display ticker.
    pub tick_interval: Option<Duration>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            host_data_path: None,
            local_store_path: PathBuf::from(DEFAULT_LOCAL_STORE),
            tick_interval: Some(Duration::from_millis(DEFAULT_TICK_MS)),
        }
    }
}

impl WidgetConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host_data_path = lookup(HOST_DATA_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let local_store_path = lookup(LOCAL_STORE_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_STORE));

        let tick_ms = lookup(TICK_MS_VAR)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TICK_MS);
        let tick_interval = (tick_ms > 0).then(|| Duration::from_millis(tick_ms));

        Self {
            host_data_path,
            local_store_path,
            tick_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_fallback_defaults() {
        let config = WidgetConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, WidgetConfig::default());
    }

    #[test]
    fn host_path_enables_native_host() {
        let config = WidgetConfig::from_lookup(lookup_from(&[
            (HOST_DATA_VAR, "/tmp/host.json"),
            (LOCAL_STORE_VAR, "/tmp/local.json"),
            (TICK_MS_VAR, "0"),
        ]));
        assert_eq!(config.host_data_path, Some(PathBuf::from("/tmp/host.json")));
        assert_eq!(config.local_store_path, PathBuf::from("/tmp/local.json"));
        assert_eq!(config.tick_interval, None);
    }

    #[test]
    fn blank_host_path_is_ignored() {
        let config = WidgetConfig::from_lookup(lookup_from(&[(HOST_DATA_VAR, "  ")]));
        assert!(config.host_data_path.is_none());
    }
}
