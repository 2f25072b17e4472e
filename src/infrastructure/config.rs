use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
const DEFAULT_APP_NAME: &str = "SleepFix";
const DEFAULT_STORE_PATH: &str = "state/health.sqlite";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// One `save_batch` call; the store's verdict applies to every entry.
    #[default]
    Batch,
    /// One `save` call per entry, each reported separately.
    PerItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub app_name: String,
    pub time_zone: Tz,
    pub store_path: PathBuf,
    pub write_strategy: WriteStrategy,
}

impl AppConfig {
    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": DEFAULT_APP_NAME,
        "timezone": "UTC",
        "storePath": DEFAULT_STORE_PATH,
        "writeStrategy": "batch"
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn read_trimmed<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let app = read_config(&path)?;

    let time_zone = match read_trimmed(&app, "timezone") {
        Some(raw) => raw.parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid timezone '{raw}' in {}: {error}",
                path.display()
            ))
        })?,
        None => Tz::UTC,
    };

    let write_strategy = match app.get("writeStrategy") {
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid writeStrategy in {}: {error}",
                path.display()
            ))
        })?,
        None => WriteStrategy::default(),
    };

    Ok(AppConfig {
        app_name: read_trimmed(&app, "appName")
            .unwrap_or(DEFAULT_APP_NAME)
            .to_string(),
        time_zone,
        store_path: PathBuf::from(read_trimmed(&app, "storePath").unwrap_or(DEFAULT_STORE_PATH)),
        write_strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_CONFIG: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_CONFIG.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "sleepfix-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }

        fn write_app(&self, value: serde_json::Value) {
            fs::write(self.path.join(APP_JSON), value.to_string()).expect("write app.json");
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_and_loadable() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let config = load_app_config(&dir.path).expect("load defaults");
        assert_eq!(config.app_name, "SleepFix");
        assert_eq!(config.time_zone, Tz::UTC);
        assert_eq!(config.store_path, PathBuf::from("state/health.sqlite"));
        assert_eq!(config.write_strategy, WriteStrategy::Batch);
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({
            "schema": 1,
            "timezone": "Europe/Moscow",
            "writeStrategy": "per_item"
        }));
        ensure_default_configs(&dir.path).expect("ensure defaults");

        let config = load_app_config(&dir.path).expect("load config");
        assert_eq!(config.time_zone, chrono_tz::Europe::Moscow);
        assert_eq!(config.write_strategy, WriteStrategy::PerItem);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 2 }));
        match load_app_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => {
                assert!(message.contains("unsupported schema"))
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 1, "timezone": "Mars/Olympus" }));
        assert!(matches!(
            load_app_config(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn relative_store_path_resolves_against_workspace() {
        let config = AppConfig {
            app_name: "SleepFix".to_string(),
            time_zone: Tz::UTC,
            store_path: PathBuf::from("state/health.sqlite"),
            write_strategy: WriteStrategy::Batch,
        };
        assert_eq!(
            config.resolve_store_path(Path::new("/srv/sleepfix")),
            PathBuf::from("/srv/sleepfix/state/health.sqlite")
        );
    }
}
