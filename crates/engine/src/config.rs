use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use todadot_core::TimeRange;
use todadot_storage::MAX_BATCH_WRITES;

use crate::error::EngineError;
use crate::queue::RetryPolicy;

pub const ENV_DB_PATH: &str = "TODADOT_DB_PATH";
pub const ENV_LOG: &str = "TODADOT_LOG";

/// Longest calendar window accepted on either side of today.
pub const MAX_CALENDAR_WINDOW_DAYS: i64 = 3660;

/// Days around today listed when syncing the external calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarWindow {
    pub past_days: i64,
    pub future_days: i64,
}

impl Default for CalendarWindow {
    fn default() -> Self {
        Self { past_days: 30, future_days: 90 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub database_path: PathBuf,
    pub remote_batch_limit: usize,
    pub remote_max_attempts: u32,
    pub remote_retry_backoff_ms: u64,
    pub log_filter: String,
    pub log_json: bool,
    pub calendar_window_days: CalendarWindow,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("todadot.db"),
            remote_batch_limit: MAX_BATCH_WRITES,
            remote_max_attempts: 2,
            remote_retry_backoff_ms: 250,
            log_filter: "info".into(),
            log_json: false,
            calendar_window_days: CalendarWindow::default(),
        }
    }
}

impl SyncConfig {
    /// Read `path`, falling back to defaults when the file does not exist,
    /// then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                return Err(EngineError::Config(format!("reading {}: {err}", path.display())));
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Apply `TODADOT_DB_PATH` and `TODADOT_LOG` as looked up by `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(filter) = var(ENV_LOG).filter(|v| !v.is_empty()) {
            self.log_filter = filter;
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.remote_batch_limit == 0 || self.remote_batch_limit > MAX_BATCH_WRITES {
            return Err(EngineError::Config(format!(
                "remote_batch_limit must be within 1..={MAX_BATCH_WRITES}, got {}",
                self.remote_batch_limit
            )));
        }
        if self.remote_max_attempts == 0 {
            return Err(EngineError::Config("remote_max_attempts must be at least 1".into()));
        }
        let window = self.calendar_window_days;
        for (name, days) in [("past_days", window.past_days), ("future_days", window.future_days)] {
            if !(0..=MAX_CALENDAR_WINDOW_DAYS).contains(&days) {
                return Err(EngineError::Config(format!(
                    "calendar_window_days.{name} must be within 0..={MAX_CALENDAR_WINDOW_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.remote_max_attempts.max(1),
            backoff: Duration::from_millis(self.remote_retry_backoff_ms),
        }
    }

    pub fn calendar_range(&self, today: NaiveDate) -> Result<TimeRange, EngineError> {
        let window = self.calendar_window_days;
        Ok(TimeRange::around(today, window.past_days, window.future_days)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = SyncConfig::from_toml_str("")?;
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.remote_batch_limit, 500);
        assert_eq!(config.log_filter, "info");
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = SyncConfig::from_toml_str(
            r#"
            database_path = "/tmp/todo.db"
            log_json = true

            [calendar_window_days]
            future_days = 14
            "#,
        )?;
        assert_eq!(config.database_path, PathBuf::from("/tmp/todo.db"));
        assert!(config.log_json);
        assert_eq!(config.calendar_window_days, CalendarWindow { past_days: 30, future_days: 14 });
        assert_eq!(config.remote_max_attempts, 2);
        Ok(())
    }

    #[test]
    fn oversized_batch_limit_is_rejected() {
        let err = SyncConfig::from_toml_str("remote_batch_limit = 501").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn oversized_calendar_window_is_rejected() {
        let err = SyncConfig::from_toml_str("[calendar_window_days]\npast_days = 100000000").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(SyncConfig::from_toml_str("[calendar_window_days]\nfuture_days = 3660").is_ok());
    }

    #[test]
    fn unrepresentable_calendar_range_is_an_error() {
        let config = SyncConfig {
            calendar_window_days: CalendarWindow { past_days: 100_000_000, future_days: 0 },
            ..SyncConfig::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert!(matches!(config.calendar_range(today), Err(EngineError::Core(_))));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = SyncConfig::default();
        config.apply_overrides(|name| match name {
            ENV_DB_PATH => Some("/data/override.db".into()),
            ENV_LOG => Some("todadot_engine=debug".into()),
            _ => None,
        });
        assert_eq!(config.database_path, PathBuf::from("/data/override.db"));
        assert_eq!(config.log_filter, "todadot_engine=debug");
    }

    #[test]
    fn missing_file_loads_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = SyncConfig::load(&dir.path().join("absent.toml"))?;
        assert_eq!(config.remote_batch_limit, SyncConfig::default().remote_batch_limit);
        Ok(())
    }

    #[test]
    fn file_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("todadot.toml");
        let config = SyncConfig { log_json: true, remote_batch_limit: 100, ..SyncConfig::default() };
        std::fs::write(&path, config.to_toml_string()?)?;

        let loaded = SyncConfig::from_toml_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn calendar_range_spans_window() {
        let config = SyncConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let range = config.calendar_range(today).unwrap();
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 5, 16).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 9, 13).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 9, 14).unwrap()));
    }
}
