use crate::core::scheduler::SchedulerSettings;
use crate::errors::{AppError, AppResult};
use crate::utils::path::expand_tilde;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Calendar days materialized by `auto-create` when no horizon is given.
    #[serde(default = "default_lookahead_days")]
    pub default_lookahead_days: i64,
    #[serde(default = "default_window_days_before")]
    pub window_days_before: i64,
    #[serde(default = "default_window_days_after")]
    pub window_days_after: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_lookahead_days() -> i64 {
    7
}
fn default_window_days_before() -> i64 {
    1
}
fn default_window_days_after() -> i64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self::with_database(Self::database_file())
    }
}

impl Config {
    fn with_database(db_path: PathBuf) -> Self {
        Self {
            database: db_path.to_string_lossy().to_string(),
            log_level: default_log_level(),
            default_lookahead_days: default_lookahead_days(),
            window_days_before: default_window_days_before(),
            window_days_after: default_window_days_after(),
        }
    }

    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sessionkeeper")
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".sessionkeeper")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("sessionkeeper.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("sessionkeeper.sqlite")
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            window_days_before: self.window_days_before.max(0),
            window_days_after: self.window_days_after.max(0),
        }
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).map_err(|e| AppError::ConfigLoad(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| AppError::ConfigLoad(e.to_string()))
    }

    /// Initialize configuration and database files
    pub fn init_all(custom_name: Option<String>, is_test: bool) -> AppResult<PathBuf> {
        let dir = Self::config_dir();

        // DB name: user provided or default
        let db_path = if let Some(name) = custom_name {
            let p = expand_tilde(&name);
            if p.is_absolute() {
                p
            } else {
                dir.join(p)
            }
        } else {
            dir.join("sessionkeeper.sqlite")
        };

        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write config file
        if !is_test {
            fs::create_dir_all(&dir)?;
            let config = Self::with_database(db_path.clone());
            let yaml =
                serde_yaml::to_string(&config).map_err(|e| AppError::ConfigSave(e.to_string()))?;
            let mut file = fs::File::create(Self::config_file())?;
            file.write_all(yaml.as_bytes())?;
            println!("✅ Config file: {:?}", Self::config_file());
        }

        Ok(db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = serde_yaml::from_str("database: /tmp/x.sqlite\n").unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.default_lookahead_days, 7);
        assert_eq!(cfg.scheduler_settings().window_days_before, 1);
        assert_eq!(cfg.scheduler_settings().window_days_after, 2);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("sessionkeeper_missing_config.conf");
        fs::remove_file(&path).ok();
        let cfg = Config::load_from(&path).unwrap();
        assert!(cfg.database.ends_with("sessionkeeper.sqlite"));
    }
}
