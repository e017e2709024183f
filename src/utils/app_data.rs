use crate::document::SegmenterConfig;
use crate::document::segmenter::DEFAULT_EXCLUDED_TAGS;
use crate::search::matcher::{DEFAULT_PARALLEL_THRESHOLD, DEFAULT_PATTERN_CACHE_SIZE};
use crate::search::session::DEFAULT_WINDOW_SEGMENTS;
use crate::search::{SearchMode, SessionConfig};
use crate::worker::DEFAULT_DEBOUNCE_MS;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "findable";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Mode used when a query does not name one
    #[serde(default)]
    pub default_mode: SearchMode,

    /// Segments scanned per pass in shallow mode
    #[serde(default = "default_window")]
    pub shallow_window: usize,

    /// Segments scanned per pass in deep mode
    #[serde(default = "default_window")]
    pub deep_window: usize,

    /// Documents with at most this many segments are scanned whole on the
    /// first pass (0 disables)
    #[serde(default)]
    pub full_scan_below: usize,

    /// Passes over at least this many segments run in parallel (0 disables)
    #[serde(default = "default_parallel_scan_threshold")]
    pub parallel_scan_threshold: usize,

    /// Number of compiled query patterns kept in memory
    #[serde(default = "default_pattern_cache_size")]
    pub pattern_cache_size: usize,

    /// Quiet period before a typed query is scanned
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// HTML elements whose contents are never searched
    #[serde(default = "default_exclude_tags")]
    pub exclude_tags: Vec<String>,
}

fn default_window() -> usize {
    DEFAULT_WINDOW_SEGMENTS
}

fn default_parallel_scan_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

fn default_pattern_cache_size() -> usize {
    DEFAULT_PATTERN_CACHE_SIZE
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_exclude_tags() -> Vec<String> {
    DEFAULT_EXCLUDED_TAGS.iter().map(|t| t.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_mode: SearchMode::default(),
            shallow_window: default_window(),
            deep_window: default_window(),
            full_scan_below: 0,
            parallel_scan_threshold: default_parallel_scan_threshold(),
            pattern_cache_size: default_pattern_cache_size(),
            debounce_ms: default_debounce_ms(),
            exclude_tags: default_exclude_tags(),
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Load config from an explicit path, or return default if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: AppConfig =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<PathBuf> {
        let path = get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Reject settings that would stall scanning
    pub fn validate(&self) -> Result<()> {
        ensure!(self.shallow_window > 0, "shallow_window must be at least 1");
        ensure!(self.deep_window > 0, "deep_window must be at least 1");
        ensure!(self.pattern_cache_size > 0, "pattern_cache_size must be at least 1");
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            shallow_window: self.shallow_window,
            deep_window: self.deep_window,
            full_scan_below: self.full_scan_below,
            parallel_scan_threshold: self.parallel_scan_threshold,
            pattern_cache_size: self.pattern_cache_size,
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            exclude_tags: self.exclude_tags.clone(),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    Ok(base.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_mode":"deep","deep_window":5}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_mode, SearchMode::Deep);
        assert_eq!(config.deep_window, 5);
        assert_eq!(config.shallow_window, DEFAULT_WINDOW_SEGMENTS);
        assert_eq!(config.session_config().window_for(SearchMode::Deep), 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            full_scan_below: 50,
            exclude_tags: vec!["aside".to_string()],
            ..AppConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
        assert_eq!(config.segmenter_config().exclude_tags, vec!["aside".to_string()]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"shallow_window":0}"#).unwrap();
        assert!(AppConfig::load_from(&path).is_err());

        fs::write(&path, r#"{"default_mode":"fuzzy"}"#).unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}
