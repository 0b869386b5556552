use super::ConfigError;
use crate::shared::logging::{automation_log_path, LogSink};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub automation: AutomationSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub fallback_markers: FallbackMarkers,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AutomationSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub stream_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DisplaySettings {
    #[serde(default = "default_true")]
    pub auto_scroll: bool,
    #[serde(default = "default_scroll_throttle_ms")]
    pub scroll_throttle_ms: u64,
    #[serde(default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,
}

/// Substrings the backend uses when it substitutes synthetic search results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FallbackMarkers {
    #[serde(default = "default_url_markers")]
    pub url: Vec<String>,
    #[serde(default = "default_title_markers")]
    pub title: Vec<String>,
    #[serde(default = "default_source_markers")]
    pub source: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            automation: AutomationSettings::default(),
            display: DisplaySettings::default(),
            fallback_markers: FallbackMarkers::default(),
            log_path: None,
        }
    }
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            stream_timeout_ms: None,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            auto_scroll: true,
            scroll_throttle_ms: default_scroll_throttle_ms(),
            scroll_delay_ms: default_scroll_delay_ms(),
        }
    }
}

impl Default for FallbackMarkers {
    fn default() -> Self {
        Self {
            url: default_url_markers(),
            title: default_title_markers(),
            source: default_source_markers(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_scroll_throttle_ms() -> u64 {
    500
}

fn default_scroll_delay_ms() -> u64 {
    200
}

fn default_url_markers() -> Vec<String> {
    vec!["example.com".to_string(), "placeholder".to_string()]
}

fn default_title_markers() -> Vec<String> {
    vec!["generic".to_string()]
}

fn default_source_markers() -> Vec<String> {
    vec!["Generic".to_string()]
}

impl AutomationSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn stream_timeout(&self) -> Option<Duration> {
        self.stream_timeout_ms.map(Duration::from_millis)
    }
}

impl DisplaySettings {
    pub fn scroll_throttle(&self) -> Duration {
        Duration::from_millis(self.scroll_throttle_ms)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base.trim();
        if base.is_empty() {
            return Err(ConfigError::Settings(
                "`api_base` must be non-empty".to_string(),
            ));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Settings(format!(
                "`api_base` `{base}` must start with http:// or https://"
            )));
        }
        if self.automation.poll_interval_ms == 0 {
            return Err(ConfigError::Settings(
                "automation.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.automation.stream_timeout_ms == Some(0) {
            return Err(ConfigError::Settings(
                "automation.stream_timeout_ms must be > 0 when set".to_string(),
            ));
        }
        if self.display.scroll_throttle_ms == 0 {
            return Err(ConfigError::Settings(
                "display.scroll_throttle_ms must be > 0".to_string(),
            ));
        }

        let marker_lists = [
            ("url", &self.fallback_markers.url),
            ("title", &self.fallback_markers.title),
            ("source", &self.fallback_markers.source),
        ];
        for (name, markers) in marker_lists {
            if markers.iter().any(|marker| marker.trim().is_empty()) {
                return Err(ConfigError::Settings(format!(
                    "fallback_markers.{name} entries must be non-empty"
                )));
            }
        }

        if let Some(log_path) = &self.log_path {
            if !log_path.is_absolute() {
                return Err(ConfigError::Settings(
                    "`log_path` must be an absolute path".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn api_base(&self) -> &str {
        self.api_base.trim().trim_end_matches('/')
    }

    pub fn resolve_log_path(&self, state_root: &Path) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| automation_log_path(state_root))
    }

    pub fn log_sink(&self, state_root: &Path) -> LogSink {
        LogSink::to_file(self.resolve_log_path(state_root))
    }
}
