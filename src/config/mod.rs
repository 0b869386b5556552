pub mod error;
pub mod load;
pub mod paths;
pub mod save;
pub mod settings;
pub use error::ConfigError;
pub use load::{load_global_settings, load_settings_or_default, API_BASE_ENV};
pub use paths::{
    default_global_config_path, default_state_root, CONFIG_PATH_ENV, GLOBAL_SETTINGS_FILE_NAME,
    GLOBAL_STATE_DIR,
};
pub use save::{save_settings, save_settings_to};
pub use settings::{
    AutomationSettings, DisplaySettings, FallbackMarkers, Settings, DEFAULT_API_BASE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn partial_yaml_fills_documented_defaults() {
        let settings: Settings = serde_yaml::from_str(
            r#"
api_base: http://pa.internal:8080/
automation:
  poll_interval_ms: 750
"#,
        )
        .expect("parse settings");

        assert_eq!(settings.api_base(), "http://pa.internal:8080");
        assert_eq!(
            settings.automation.poll_interval(),
            Duration::from_millis(750)
        );
        assert_eq!(
            settings.automation.settle_delay(),
            Duration::from_millis(1000)
        );
        assert!(settings.automation.stream_timeout().is_none());
        assert!(settings.display.auto_scroll);
        assert_eq!(
            settings.display.scroll_throttle(),
            Duration::from_millis(500)
        );
        assert_eq!(
            settings.fallback_markers.url,
            vec!["example.com".to_string(), "placeholder".to_string()]
        );
        settings.validate().expect("valid");
    }

    #[test]
    fn validation_rejects_non_http_base() {
        let settings: Settings =
            serde_yaml::from_str("api_base: ftp://somewhere\n").expect("parse settings");
        let err = settings.validate().expect_err("validation should fail");
        match err {
            ConfigError::Settings(message) => assert!(message.contains("http://")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_zero_poll_interval_but_allows_zero_settle_delay() {
        let settings: Settings = serde_yaml::from_str(
            r#"
automation:
  poll_interval_ms: 2000
  settle_delay_ms: 0
"#,
        )
        .expect("parse settings");
        settings.validate().expect("zero settle delay is allowed");

        let settings: Settings = serde_yaml::from_str(
            r#"
automation:
  poll_interval_ms: 0
"#,
        )
        .expect("parse settings");
        let err = settings.validate().expect_err("validation should fail");
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn validation_rejects_blank_markers_and_relative_log_path() {
        let settings: Settings = serde_yaml::from_str(
            r#"
fallback_markers:
  url: ["  "]
"#,
        )
        .expect("parse settings");
        assert!(settings
            .validate()
            .expect_err("blank marker")
            .to_string()
            .contains("fallback_markers.url"));

        let settings = Settings {
            log_path: Some(PathBuf::from("logs/automation.log")),
            ..Settings::default()
        };
        assert!(settings
            .validate()
            .expect_err("relative log path")
            .to_string()
            .contains("log_path"));
    }

    #[test]
    fn log_path_defaults_under_state_root() {
        let settings = Settings::default();
        assert_eq!(
            settings.resolve_log_path(&PathBuf::from("/tmp/authflow")),
            PathBuf::from("/tmp/authflow/logs/automation.log")
        );
    }
}
