use super::{default_global_config_path, ConfigError, Settings};
use std::path::Path;

pub const API_BASE_ENV: &str = "AUTHFLOW_API_BASE";

pub fn load_global_settings() -> Result<Settings, ConfigError> {
    let path = default_global_config_path()?;
    load_settings_or_default(&path)
}

/// Reads `path` when it exists; a missing file yields the built-in defaults.
/// `AUTHFLOW_API_BASE` overrides the configured backend either way.
pub fn load_settings_or_default(path: &Path) -> Result<Settings, ConfigError> {
    let mut settings = if path.exists() {
        Settings::from_path(path)?
    } else {
        Settings::default()
    };
    if let Some(base) = std::env::var(API_BASE_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
    {
        settings.api_base = base;
    }
    settings.validate()?;
    Ok(settings)
}
