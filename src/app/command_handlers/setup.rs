use crate::app::command_support::{ensure_state_root, map_config_err};
use crate::config::{
    default_global_config_path, load_settings_or_default, save_settings_to, Settings,
};

pub fn cmd_setup() -> Result<String, String> {
    let root = ensure_state_root()?;
    let config_path = default_global_config_path().map_err(map_config_err)?;
    let created = !config_path.exists();
    if created {
        save_settings_to(&Settings::default(), &config_path).map_err(map_config_err)?;
    }
    let settings = load_settings_or_default(&config_path).map_err(map_config_err)?;
    let log = settings.resolve_log_path(&root);

    Ok([
        "setup=complete".to_string(),
        format!("state_root={}", root.display()),
        format!("config={}", config_path.display()),
        format!("config_created={created}"),
        format!("api_base={}", settings.api_base()),
        format!("log={}", log.display()),
    ]
    .join("\n"))
}
