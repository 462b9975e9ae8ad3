use std::path::PathBuf;

use clipwright_core::config::AppConfig;

pub const APP_DIR_NAME: &str = "clipwright";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "CLIPWRIGHT_CONFIG";

pub fn default_app_config() -> AppConfig {
    AppConfig::default()
}

/// Per-user config directory: `%APPDATA%` on Windows, `$XDG_CONFIG_HOME` or
/// `~/.config` elsewhere.
pub fn config_dir() -> Option<PathBuf> {
    let base = if cfg!(windows) {
        std::env::var_os("APPDATA").map(PathBuf::from)
    } else {
        std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    };
    base.map(|b| b.join(APP_DIR_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(p));
    }
    config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
