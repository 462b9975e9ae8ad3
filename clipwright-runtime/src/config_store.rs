use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clipwright_core::config::AppConfig;

use crate::defaults::default_config_path;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> anyhow::Result<Self> {
        default_config_path()
            .map(Self::at_path)
            .context("no config directory could be determined; set CLIPWRIGHT_CONFIG")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes =
            fs::read(&self.path).with_context(|| format!("read config: {}", self.path.display()))?;
        serde_json::from_slice(&bytes).context("decode config JSON")
    }

    /// A missing file yields the defaults; a malformed one is still an error.
    pub fn load_or_default(&self) -> anyhow::Result<AppConfig> {
        match fs::metadata(&self.path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", self.path.display());
                Ok(AppConfig::default())
            }
            _ => self.load(),
        }
    }

    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(cfg).context("encode config JSON")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config directory: {}", parent.display()))?;
        }

        // Write temp then rename over, so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write temp: {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(anyhow::Error::new(e)
                .context(format!("replace config: {}", self.path.display())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_settings_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("nested").join("config.json"));

        let mut cfg = AppConfig::default();
        cfg.provider.model = "gpt-4o-mini".into();
        cfg.provider.system_prompt = Some("Be terse.".into());
        cfg.timing.base_char_interval_ms = 30;
        cfg.notifications_enabled = false;

        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap(), cfg);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_gives_defaults_but_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));
        assert_eq!(store.load_or_default().unwrap(), AppConfig::default());

        std::fs::write(store.path(), b"{ not json").unwrap();
        assert!(store.load_or_default().is_err());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));
        std::fs::write(store.path(), br#"{"timing":{"typing_start_delay_ms":500}}"#).unwrap();

        let cfg = store.load().unwrap();
        assert_eq!(cfg.timing.typing_start_delay_ms, 500);
        assert_eq!(cfg.timing.stop_timeout_ms, 1000);
        assert_eq!(cfg.provider.model, "gemini-2.5-flash");
    }
}
