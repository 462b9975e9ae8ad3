use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            model: "gemini-2.5-flash".into(),
            temperature: 0.3,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub clipboard_poll_ms: u64,
    pub clipboard_backoff_ms: u64,
    pub clipboard_settle_ms: u64,
    // 15ms per character is ~67 chars/s at 1.0x.
    pub base_char_interval_ms: u64,
    pub typing_start_delay_ms: u64,
    pub stop_timeout_ms: u64,
    pub paste_restore_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            clipboard_poll_ms: 200,
            clipboard_backoff_ms: 500,
            clipboard_settle_ms: 100,
            base_char_interval_ms: 15,
            typing_start_delay_ms: 3000,
            stop_timeout_ms: 1000,
            paste_restore_delay_ms: 2000,
        }
    }
}

impl TimingSettings {
    /// All waits zeroed except the ones that must stay positive. Handy for tests.
    pub fn immediate() -> Self {
        Self {
            clipboard_poll_ms: 10,
            clipboard_backoff_ms: 20,
            clipboard_settle_ms: 0,
            base_char_interval_ms: 1,
            typing_start_delay_ms: 0,
            stop_timeout_ms: 1000,
            paste_restore_delay_ms: 0,
        }
    }

    pub fn clipboard_poll(&self) -> Duration {
        Duration::from_millis(self.clipboard_poll_ms.max(1))
    }

    pub fn clipboard_backoff(&self) -> Duration {
        Duration::from_millis(self.clipboard_backoff_ms.max(1))
    }

    pub fn clipboard_settle(&self) -> Duration {
        Duration::from_millis(self.clipboard_settle_ms)
    }

    pub fn base_char_interval(&self) -> Duration {
        Duration::from_millis(self.base_char_interval_ms)
    }

    pub fn typing_start_delay(&self) -> Duration {
        Duration::from_millis(self.typing_start_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn paste_restore_delay(&self) -> Duration {
        Duration::from_millis(self.paste_restore_delay_ms)
    }

    /// Characters per second at the given multiplier.
    pub fn chars_per_second(&self, multiplier: f64) -> f64 {
        if self.base_char_interval_ms == 0 {
            return f64::INFINITY;
        }
        1000.0 / self.base_char_interval_ms as f64 * multiplier
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderSettings,
    pub timing: TimingSettings,
    pub notifications_enabled: bool,

    // Secrets are stored outside this struct at rest.
    pub api_key_present: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            timing: TimingSettings::default(),
            notifications_enabled: true,
            api_key_present: false,
        }
    }
}
