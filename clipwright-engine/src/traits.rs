use std::sync::Arc;

use async_trait::async_trait;
use clipwright_core::types::BufferItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
}

/// Text-generation backend.
///
/// Latency is unbounded but finite; the controller never awaits it while
/// holding session state.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    async fn submit(&self, items: &[BufferItem]) -> anyhow::Result<GeneratedResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDirection {
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKeyEvent {
    // Lowercase key name ("a", "1", "space", "enter", "shift", ...).
    pub name: String,
    pub direction: KeyDirection,
}

impl RawKeyEvent {
    pub fn down(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: KeyDirection::Down,
        }
    }

    pub fn up(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: KeyDirection::Up,
        }
    }
}

/// What a raw-key hook wants done with the event it just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    PassThrough,
    Consume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(pub u64);

/// Runs on the hook's own delivery thread; must not block.
pub type KeyHookCallback = Arc<dyn Fn(&RawKeyEvent) -> HookDecision + Send + Sync>;

/// OS-level clipboard, keystroke injection, and raw-key hooks.
///
/// Calls are synchronous and may block briefly on the OS.
pub trait InputDriver: Send + Sync {
    fn read_clipboard(&self) -> anyhow::Result<String>;
    fn write_clipboard(&self, text: &str) -> anyhow::Result<()>;
    fn simulate_paste(&self) -> anyhow::Result<()>;
    fn type_character(&self, ch: char) -> anyhow::Result<()>;
    fn is_modifier_pressed(&self, modifier: Modifier) -> bool;
    fn register_key_hook(&self, callback: KeyHookCallback) -> anyhow::Result<HookHandle>;
    fn unregister_key_hook(&self, handle: HookHandle);
}

/// Runs a driver call on the blocking pool so async callers never stall a
/// runtime worker on the OS clipboard.
pub(crate) async fn on_driver<T, F>(driver: &Arc<dyn InputDriver>, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn InputDriver) -> anyhow::Result<T> + Send + 'static,
{
    let driver = driver.clone();
    tokio::task::spawn_blocking(move || f(driver.as_ref()))
        .await
        .map_err(|e| anyhow::anyhow!("driver task failed: {e}"))?
}

/// Best-effort user alerts. Implementations swallow their own failures.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}
