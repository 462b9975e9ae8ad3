use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clipwright_core::config::TimingSettings;
use clipwright_core::text::preview_text;
use tokio::task::JoinHandle;

use crate::buffer::{AppendOutcome, BufferStore};
use crate::sync::lock;
use crate::traits::{InputDriver, on_driver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Unchanged,
    Appended(usize),
    Skipped,
    ReadFailed,
}

struct PollState {
    driver: Arc<dyn InputDriver>,
    buffer: Arc<BufferStore>,
    // Trimmed; compared against trimmed reads.
    last_observed: Option<String>,
}

impl PollState {
    async fn tick(&mut self) -> Tick {
        let raw = match on_driver(&self.driver, |d| d.read_clipboard()).await {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("clipboard read failed, backing off: {e}");
                return Tick::ReadFailed;
            }
        };

        let current = raw.trim();
        if current.is_empty() || self.last_observed.as_deref() == Some(current) {
            return Tick::Unchanged;
        }
        self.last_observed = Some(current.to_string());

        match self.buffer.append(current) {
            AppendOutcome::Appended(n) => {
                log::info!("auto-detected copy, added item {n}: {}", preview_text(current, 50));
                Tick::Appended(n)
            }
            AppendOutcome::Duplicate | AppendOutcome::Empty => Tick::Skipped,
        }
    }
}

/// Polls the clipboard while enabled and appends new content to the buffer.
pub struct ClipboardMonitor {
    driver: Arc<dyn InputDriver>,
    buffer: Arc<BufferStore>,
    poll: Duration,
    backoff: Duration,
    enabled: Arc<AtomicBool>,
    // Bumped on every enable/disable so a loop from an older enable exits
    // even if the flag was flipped back on before it noticed.
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClipboardMonitor {
    pub fn new(
        driver: Arc<dyn InputDriver>,
        buffer: Arc<BufferStore>,
        timing: &TimingSettings,
    ) -> Self {
        Self {
            driver,
            buffer,
            poll: timing.clipboard_poll(),
            backoff: timing.clipboard_backoff(),
            enabled: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Starts a fresh polling loop.
    ///
    /// Whatever is on the clipboard right now counts as already observed.
    pub async fn enable(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.enabled.store(true, Ordering::SeqCst);

        let seed = on_driver(&self.driver, |d| d.read_clipboard())
            .await
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut state = PollState {
            driver: self.driver.clone(),
            buffer: self.buffer.clone(),
            last_observed: seed,
        };
        let enabled = self.enabled.clone();
        let current = self.generation.clone();
        let (poll, backoff) = (self.poll, self.backoff);

        let handle = tokio::spawn(async move {
            loop {
                if !enabled.load(Ordering::SeqCst) || current.load(Ordering::SeqCst) != generation {
                    break;
                }
                let delay = match state.tick().await {
                    Tick::ReadFailed => backoff,
                    _ => poll,
                };
                tokio::time::sleep(delay).await;
            }
            log::debug!("clipboard monitor loop {generation} exited");
        });

        if let Some(old) = lock(&self.task).replace(handle) {
            old.abort();
        }
        log::info!("clipboard monitor enabled");
    }

    pub fn disable(&self) {
        let was_enabled = self.enabled.swap(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        if was_enabled {
            log::info!("clipboard monitor disabled");
        }
    }
}

impl Drop for ClipboardMonitor {
    fn drop(&mut self) {
        self.disable();
    }
}
