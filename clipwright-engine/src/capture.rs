// Manual input capture.
//
// The raw-key hook only samples the shift state and enqueues the key onto an
// unbounded channel; a tokio task owns the accumulator and applies edits in
// arrival order. Stopping sends a `Finish` message down the same channel, so
// every key delivered before the stop is applied before the text is committed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use clipwright_core::keymap::{KeyAction, translate_key};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::buffer::{AppendOutcome, BufferStore};
use crate::sync::lock;
use crate::traits::{
    HookDecision, HookHandle, InputDriver, KeyDirection, KeyHookCallback, Modifier, RawKeyEvent,
};

const FINISH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("already in typing mode")]
    AlreadyActive,

    #[error("not in typing mode")]
    NotActive,

    #[error("failed to register keyboard hook: {0}")]
    Hook(#[source] anyhow::Error),
}

enum CaptureMsg {
    Key { name: String, shift: bool },
    Finish(oneshot::Sender<String>),
}

struct ActiveCapture {
    hook: HookHandle,
    tx: mpsc::UnboundedSender<CaptureMsg>,
    worker: JoinHandle<()>,
    // Read by the hook; flipped before unregistering so late deliveries pass through.
    live: Arc<AtomicBool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommit {
    /// Trimmed captured text, if any.
    pub text: Option<String>,
    pub outcome: Option<AppendOutcome>,
}

pub struct InputCapture {
    driver: Arc<dyn InputDriver>,
    buffer: Arc<BufferStore>,
    active: Mutex<Option<ActiveCapture>>,
    accumulated: Arc<AtomicUsize>,
}

impl InputCapture {
    pub fn new(driver: Arc<dyn InputDriver>, buffer: Arc<BufferStore>) -> Self {
        Self {
            driver,
            buffer,
            active: Mutex::new(None),
            accumulated: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Characters currently held in the accumulator.
    pub fn accumulated_chars(&self) -> usize {
        self.accumulated.load(Ordering::SeqCst)
    }

    /// Registers the raw-key hook and starts the accumulator task.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut active = lock(&self.active);
        if active.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(true));
        let callback = hook_callback(Arc::downgrade(&self.driver), tx.clone(), live.clone());

        let hook = self
            .driver
            .register_key_hook(callback)
            .map_err(CaptureError::Hook)?;

        self.accumulated.store(0, Ordering::SeqCst);
        let worker = tokio::spawn(accumulate(rx, self.accumulated.clone()));

        *active = Some(ActiveCapture {
            hook,
            tx,
            worker,
            live,
        });
        log::info!("typing mode started");
        Ok(())
    }

    /// Unhooks, then commits the trimmed accumulator as one buffer item.
    pub async fn stop(&self) -> Result<CaptureCommit, CaptureError> {
        let capture = lock(&self.active).take().ok_or(CaptureError::NotActive)?;
        let text = self.finish(capture).await;

        let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
        let outcome = text.as_deref().map(|t| self.buffer.append(t));
        match &outcome {
            Some(AppendOutcome::Appended(n)) => log::info!("typing mode stopped, added item {n}"),
            Some(other) => log::info!("typing mode stopped, nothing stored ({other:?})"),
            None => log::info!("typing mode stopped, no input was typed"),
        }
        Ok(CaptureCommit { text, outcome })
    }

    /// Unhooks and drops the accumulator without committing.
    pub async fn discard(&self) -> bool {
        let Some(capture) = lock(&self.active).take() else {
            return false;
        };
        let _ = self.finish(capture).await;
        log::info!("typing mode discarded");
        true
    }

    async fn finish(&self, capture: ActiveCapture) -> String {
        capture.live.store(false, Ordering::SeqCst);
        self.driver.unregister_key_hook(capture.hook);

        let (reply_tx, reply_rx) = oneshot::channel();
        let text = if capture.tx.send(CaptureMsg::Finish(reply_tx)).is_ok() {
            match tokio::time::timeout(FINISH_TIMEOUT, reply_rx).await {
                Ok(Ok(text)) => text,
                _ => {
                    log::warn!("capture task did not report its text; dropping it");
                    capture.worker.abort();
                    String::new()
                }
            }
        } else {
            String::new()
        };

        self.accumulated.store(0, Ordering::SeqCst);
        text
    }
}

fn hook_callback(
    driver: Weak<dyn InputDriver>,
    tx: mpsc::UnboundedSender<CaptureMsg>,
    live: Arc<AtomicBool>,
) -> KeyHookCallback {
    Arc::new(move |event: &RawKeyEvent| {
        if !live.load(Ordering::SeqCst) || event.direction != KeyDirection::Down {
            return HookDecision::PassThrough;
        }

        let Some(driver) = driver.upgrade() else {
            return HookDecision::PassThrough;
        };
        // Shortcuts such as Ctrl+C belong to the host, not to the captured text.
        if [Modifier::Control, Modifier::Alt, Modifier::Meta]
            .into_iter()
            .any(|m| driver.is_modifier_pressed(m))
        {
            return HookDecision::PassThrough;
        }
        let shift = driver.is_modifier_pressed(Modifier::Shift);

        // Modifiers and function keys keep reaching the host.
        let name = event.name.to_ascii_lowercase();
        if translate_key(&name, shift) == KeyAction::Ignore {
            return HookDecision::PassThrough;
        }

        // Unbounded send never blocks the hook thread.
        if tx.send(CaptureMsg::Key { name, shift }).is_err() {
            log::debug!("typing mode already finished; dropped key {:?}", event.name);
            return HookDecision::PassThrough;
        }
        HookDecision::Consume
    })
}

async fn accumulate(mut rx: mpsc::UnboundedReceiver<CaptureMsg>, count: Arc<AtomicUsize>) {
    let mut text = String::new();
    while let Some(msg) = rx.recv().await {
        match msg {
            CaptureMsg::Key { name, shift } => {
                match translate_key(&name, shift) {
                    KeyAction::Insert(c) => text.push(c),
                    KeyAction::Backspace => {
                        text.pop();
                    }
                    KeyAction::Ignore => {}
                }
                count.store(text.chars().count(), Ordering::SeqCst);
            }
            CaptureMsg::Finish(reply) => {
                let _ = reply.send(text);
                return;
            }
        }
    }
}
