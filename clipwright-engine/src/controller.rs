use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clipwright_core::config::{AppConfig, TimingSettings};
use clipwright_core::text::{filter_response_output, preview_text};
use clipwright_core::types::{BufferItem, Command, SessionId, SessionState, SpeedMultiplier};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::buffer::{AppendOutcome, BufferStore};
use crate::capture::{CaptureError, InputCapture};
use crate::emitter::{StopStatus, TypingEmitter};
use crate::monitor::ClipboardMonitor;
use crate::session::{Accepted, CaptureStatus, CommandOutcome, SessionStatus, accepted, rejected};
use crate::traits::{GeneratedResponse, InputDriver, NotificationSink, ResponseProvider, on_driver};

const NOTIFY_TITLE: &str = "Clipwright";
const IN_FLIGHT: &str = "a request is in flight";

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub timing: TimingSettings,
    pub notifications_enabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timing: TimingSettings::default(),
            notifications_enabled: true,
        }
    }
}

impl From<&AppConfig> for ControllerConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            timing: cfg.timing.clone(),
            notifications_enabled: cfg.notifications_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Gate {
    state: SessionState,
    exited: bool,
    capture_active: bool,
    typing_active: bool,
    response_available: bool,
}

/// The single place that decides whether a command is legal right now.
fn check(command: Command, g: &Gate) -> Result<(), &'static str> {
    use SessionState::*;

    if g.exited {
        return match command {
            Command::Exit | Command::ShowStatus => Ok(()),
            _ => Err("session has exited"),
        };
    }

    match command {
        Command::StartCollecting => match g.state {
            Idle | ResponseReady => Ok(()),
            Collecting => Err("already collecting"),
            AwaitingResponse => Err(IN_FLIGHT),
        },
        Command::AddToBuffer => match g.state {
            Collecting | ResponseReady => Ok(()),
            Idle => Err("start collecting first"),
            AwaitingResponse => Err(IN_FLIGHT),
        },
        Command::FinishCollecting => match g.state {
            Collecting => Ok(()),
            AwaitingResponse => Err(IN_FLIGHT),
            Idle | ResponseReady => Err("not collecting"),
        },
        Command::StartTypingMode => match g.state {
            Collecting if g.capture_active => Err("already in typing mode"),
            Collecting => Ok(()),
            AwaitingResponse => Err(IN_FLIGHT),
            Idle | ResponseReady => Err("start collecting first"),
        },
        Command::StopTypingMode => {
            if g.state == AwaitingResponse {
                Err(IN_FLIGHT)
            } else if g.capture_active {
                Ok(())
            } else {
                Err("not in typing mode")
            }
        }
        Command::PasteResponse => {
            if g.state != ResponseReady || !g.response_available {
                Err("no response available")
            } else if g.typing_active {
                Err("typing in progress")
            } else {
                Ok(())
            }
        }
        Command::TypeResponse => {
            if g.state != ResponseReady || !g.response_available {
                Err("no response available")
            } else if g.typing_active {
                Err("already typing")
            } else {
                Ok(())
            }
        }
        Command::PauseTyping | Command::StopTyping => {
            if g.typing_active {
                Ok(())
            } else {
                Err("no typing in progress")
            }
        }
        Command::ClearBuffer
        | Command::IncreaseSpeed
        | Command::DecreaseSpeed
        | Command::ResetSpeed
        | Command::ShowStatus
        | Command::Exit => Ok(()),
    }
}

/// Clipboard content to put back once a paste has landed.
struct PendingRestore {
    original: String,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    session_id: Option<SessionId>,
    // Bumped whenever an in-flight request's result must no longer land.
    epoch: u64,
    response: Option<String>,
    last_error: Option<String>,
    request: Option<JoinHandle<()>>,
    restore: Option<PendingRestore>,
    exited: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    running: AtomicBool,
    buffer: Arc<BufferStore>,
    monitor: ClipboardMonitor,
    capture: InputCapture,
    emitter: Arc<TypingEmitter>,
    provider: Arc<dyn ResponseProvider>,
    driver: Arc<dyn InputDriver>,
    notifier: Arc<dyn NotificationSink>,
    cfg: ControllerConfig,
}

impl Shared {
    fn gate(&self, inner: &Inner) -> Gate {
        Gate {
            state: inner.state,
            exited: inner.exited,
            capture_active: self.capture.is_active(),
            typing_active: self.emitter.is_active(),
            response_available: inner.response.is_some(),
        }
    }

    fn set_state(&self, inner: &mut Inner, next: SessionState) {
        let prev = inner.state;
        inner.state = next;
        if prev != next {
            log::info!("session state: {:?} -> {:?}", prev, next);
        }
    }

    fn notify(&self, message: &str) {
        if self.cfg.notifications_enabled {
            self.notifier.notify(NOTIFY_TITLE, message);
        }
    }

    async fn complete_request(&self, epoch: u64, res: anyhow::Result<GeneratedResponse>) {
        let mut inner = self.inner.lock().await;
        if inner.exited || inner.epoch != epoch || inner.state != SessionState::AwaitingResponse {
            log::info!("discarding response for superseded request {epoch}");
            return;
        }
        inner.request = None;

        let res = res.and_then(|r| {
            let text = filter_response_output(&r.text);
            if text.is_empty() {
                Err(anyhow::anyhow!("{} returned an empty response", r.provider))
            } else {
                Ok((text, r))
            }
        });

        match res {
            Ok((text, r)) => {
                log::info!(
                    "response received from {} ({}), {} chars: {}",
                    r.provider,
                    r.model,
                    text.chars().count(),
                    preview_text(&text, 100)
                );
                inner.response = Some(text);
                inner.last_error = None;
                self.set_state(&mut inner, SessionState::ResponseReady);
                self.notify("Response ready. Paste it or type it out.");
            }
            Err(e) => {
                let msg = format!("{e:#}");
                log::error!("request failed: {msg}");
                inner.last_error = Some(msg);
                self.set_state(&mut inner, SessionState::Collecting);
                self.monitor.enable().await;
                self.notify("Request failed. Your items are still collected; try again.");
            }
        }
    }

    async fn stop_emitter(&self) -> Option<StopStatus> {
        if !self.emitter.is_active() {
            return None;
        }
        let emitter = self.emitter.clone();
        match tokio::task::spawn_blocking(move || emitter.stop()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(_)) => None,
            Err(e) => {
                log::error!("typing stop task failed: {e}");
                None
            }
        }
    }

    /// Puts the saved clipboard back now instead of after the delay.
    ///
    /// Must run before the monitor is seeded, so the restored text counts as
    /// already observed rather than as a new copy.
    async fn restore_clipboard_now(&self, inner: &mut Inner) {
        let Some(pending) = inner.restore.take() else {
            return;
        };
        if pending.task.is_finished() {
            return;
        }
        pending.task.abort();
        let original = pending.original;
        if let Err(e) = on_driver(&self.driver, move |d| d.write_clipboard(&original)).await {
            log::debug!("clipboard restore failed: {e}");
        }
    }

    /// Stops every loop and hook and invalidates any in-flight request.
    async fn wind_down(&self, inner: &mut Inner) {
        if let Some(StopStatus::TimedOut { .. }) = self.stop_emitter().await {
            log::warn!("typing loop still winding down");
        }
        self.capture.discard().await;
        self.monitor.disable();
        self.restore_clipboard_now(inner).await;
        if let Some(task) = inner.request.take() {
            task.abort();
        }
        inner.epoch += 1;
    }
}

/// Owns the session state machine and its sub-components.
///
/// All interaction goes through the command methods; cloning is cheap and
/// every clone drives the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        cfg: ControllerConfig,
        driver: Arc<dyn InputDriver>,
        provider: Arc<dyn ResponseProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let buffer = Arc::new(BufferStore::new());
        let monitor = ClipboardMonitor::new(driver.clone(), buffer.clone(), &cfg.timing);
        let capture = InputCapture::new(driver.clone(), buffer.clone());

        let mut emitter = TypingEmitter::new(driver.clone(), &cfg.timing);
        if cfg.notifications_enabled {
            emitter = emitter.with_notifier(notifier.clone());
        }

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                running: AtomicBool::new(true),
                buffer,
                monitor,
                capture,
                emitter: Arc::new(emitter),
                provider,
                driver,
                notifier,
                cfg,
            }),
        }
    }

    /// False once `exit` has run.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub async fn handle(&self, command: Command) -> CommandOutcome {
        match command {
            Command::StartCollecting => self.start_collecting().await,
            Command::AddToBuffer => self.add_to_buffer().await,
            Command::FinishCollecting => self.finish_collecting().await,
            Command::ClearBuffer => self.clear_buffer().await,
            Command::StartTypingMode => self.start_typing_mode().await,
            Command::StopTypingMode => self.stop_typing_mode().await,
            Command::PasteResponse => self.paste_response().await,
            Command::TypeResponse => self.type_response().await,
            Command::PauseTyping => self.pause_typing().await,
            Command::StopTyping => self.stop_typing().await,
            Command::IncreaseSpeed => self.change_speed(Command::IncreaseSpeed).await,
            Command::DecreaseSpeed => self.change_speed(Command::DecreaseSpeed).await,
            Command::ResetSpeed => self.change_speed(Command::ResetSpeed).await,
            Command::ShowStatus => self.show_status().await,
            Command::Exit => self.exit().await,
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let s = &self.shared;
        let inner = s.inner.lock().await;
        let gate = s.gate(&inner);

        let typing = s.emitter.status();
        let speed = typing.speed;
        SessionStatus {
            state: inner.state,
            state_label: inner.state.label().into(),
            session_id: inner.session_id,
            running: self.is_running(),
            items: s
                .buffer
                .snapshot()
                .into_iter()
                .map(BufferItem::into_string)
                .collect(),
            response_available: inner.response.is_some(),
            response_preview: inner
                .response
                .as_deref()
                .map(SessionStatus::preview_response),
            capture: CaptureStatus {
                active: gate.capture_active,
                accumulated_chars: s.capture.accumulated_chars(),
            },
            typing,
            speed,
            chars_per_second: s.cfg.timing.chars_per_second(speed.value()),
            last_error: inner.last_error.clone(),
            available_commands: Command::ALL
                .into_iter()
                .filter(|c| check(*c, &gate).is_ok())
                .collect(),
        }
    }

    pub async fn start_collecting(&self) -> CommandOutcome {
        let cmd = Command::StartCollecting;
        let s = &self.shared;
        let mut inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        s.stop_emitter().await;
        s.restore_clipboard_now(&mut inner).await;
        s.buffer.clear();
        inner.response = None;
        inner.last_error = None;
        inner.session_id = Some(SessionId::new());
        inner.epoch += 1;
        s.set_state(&mut inner, SessionState::Collecting);
        s.monitor.enable().await;

        accepted(cmd, "collecting; copy anything and it will be added")
    }

    pub async fn add_to_buffer(&self) -> CommandOutcome {
        let cmd = Command::AddToBuffer;
        let s = &self.shared;
        let inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        // Give a copy that is still being written a moment to land.
        tokio::time::sleep(s.cfg.timing.clipboard_settle()).await;

        let raw = match on_driver(&s.driver, |d| d.read_clipboard()).await {
            Ok(raw) => raw,
            Err(e) => return rejected(cmd, format!("could not read clipboard: {e}")),
        };
        match s.buffer.append(&raw) {
            AppendOutcome::Appended(n) => accepted(
                cmd,
                format!("added item {n}: {}", preview_text(raw.trim(), 50)),
            ),
            AppendOutcome::Empty => rejected(cmd, "clipboard is empty or only whitespace"),
            AppendOutcome::Duplicate => rejected(cmd, "item already in buffer"),
        }
    }

    pub async fn finish_collecting(&self) -> CommandOutcome {
        let cmd = Command::FinishCollecting;
        let s = &self.shared;
        let mut inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        if s.capture.is_active() {
            if let Ok(commit) = s.capture.stop().await {
                log::info!("typing mode flushed before sending: {:?}", commit.outcome);
            }
        }
        s.monitor.disable();

        if s.buffer.is_empty() {
            s.monitor.enable().await;
            return rejected(cmd, "nothing collected");
        }

        let items = s.buffer.snapshot();
        let count = items.len();
        inner.epoch += 1;
        let epoch = inner.epoch;
        inner.last_error = None;
        s.set_state(&mut inner, SessionState::AwaitingResponse);
        s.notify(&format!("Sending {count} collected items..."));

        let shared = self.shared.clone();
        inner.request = Some(tokio::spawn(async move {
            let res = shared.provider.submit(&items).await;
            shared.complete_request(epoch, res).await;
        }));

        accepted(cmd, format!("sent {count} items; waiting for the response"))
    }

    pub async fn clear_buffer(&self) -> CommandOutcome {
        let cmd = Command::ClearBuffer;
        let s = &self.shared;
        let mut inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        s.wind_down(&mut inner).await;
        s.buffer.clear();
        inner.response = None;
        inner.last_error = None;
        inner.session_id = None;
        s.set_state(&mut inner, SessionState::Idle);

        accepted(cmd, "buffer cleared")
    }

    pub async fn start_typing_mode(&self) -> CommandOutcome {
        let cmd = Command::StartTypingMode;
        let s = &self.shared;
        let inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        match s.capture.start() {
            Ok(()) => accepted(cmd, "typing mode on; stop it to add what you typed"),
            Err(CaptureError::Hook(e)) => rejected(cmd, format!("keyboard hook unavailable: {e:#}")),
            Err(e) => rejected(cmd, e.to_string()),
        }
    }

    pub async fn stop_typing_mode(&self) -> CommandOutcome {
        let cmd = Command::StopTypingMode;
        let s = &self.shared;
        let inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        match s.capture.stop().await {
            Ok(commit) => match (commit.text, commit.outcome) {
                (Some(text), Some(AppendOutcome::Appended(n))) => accepted(
                    cmd,
                    format!("added typed input as item {n}: {}", preview_text(&text, 50)),
                ),
                (Some(_), _) => accepted(cmd, "typing mode off; input matched the last item"),
                (None, _) => accepted(cmd, "typing mode off; no input was typed"),
            },
            Err(e) => rejected(cmd, e.to_string()),
        }
    }

    pub async fn paste_response(&self) -> CommandOutcome {
        let cmd = Command::PasteResponse;
        let s = &self.shared;
        let mut inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }
        let Some(text) = inner.response.clone() else {
            return rejected(cmd, "no response available");
        };

        // A restore still pending from an earlier paste holds the user's own
        // clipboard; the live clipboard only has the previous paste in it.
        let original = match inner.restore.take() {
            Some(pending) => {
                pending.task.abort();
                Some(pending.original)
            }
            None => on_driver(&s.driver, |d| d.read_clipboard()).await.ok(),
        };
        if let Err(e) = on_driver(&s.driver, move |d| d.write_clipboard(&text)).await {
            return rejected(cmd, format!("could not write clipboard: {e}"));
        }
        tokio::time::sleep(s.cfg.timing.clipboard_settle()).await;

        if let Err(e) = on_driver(&s.driver, |d| d.simulate_paste()).await {
            return rejected(
                cmd,
                format!("paste failed ({e}); the response is on the clipboard, paste it manually"),
            );
        }

        if let Some(original) = original {
            let driver = s.driver.clone();
            let delay = s.cfg.timing.paste_restore_delay();
            let saved = original.clone();
            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = on_driver(&driver, move |d| d.write_clipboard(&saved)).await {
                    log::debug!("clipboard restore failed: {e}");
                }
            });
            inner.restore = Some(PendingRestore { original, task });
        }

        accepted(cmd, "response pasted")
    }

    pub async fn type_response(&self) -> CommandOutcome {
        let cmd = Command::TypeResponse;
        let s = &self.shared;
        let inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }
        let Some(text) = inner.response.as_deref() else {
            return rejected(cmd, "no response available");
        };

        match s.emitter.start(text) {
            Ok(()) => accepted(
                cmd,
                format!(
                    "typing {} chars at {} in {:?}; focus the target window",
                    text.chars().count(),
                    s.emitter.speed(),
                    s.cfg.timing.typing_start_delay()
                ),
            ),
            Err(e) => rejected(cmd, e.to_string()),
        }
    }

    pub async fn pause_typing(&self) -> CommandOutcome {
        let cmd = Command::PauseTyping;
        let s = &self.shared;
        let inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        match s.emitter.toggle_pause() {
            Ok((true, cursor)) => accepted(cmd, format!("typing paused at {cursor} chars")),
            Ok((false, _)) => accepted(cmd, "typing resumed"),
            Err(e) => rejected(cmd, e.to_string()),
        }
    }

    pub async fn stop_typing(&self) -> CommandOutcome {
        let cmd = Command::StopTyping;
        let s = &self.shared;
        let inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        match s.stop_emitter().await {
            Some(StopStatus::Confirmed { cursor, total }) => {
                accepted(cmd, format!("typing stopped at {cursor}/{total}"))
            }
            Some(StopStatus::TimedOut { cursor, total }) => accepted(
                cmd,
                format!(
                    "stop requested at {cursor}/{total}; the typing loop has not confirmed yet and may still be winding down"
                ),
            ),
            None => rejected(cmd, "no typing in progress"),
        }
    }

    async fn change_speed(&self, cmd: Command) -> CommandOutcome {
        let s = &self.shared;
        let inner = s.inner.lock().await;
        if let Err(reason) = check(cmd, &s.gate(&inner)) {
            return rejected(cmd, reason);
        }

        let (old, new) = match cmd {
            Command::IncreaseSpeed => s.emitter.increase_speed(),
            Command::DecreaseSpeed => s.emitter.decrease_speed(),
            _ => s.emitter.reset_speed(),
        };
        let cps = s.cfg.timing.chars_per_second(new.value());
        let mut message = format!("speed {old} -> {new} ({cps:.0} chars/sec)");
        if cmd == Command::IncreaseSpeed && new.is_max() {
            message.push_str("; maximum reached");
        } else if cmd == Command::DecreaseSpeed && new.is_min() {
            message.push_str("; minimum reached");
        }
        if !s.emitter.is_active() && new != SpeedMultiplier::NORMAL {
            message.push_str("; applies to the next typing run");
        }
        accepted(cmd, message)
    }

    pub async fn increase_speed(&self) -> CommandOutcome {
        self.change_speed(Command::IncreaseSpeed).await
    }

    pub async fn decrease_speed(&self) -> CommandOutcome {
        self.change_speed(Command::DecreaseSpeed).await
    }

    pub async fn reset_speed(&self) -> CommandOutcome {
        self.change_speed(Command::ResetSpeed).await
    }

    pub async fn show_status(&self) -> CommandOutcome {
        let status = self.status().await;
        // Not routed through `accepted`: the report is too long for the log.
        Ok(Accepted {
            command: Command::ShowStatus,
            message: status.render(),
        })
    }

    /// Terminal and idempotent.
    pub async fn exit(&self) -> CommandOutcome {
        let cmd = Command::Exit;
        let s = &self.shared;
        let mut inner = s.inner.lock().await;
        if inner.exited {
            return accepted(cmd, "already exited");
        }

        s.wind_down(&mut inner).await;
        inner.exited = true;
        s.running.store(false, Ordering::SeqCst);

        accepted(cmd, "exiting")
    }
}
