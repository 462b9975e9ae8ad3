// Desktop input backend.
//
// - Clipboard: arboard, one long-lived handle (on X11 the process must stay
//   alive and keep the handle to own what it wrote).
// - Keystrokes: enigo, owned by a dedicated thread; callers send requests and
//   wait for the reply.
// - Raw keys: rdev's grab loop on its own thread, started with the first hook
//   registration. Returning `None` from the grab callback swallows the event.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clipwright_engine::traits::{
    HookDecision, HookHandle, InputDriver, KeyHookCallback, Modifier, RawKeyEvent,
};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

const PASTE_HOLD: Duration = Duration::from_millis(100);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

enum KeyOp {
    Char(char),
    Paste,
}

struct KeyRequest {
    op: KeyOp,
    reply: mpsc::Sender<anyhow::Result<()>>,
}

#[cfg(target_os = "macos")]
const PASTE_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const PASTE_MODIFIER: Key = Key::Control;

fn send_paste(enigo: &mut Enigo) -> anyhow::Result<()> {
    enigo
        .key(PASTE_MODIFIER, Direction::Press)
        .map_err(|e| anyhow::anyhow!("failed to press paste modifier: {e}"))?;
    let clicked = enigo
        .key(Key::Unicode('v'), Direction::Click)
        .map_err(|e| anyhow::anyhow!("failed to press V: {e}"));
    thread::sleep(PASTE_HOLD);
    // Always release, even if the click failed.
    enigo
        .key(PASTE_MODIFIER, Direction::Release)
        .map_err(|e| anyhow::anyhow!("failed to release paste modifier: {e}"))?;
    clicked
}

fn keyboard_thread(rx: mpsc::Receiver<KeyRequest>) {
    let mut enigo = match Enigo::new(&Settings::default()) {
        Ok(e) => Some(e),
        Err(e) => {
            log::error!("failed to init enigo: {e}");
            None
        }
    };

    while let Ok(req) = rx.recv() {
        let res = match enigo.as_mut() {
            None => Err(anyhow::anyhow!("keyboard injection is unavailable")),
            Some(enigo) => match req.op {
                KeyOp::Char(ch) => enigo
                    .text(ch.encode_utf8(&mut [0u8; 4]))
                    .map_err(|e| anyhow::anyhow!("failed to type {ch:?}: {e}")),
                KeyOp::Paste => send_paste(enigo),
            },
        };
        let _ = req.reply.send(res);
    }
}

fn key_name(key: rdev::Key) -> String {
    use rdev::Key as K;
    let fixed = match key {
        K::Space => "space",
        K::Return | K::KpReturn => "enter",
        K::Tab => "tab",
        K::Backspace => "backspace",
        K::Minus => "-",
        K::Equal => "=",
        K::LeftBracket => "[",
        K::RightBracket => "]",
        K::BackSlash => "\\",
        K::SemiColon => ";",
        K::Quote => "'",
        K::Comma => ",",
        K::Dot => ".",
        K::Slash => "/",
        K::BackQuote => "`",
        K::ShiftLeft | K::ShiftRight => "shift",
        K::ControlLeft | K::ControlRight => "ctrl",
        K::Alt | K::AltGr => "alt",
        K::MetaLeft | K::MetaRight => "meta",
        _ => "",
    };
    if !fixed.is_empty() {
        return fixed.to_string();
    }

    // "KeyA" -> "a", "Num7" -> "7", anything else keeps its lowercased name.
    let debug = format!("{key:?}");
    match debug
        .strip_prefix("Key")
        .or_else(|| debug.strip_prefix("Num"))
    {
        Some(rest) if rest.chars().count() == 1 => rest.to_ascii_lowercase(),
        _ => debug.to_ascii_lowercase(),
    }
}

fn modifier_of(key: rdev::Key) -> Option<Modifier> {
    use rdev::Key as K;
    match key {
        K::ShiftLeft | K::ShiftRight => Some(Modifier::Shift),
        K::ControlLeft | K::ControlRight => Some(Modifier::Control),
        K::Alt | K::AltGr => Some(Modifier::Alt),
        K::MetaLeft | K::MetaRight => Some(Modifier::Meta),
        _ => None,
    }
}

fn modifier_slot(m: Modifier) -> usize {
    match m {
        Modifier::Shift => 0,
        Modifier::Control => 1,
        Modifier::Alt => 2,
        Modifier::Meta => 3,
    }
}

#[derive(Default)]
struct HookRegistry {
    hooks: Mutex<BTreeMap<u64, KeyHookCallback>>,
    next: AtomicU64,
    modifiers: [AtomicBool; 4],
    started: AtomicBool,
    failed: AtomicBool,
}

impl HookRegistry {
    fn dispatch(&self, event: rdev::Event) -> Option<rdev::Event> {
        let raw = match event.event_type {
            rdev::EventType::KeyPress(key) => {
                if let Some(m) = modifier_of(key) {
                    self.modifiers[modifier_slot(m)].store(true, Ordering::SeqCst);
                }
                RawKeyEvent::down(key_name(key))
            }
            rdev::EventType::KeyRelease(key) => {
                if let Some(m) = modifier_of(key) {
                    self.modifiers[modifier_slot(m)].store(false, Ordering::SeqCst);
                }
                RawKeyEvent::up(key_name(key))
            }
            _ => return Some(event),
        };

        let hooks: Vec<KeyHookCallback> = lock(&self.hooks).values().cloned().collect();
        let mut consumed = false;
        for hook in &hooks {
            if hook(&raw) == HookDecision::Consume {
                consumed = true;
            }
        }
        if consumed { None } else { Some(event) }
    }
}

/// `InputDriver` for a real desktop session.
pub struct DesktopDriver {
    clipboard: Mutex<Option<arboard::Clipboard>>,
    keys: Mutex<mpsc::Sender<KeyRequest>>,
    registry: Arc<HookRegistry>,
}

impl DesktopDriver {
    pub fn new() -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("clipwright-keys".into())
            .spawn(move || keyboard_thread(rx))
            .context("failed to spawn keyboard thread")?;

        Ok(Self {
            clipboard: Mutex::new(None),
            keys: Mutex::new(tx),
            registry: Arc::new(HookRegistry::default()),
        })
    }

    fn with_clipboard<T>(
        &self,
        f: impl FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error>,
    ) -> anyhow::Result<T> {
        let mut slot = lock(&self.clipboard);
        if slot.is_none() {
            *slot = Some(arboard::Clipboard::new().context("failed to open clipboard")?);
        }
        let clipboard = slot
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("clipboard unavailable"))?;
        match f(clipboard) {
            Ok(v) => Ok(v),
            Err(e) => {
                // Reopen on the next call; the handle may be stale.
                *slot = None;
                Err(e.into())
            }
        }
    }

    fn key_request(&self, op: KeyOp) -> anyhow::Result<()> {
        let (reply, rx) = mpsc::channel();
        lock(&self.keys)
            .send(KeyRequest { op, reply })
            .map_err(|_| anyhow::anyhow!("keyboard thread is gone"))?;
        rx.recv()
            .map_err(|_| anyhow::anyhow!("keyboard thread dropped the request"))?
    }

    fn ensure_grab_loop(&self) -> anyhow::Result<()> {
        if self.registry.failed.load(Ordering::SeqCst) {
            anyhow::bail!("keyboard hook is unavailable (missing input permissions?)");
        }
        if self.registry.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let registry = self.registry.clone();
        thread::Builder::new()
            .name("clipwright-hook".into())
            .spawn(move || {
                let dispatch = registry.clone();
                // Blocks for the life of the process unless grabbing fails.
                if let Err(e) = rdev::grab(move |event| dispatch.dispatch(event)) {
                    log::error!("keyboard hook stopped: {e:?}");
                    registry.failed.store(true, Ordering::SeqCst);
                    registry.started.store(false, Ordering::SeqCst);
                }
            })
            .context("failed to spawn keyboard hook thread")?;
        Ok(())
    }
}

impl InputDriver for DesktopDriver {
    fn read_clipboard(&self) -> anyhow::Result<String> {
        match self.with_clipboard(|c| c.get_text()) {
            Ok(text) => Ok(text),
            // Non-text or empty clipboard.
            Err(e)
                if matches!(
                    e.downcast_ref::<arboard::Error>(),
                    Some(arboard::Error::ContentNotAvailable)
                ) =>
            {
                Ok(String::new())
            }
            Err(e) => Err(e.context("failed to read clipboard")),
        }
    }

    fn write_clipboard(&self, text: &str) -> anyhow::Result<()> {
        self.with_clipboard(|c| c.set_text(text.to_string()))
            .context("failed to write clipboard")
    }

    fn simulate_paste(&self) -> anyhow::Result<()> {
        self.key_request(KeyOp::Paste)
    }

    fn type_character(&self, ch: char) -> anyhow::Result<()> {
        self.key_request(KeyOp::Char(ch))
    }

    fn is_modifier_pressed(&self, modifier: Modifier) -> bool {
        self.registry.modifiers[modifier_slot(modifier)].load(Ordering::SeqCst)
    }

    fn register_key_hook(&self, callback: KeyHookCallback) -> anyhow::Result<HookHandle> {
        self.ensure_grab_loop()?;
        let id = self.registry.next.fetch_add(1, Ordering::SeqCst);
        lock(&self.registry.hooks).insert(id, callback);
        Ok(HookHandle(id))
    }

    fn unregister_key_hook(&self, handle: HookHandle) {
        lock(&self.registry.hooks).remove(&handle.0);
    }
}
