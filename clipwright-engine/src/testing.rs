// In-crate doubles for unit tests. Integration tests use clipwright-platform's
// MemoryDriver instead.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::traits::{HookDecision, HookHandle, InputDriver, KeyHookCallback, Modifier, RawKeyEvent};

#[derive(Default)]
pub(crate) struct FakeDriver {
    pub clipboard: Mutex<String>,
    pub fail_reads: AtomicBool,
    pub reads: AtomicU64,
    pub typed: Mutex<String>,
    pub fail_typing: AtomicBool,
    modifiers: Mutex<HashSet<Modifier>>,
    hooks: Mutex<HashMap<u64, KeyHookCallback>>,
    next_hook: AtomicU64,
}

impl FakeDriver {
    pub fn set_clipboard(&self, text: &str) {
        *self.clipboard.lock().unwrap() = text.to_string();
    }

    pub fn typed(&self) -> String {
        self.typed.lock().unwrap().clone()
    }

    pub fn set_modifier(&self, modifier: Modifier, pressed: bool) {
        let mut m = self.modifiers.lock().unwrap();
        if pressed {
            m.insert(modifier);
        } else {
            m.remove(&modifier);
        }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().unwrap().len()
    }

    pub fn press(&self, name: &str) -> Vec<HookDecision> {
        let hooks: Vec<KeyHookCallback> = self.hooks.lock().unwrap().values().cloned().collect();
        let ev = RawKeyEvent::down(name);
        hooks.iter().map(|cb| cb(&ev)).collect()
    }

    pub fn release(&self, name: &str) -> Vec<HookDecision> {
        let hooks: Vec<KeyHookCallback> = self.hooks.lock().unwrap().values().cloned().collect();
        let ev = RawKeyEvent::up(name);
        hooks.iter().map(|cb| cb(&ev)).collect()
    }
}

impl InputDriver for FakeDriver {
    fn read_clipboard(&self) -> anyhow::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("clipboard busy");
        }
        Ok(self.clipboard.lock().unwrap().clone())
    }

    fn write_clipboard(&self, text: &str) -> anyhow::Result<()> {
        self.set_clipboard(text);
        Ok(())
    }

    fn simulate_paste(&self) -> anyhow::Result<()> {
        let text = self.clipboard.lock().unwrap().clone();
        self.typed.lock().unwrap().push_str(&text);
        Ok(())
    }

    fn type_character(&self, ch: char) -> anyhow::Result<()> {
        if self.fail_typing.load(Ordering::SeqCst) {
            anyhow::bail!("keystroke rejected");
        }
        self.typed.lock().unwrap().push(ch);
        Ok(())
    }

    fn is_modifier_pressed(&self, modifier: Modifier) -> bool {
        self.modifiers.lock().unwrap().contains(&modifier)
    }

    fn register_key_hook(&self, callback: KeyHookCallback) -> anyhow::Result<HookHandle> {
        let id = self.next_hook.fetch_add(1, Ordering::SeqCst);
        self.hooks.lock().unwrap().insert(id, callback);
        Ok(HookHandle(id))
    }

    fn unregister_key_hook(&self, handle: HookHandle) {
        self.hooks.lock().unwrap().remove(&handle.0);
    }
}
