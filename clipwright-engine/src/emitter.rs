// Character-by-character replay of a response through the InputDriver.
//
// One dedicated thread per job. All control flags live in a single mutex with
// a condvar: pause parks the thread on the condvar (cursor frozen), and the
// inter-character sleep is a timed condvar wait so `stop` cuts it short.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use clipwright_core::config::TimingSettings;
use clipwright_core::types::SpeedMultiplier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::lock;
use crate::traits::{InputDriver, NotificationSink};

const PROGRESS_LOG_EVERY: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitterError {
    #[error("already typing")]
    AlreadyTyping,

    #[error("no typing in progress")]
    NotTyping,

    #[error("nothing to type")]
    EmptyText,

    #[error("failed to spawn typing thread: {0}")]
    Spawn(String),
}

/// Result of a bounded `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    /// The loop exited within the timeout.
    Confirmed { cursor: usize, total: usize },
    /// The loop saw no stop in time; it will emit nothing more once it does,
    /// but its thread may still be winding down.
    TimedOut { cursor: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionOutcome {
    Completed { total: usize },
    Stopped { cursor: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingStatus {
    pub active: bool,
    pub paused: bool,
    pub cursor: usize,
    pub total: usize,
    pub progress_percent: Option<f64>,
    pub speed: SpeedMultiplier,
    pub last_outcome: Option<EmissionOutcome>,
}

#[derive(Debug)]
struct TypingJob {
    id: u64,
    text: Vec<char>,
    cursor: usize,
    paused: bool,
    stopped: bool,
}

impl TypingJob {
    fn percent(&self) -> f64 {
        if self.text.is_empty() {
            return 100.0;
        }
        self.cursor as f64 / self.text.len() as f64 * 100.0
    }
}

#[derive(Debug, Default)]
struct EmitterState {
    speed: SpeedMultiplier,
    job: Option<TypingJob>,
    next_id: u64,
    last_outcome: Option<EmissionOutcome>,
}

impl EmitterState {
    fn holds_job(&self, id: u64) -> bool {
        self.job.as_ref().is_some_and(|j| j.id == id)
    }

    fn job_stopped(&self, id: u64) -> bool {
        match &self.job {
            Some(j) if j.id == id => j.stopped,
            _ => true,
        }
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<EmitterState>,
    wake: Condvar,
}

impl Shared {
    fn wait_while<'a>(
        &self,
        guard: MutexGuard<'a, EmitterState>,
        cond: impl FnMut(&mut EmitterState) -> bool,
    ) -> MutexGuard<'a, EmitterState> {
        self.wake
            .wait_while(guard, cond)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout_while<'a>(
        &self,
        guard: MutexGuard<'a, EmitterState>,
        timeout: Duration,
        cond: impl FnMut(&mut EmitterState) -> bool,
    ) -> (MutexGuard<'a, EmitterState>, bool) {
        let (guard, res) = self
            .wake
            .wait_timeout_while(guard, timeout, cond)
            .unwrap_or_else(PoisonError::into_inner);
        (guard, res.timed_out())
    }
}

pub struct TypingEmitter {
    driver: Arc<dyn InputDriver>,
    shared: Arc<Shared>,
    base_interval: Duration,
    start_delay: Duration,
    stop_timeout: Duration,
    notifier: Option<Arc<dyn NotificationSink>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TypingEmitter {
    pub fn new(driver: Arc<dyn InputDriver>, timing: &TimingSettings) -> Self {
        Self {
            driver,
            shared: Arc::new(Shared::default()),
            base_interval: timing.base_char_interval(),
            start_delay: timing.typing_start_delay(),
            stop_timeout: timing.stop_timeout(),
            notifier: None,
            worker: Mutex::new(None),
        }
    }

    /// Told once per job that runs to completion.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn start(&self, text: &str) -> Result<(), EmitterError> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Err(EmitterError::EmptyText);
        }

        let mut worker = lock(&self.worker);
        let id = {
            let mut st = lock(&self.shared.state);
            if st.job.is_some() {
                return Err(EmitterError::AlreadyTyping);
            }
            st.next_id += 1;
            let id = st.next_id;
            st.job = Some(TypingJob {
                id,
                text: chars,
                cursor: 0,
                paused: false,
                stopped: false,
            });
            log::info!("typing started at {} ({} chars)", st.speed, text.chars().count());
            id
        };

        // The previous job has released its slot, so its thread is done or nearly so.
        if let Some(old) = worker.take() {
            let _ = old.join();
        }

        let run = EmissionLoop {
            id,
            shared: self.shared.clone(),
            driver: self.driver.clone(),
            base_interval: self.base_interval,
            start_delay: self.start_delay,
            notifier: self.notifier.clone(),
        };

        match std::thread::Builder::new()
            .name("clipwright-typing".into())
            .spawn(move || run.run())
        {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                lock(&self.shared.state).job = None;
                Err(EmitterError::Spawn(e.to_string()))
            }
        }
    }

    pub fn pause(&self) -> Result<usize, EmitterError> {
        self.set_paused(Some(true)).map(|(_, cursor)| cursor)
    }

    pub fn resume(&self) -> Result<usize, EmitterError> {
        self.set_paused(Some(false)).map(|(_, cursor)| cursor)
    }

    /// Flips pause; returns the new paused flag and the cursor.
    pub fn toggle_pause(&self) -> Result<(bool, usize), EmitterError> {
        self.set_paused(None)
    }

    fn set_paused(&self, value: Option<bool>) -> Result<(bool, usize), EmitterError> {
        let mut st = lock(&self.shared.state);
        let job = st
            .job
            .as_mut()
            .filter(|j| !j.stopped)
            .ok_or(EmitterError::NotTyping)?;
        job.paused = value.unwrap_or(!job.paused);
        let out = (job.paused, job.cursor);
        if job.paused {
            log::info!("typing paused at {:.1}% ({} chars)", job.percent(), job.cursor);
        } else {
            log::info!("typing resumed");
        }
        drop(st);
        self.shared.wake.notify_all();
        Ok(out)
    }

    /// Asks the loop to exit and waits up to the stop timeout for it to do so.
    pub fn stop(&self) -> Result<StopStatus, EmitterError> {
        let mut st = lock(&self.shared.state);
        let Some(job) = st.job.as_mut() else {
            return Err(EmitterError::NotTyping);
        };
        job.stopped = true;
        job.paused = false;
        let (id, total) = (job.id, job.text.len());
        self.shared.wake.notify_all();

        let (st, timed_out) =
            self.shared
                .wait_timeout_while(st, self.stop_timeout, |s| s.holds_job(id));

        if timed_out {
            let cursor = st.job.as_ref().map(|j| j.cursor).unwrap_or(0);
            drop(st);
            log::warn!(
                "typing loop did not exit within {:?}; it may still be winding down",
                self.stop_timeout
            );
            return Ok(StopStatus::TimedOut { cursor, total });
        }

        let cursor = match st.last_outcome {
            Some(EmissionOutcome::Stopped { cursor, .. }) => cursor,
            _ => total,
        };
        drop(st);

        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }
        Ok(StopStatus::Confirmed { cursor, total })
    }

    pub fn is_active(&self) -> bool {
        lock(&self.shared.state).job.is_some()
    }

    /// Percent of the active job emitted so far.
    pub fn progress(&self) -> Option<f64> {
        lock(&self.shared.state).job.as_ref().map(TypingJob::percent)
    }

    pub fn speed(&self) -> SpeedMultiplier {
        lock(&self.shared.state).speed
    }

    /// Doubles the multiplier; returns (old, new).
    pub fn increase_speed(&self) -> (SpeedMultiplier, SpeedMultiplier) {
        self.update_speed(SpeedMultiplier::doubled)
    }

    pub fn decrease_speed(&self) -> (SpeedMultiplier, SpeedMultiplier) {
        self.update_speed(SpeedMultiplier::halved)
    }

    pub fn reset_speed(&self) -> (SpeedMultiplier, SpeedMultiplier) {
        self.update_speed(|_| SpeedMultiplier::NORMAL)
    }

    fn update_speed(
        &self,
        f: impl FnOnce(SpeedMultiplier) -> SpeedMultiplier,
    ) -> (SpeedMultiplier, SpeedMultiplier) {
        let mut st = lock(&self.shared.state);
        let old = st.speed;
        st.speed = f(old);
        log::info!("typing speed {old} -> {}", st.speed);
        (old, st.speed)
    }

    pub fn status(&self) -> TypingStatus {
        let st = lock(&self.shared.state);
        match &st.job {
            Some(job) => TypingStatus {
                active: true,
                paused: job.paused,
                cursor: job.cursor,
                total: job.text.len(),
                progress_percent: Some(job.percent()),
                speed: st.speed,
                last_outcome: st.last_outcome,
            },
            None => TypingStatus {
                active: false,
                paused: false,
                cursor: 0,
                total: 0,
                progress_percent: None,
                speed: st.speed,
                last_outcome: st.last_outcome,
            },
        }
    }
}

impl Drop for TypingEmitter {
    // Detach without joining; the loop exits at its next check.
    fn drop(&mut self) {
        if let Some(job) = lock(&self.shared.state).job.as_mut() {
            job.stopped = true;
            job.paused = false;
        }
        self.shared.wake.notify_all();
    }
}

struct EmissionLoop {
    id: u64,
    shared: Arc<Shared>,
    driver: Arc<dyn InputDriver>,
    base_interval: Duration,
    start_delay: Duration,
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl EmissionLoop {
    fn run(self) {
        let id = self.id;

        // Countdown so the user can focus the target window.
        if !self.start_delay.is_zero() {
            let st = lock(&self.shared.state);
            let _ = self
                .shared
                .wait_timeout_while(st, self.start_delay, |s| !s.job_stopped(id));
        }

        loop {
            let ch = {
                let st = lock(&self.shared.state);
                let st = self.shared.wait_while(st, |s| {
                    s.job
                        .as_ref()
                        .is_some_and(|j| j.id == id && j.paused && !j.stopped)
                });
                match &st.job {
                    Some(j) if j.id == id && !j.stopped && j.cursor < j.text.len() => {
                        j.text[j.cursor]
                    }
                    _ => break,
                }
            };

            if let Err(e) = self.driver.type_character(ch) {
                log::warn!("failed to type character {ch:?}: {e}");
            }

            let st = {
                let mut st = lock(&self.shared.state);
                let speed = st.speed;
                let Some(job) = st.job.as_mut().filter(|j| j.id == id) else {
                    break;
                };
                job.cursor += 1;
                if job.cursor % PROGRESS_LOG_EVERY == 0 {
                    log::info!(
                        "typing progress {:.1}% ({}/{} chars) at {}",
                        job.percent(),
                        job.cursor,
                        job.text.len(),
                        speed
                    );
                }
                if job.cursor >= job.text.len() {
                    break;
                }
                st
            };

            let interval = self.base_interval.div_f64(st.speed.value());
            let _ = self
                .shared
                .wait_timeout_while(st, interval, |s| !s.job_stopped(id));
        }

        self.finish();
    }

    fn finish(&self) {
        let outcome = {
            let mut st = lock(&self.shared.state);
            if !st.holds_job(self.id) {
                return;
            }
            let Some(job) = st.job.take() else {
                return;
            };
            let total = job.text.len();
            let outcome = if job.cursor >= total && !job.stopped {
                log::info!("typing completed ({total} chars)");
                EmissionOutcome::Completed { total }
            } else {
                log::info!("typing stopped at {}/{total}", job.cursor);
                EmissionOutcome::Stopped {
                    cursor: job.cursor,
                    total,
                }
            };
            st.last_outcome = Some(outcome);
            outcome
        };
        self.shared.wake.notify_all();

        if let (EmissionOutcome::Completed { total }, Some(n)) = (outcome, &self.notifier) {
            n.notify("Clipwright", &format!("Typing finished ({total} characters)."));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    fn timing(interval_ms: u64) -> TimingSettings {
        TimingSettings {
            base_char_interval_ms: interval_ms,
            ..TimingSettings::immediate()
        }
    }

    fn wait_until(deadline: Duration, mut f: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if f() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        f()
    }

    #[test]
    fn types_every_character_then_releases_the_slot() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &timing(1));

        emitter.start("héllo").unwrap();
        assert!(wait_until(Duration::from_secs(2), || !emitter.is_active()));
        assert_eq!(driver.typed(), "héllo");
        assert_eq!(
            emitter.status().last_outcome,
            Some(EmissionOutcome::Completed { total: 5 })
        );
        assert_eq!(emitter.progress(), None);
    }

    #[test]
    fn second_start_is_rejected_while_active() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &timing(5));
        let first = "a".repeat(50);

        emitter.start(&first).unwrap();
        assert_eq!(emitter.start("other"), Err(EmitterError::AlreadyTyping));

        assert!(wait_until(Duration::from_secs(3), || !emitter.is_active()));
        assert_eq!(driver.typed(), first);
    }

    #[test]
    fn pause_freezes_cursor_until_resume() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &TimingSettings {
            typing_start_delay_ms: 0,
            ..TimingSettings::default()
        });

        emitter.start(&"x".repeat(100)).unwrap();
        assert!(wait_until(Duration::from_secs(3), || emitter.status().cursor >= 40));
        emitter.pause().unwrap();

        // One in-flight character may still land right after the pause.
        std::thread::sleep(Duration::from_millis(50));
        let frozen = emitter.status().cursor;
        assert!(frozen >= 40);
        std::thread::sleep(Duration::from_secs(1));
        assert_eq!(emitter.status().cursor, frozen);
        assert!(emitter.status().paused);

        emitter.resume().unwrap();
        assert!(wait_until(Duration::from_secs(1), || emitter.status().cursor > frozen));
        emitter.stop().unwrap();
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &timing(1));
        emitter.start(&"m".repeat(200)).unwrap();

        let mut last = 0;
        while emitter.is_active() {
            let now = emitter.status().cursor;
            if emitter.is_active() {
                assert!(now >= last, "cursor went from {last} to {now}");
                last = now;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn stop_interrupts_and_emits_nothing_more() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &timing(20));

        emitter.start(&"z".repeat(500)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || emitter.status().cursor >= 3));

        let status = emitter.stop().unwrap();
        let StopStatus::Confirmed { cursor, total } = status else {
            panic!("expected confirmed stop, got {status:?}");
        };
        assert_eq!(total, 500);
        assert!(cursor < 500);

        let typed = driver.typed().chars().count();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(driver.typed().chars().count(), typed);
        assert_eq!(typed, cursor);
        assert!(!emitter.is_active());
        assert_eq!(emitter.stop(), Err(EmitterError::NotTyping));
    }

    #[test]
    fn stop_during_countdown_types_nothing() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &TimingSettings {
            typing_start_delay_ms: 5_000,
            ..TimingSettings::immediate()
        });

        emitter.start("never").unwrap();
        let status = emitter.stop().unwrap();
        assert_eq!(status, StopStatus::Confirmed { cursor: 0, total: 5 });
        assert_eq!(driver.typed(), "");
    }

    #[test]
    fn stop_unblocks_a_paused_job() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &timing(5));
        emitter.start(&"p".repeat(100)).unwrap();
        emitter.pause().unwrap();

        assert!(matches!(emitter.stop(), Ok(StopStatus::Confirmed { .. })));
        assert!(!emitter.is_active());
    }

    #[test]
    fn restart_after_stop_begins_at_zero() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver.clone(), &timing(10));
        emitter.start(&"a".repeat(100)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || emitter.status().cursor >= 5));
        emitter.stop().unwrap();

        emitter.start(&"b".repeat(100)).unwrap();
        assert!(emitter.status().cursor <= 1);
        emitter.stop().unwrap();
    }

    #[test]
    fn speed_clamps_in_both_directions() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver, &timing(1));

        for _ in 0..6 {
            emitter.increase_speed();
        }
        assert_eq!(emitter.speed().value(), 64.0);
        let (old, new) = emitter.increase_speed();
        assert_eq!((old.value(), new.value()), (64.0, 64.0));

        emitter.reset_speed();
        for _ in 0..3 {
            emitter.decrease_speed();
        }
        assert_eq!(emitter.speed().value(), 0.125);
        emitter.decrease_speed();
        assert_eq!(emitter.speed().value(), 0.125);
    }

    #[test]
    fn failed_keystrokes_are_skipped_and_the_job_completes() {
        let driver = Arc::new(FakeDriver::default());
        driver.fail_typing.store(true, Ordering::SeqCst);
        let emitter = TypingEmitter::new(driver.clone(), &timing(1));

        emitter.start("abc").unwrap();
        assert!(wait_until(Duration::from_secs(2), || !emitter.is_active()));
        assert_eq!(
            emitter.status().last_outcome,
            Some(EmissionOutcome::Completed { total: 3 })
        );
        assert_eq!(driver.typed(), "");

        driver.fail_typing.store(false, Ordering::SeqCst);
        emitter.start("ok").unwrap();
        assert!(wait_until(Duration::from_secs(2), || !emitter.is_active()));
        assert_eq!(driver.typed(), "ok");
    }

    #[test]
    fn speed_change_takes_effect_during_a_run() {
        let driver = Arc::new(FakeDriver::default());
        // 40 chars at 50ms each would take two seconds at 1.0x.
        let emitter = TypingEmitter::new(driver.clone(), &timing(50));
        let started = Instant::now();
        emitter.start(&"s".repeat(40)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || emitter.status().cursor >= 2));

        for _ in 0..4 {
            emitter.increase_speed();
        }
        assert!(wait_until(Duration::from_secs(3), || !emitter.is_active()));
        assert_eq!(driver.typed().len(), 40);
        assert!(
            started.elapsed() < Duration::from_millis(1200),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn controls_without_a_job_report_not_typing() {
        let driver = Arc::new(FakeDriver::default());
        let emitter = TypingEmitter::new(driver, &timing(1));
        assert_eq!(emitter.pause(), Err(EmitterError::NotTyping));
        assert_eq!(emitter.toggle_pause(), Err(EmitterError::NotTyping));
        assert_eq!(emitter.start(""), Err(EmitterError::EmptyText));
    }
}
