//! Break timer: a [`Countdown`] driven by a [`Scheduler`] and mirrored to a
//! key/value store.
//!
//! While running, the timer owns exactly one repeating one-second task.
//! `pause`, `reset` and expiry cancel that task before returning, and every
//! task also carries the generation it was armed in, so a callback that was
//! already in flight when the timer stopped finds a newer generation and
//! does nothing.
//!
//! ## Usage
//!
//! ```ignore
//! let timer = BreakTimer::builder(TimerKind::Eye, 20)
//!     .storage(store, TimerKind::Eye.storage_key())
//!     .on_complete(|| println!("look away"))
//!     .build(scheduler, clock)?;
//! timer.start();
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, trace};

use super::clock::Clock;
use super::countdown::{format_time, Countdown, TimerState};
use super::scheduler::{ScheduleHandle, Scheduler};
use super::TimerKind;
use crate::error::ValidationError;
use crate::events::Event;
use crate::storage::{load_json, save_json, KeyValueStore};

const TICK_PERIOD: Duration = Duration::from_secs(1);

type Callback = Box<dyn FnMut()>;

struct TimerCore {
    kind: TimerKind,
    countdown: Countdown,
    storage: Option<(Rc<dyn KeyValueStore>, String)>,
    scheduler: Rc<dyn Scheduler>,
    clock: Rc<dyn Clock>,
    on_complete: Option<Callback>,
    ticker: Option<ScheduleHandle>,
    generation: u64,
    /// Epoch ms at which `countdown`'s time left was last exact: the latest
    /// transition or tick, or the restore anchor.
    synced_ms: i64,
}

impl TimerCore {
    /// Record a transition or tick at the current time and write it.
    fn persist(&mut self) {
        self.synced_ms = self.clock.now_ms();
        self.write();
    }

    /// Write the snapshot as of `synced_ms`, so time since then is still
    /// counted on the next restore.
    fn write(&self) {
        if let Some((store, key)) = &self.storage {
            save_json(store.as_ref(), key, &self.countdown.snapshot(self.synced_ms));
        }
    }

    fn disarm(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.ticker.take() {
            self.scheduler.cancel(handle);
        }
    }
}

impl Drop for TimerCore {
    fn drop(&mut self) {
        self.disarm();
    }
}

pub struct BreakTimerBuilder {
    kind: TimerKind,
    default_minutes: u32,
    storage: Option<(Rc<dyn KeyValueStore>, String)>,
    on_complete: Option<Callback>,
}

impl BreakTimerBuilder {
    /// Persist to `store` under `key`, restoring any snapshot already there.
    pub fn storage(mut self, store: Rc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        self.storage = Some((store, key.into()));
        self
    }

    /// Called once per live expiry, after the expired state is persisted.
    pub fn on_complete(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn build(
        self,
        scheduler: Rc<dyn Scheduler>,
        clock: Rc<dyn Clock>,
    ) -> Result<BreakTimer, ValidationError> {
        if self.default_minutes == 0 {
            return Err(ValidationError::InvalidInterval {
                timer: self.kind.to_string(),
                minutes: 0,
            });
        }

        let mut countdown = Countdown::new(self.default_minutes);
        let mut synced_ms = clock.now_ms();
        if let Some((store, key)) = &self.storage {
            if let Some(snapshot) = load_json(store.as_ref(), key) {
                let restored = Countdown::restore(&snapshot, self.default_minutes, clock.now_ms());
                info!(
                    timer = %self.kind,
                    time_left = restored.countdown.time_left_secs(),
                    elapsed = restored.elapsed_secs,
                    running = restored.countdown.is_running(),
                    "restored timer snapshot"
                );
                countdown = restored.countdown;
                synced_ms = restored.synced_ms;
            }
        }

        let timer = BreakTimer {
            inner: Rc::new(RefCell::new(TimerCore {
                kind: self.kind,
                countdown,
                storage: self.storage,
                scheduler,
                clock,
                on_complete: self.on_complete,
                ticker: None,
                generation: 0,
                synced_ms,
            })),
        };
        if timer.is_running() {
            timer.arm();
        }
        Ok(timer)
    }
}

/// Handle to a break timer. Clones share the same timer.
#[derive(Clone)]
pub struct BreakTimer {
    inner: Rc<RefCell<TimerCore>>,
}

impl BreakTimer {
    pub fn builder(kind: TimerKind, default_minutes: u32) -> BreakTimerBuilder {
        BreakTimerBuilder {
            kind,
            default_minutes,
            storage: None,
            on_complete: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn kind(&self) -> TimerKind {
        self.inner.borrow().kind
    }

    pub fn state(&self) -> TimerState {
        self.inner.borrow().countdown.state()
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().countdown.is_running()
    }

    /// Whether a tick task is currently registered.
    pub fn is_armed(&self) -> bool {
        self.inner.borrow().ticker.is_some()
    }

    /// Local wall-clock time of the next break (`h:mm AM`), or `None` when
    /// not running. Display only.
    pub fn next_break_time(&self) -> Option<String> {
        next_break_label(&self.inner.borrow())
    }

    pub fn snapshot_event(&self) -> Event {
        let core = self.inner.borrow();
        let state = core.countdown.state();
        Event::StateSnapshot {
            timer: core.kind,
            phase: state.phase,
            time_left_secs: state.time_left_seconds,
            total_secs: state.total_seconds,
            progress_pct: state.progress_percent,
            display: format_time(f64::from(state.time_left_seconds)).display,
            next_break: next_break_label(&core),
            at: core.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start counting down. A timer left running by [`Self::shutdown`] has no
    /// ticker; starting it re-arms the ticker without touching the countdown.
    pub fn start(&self) -> Option<Event> {
        let event = {
            let mut core = self.inner.borrow_mut();
            if core.countdown.is_running() && core.ticker.is_none() {
                info!(timer = %core.kind, time_left = core.countdown.time_left_secs(), "timer resumed");
            } else if core.countdown.start() {
                core.persist();
                info!(timer = %core.kind, time_left = core.countdown.time_left_secs(), "timer started");
            } else {
                return None;
            }
            Event::TimerStarted {
                timer: core.kind,
                time_left_secs: core.countdown.time_left_secs(),
                at: core.clock.now(),
            }
        };
        self.arm();
        Some(event)
    }

    pub fn pause(&self) -> Option<Event> {
        let mut core = self.inner.borrow_mut();
        if !core.countdown.pause() {
            return None;
        }
        core.disarm();
        core.persist();
        info!(timer = %core.kind, time_left = core.countdown.time_left_secs(), "timer paused");
        Some(Event::TimerPaused {
            timer: core.kind,
            time_left_secs: core.countdown.time_left_secs(),
            at: core.clock.now(),
        })
    }

    pub fn toggle(&self) -> Option<Event> {
        if self.is_running() {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Stop and refill. `None` (or zero) uses the interval the timer was built
    /// with.
    pub fn reset(&self, minutes: Option<u32>) -> Event {
        let mut core = self.inner.borrow_mut();
        core.disarm();
        core.countdown.reset(minutes);
        core.persist();
        info!(timer = %core.kind, total = core.countdown.total_secs(), "timer reset");
        Event::TimerReset {
            timer: core.kind,
            total_secs: core.countdown.total_secs(),
            at: core.clock.now(),
        }
    }

    /// Deregister the ticker and write the current snapshot, leaving the
    /// running flag as is so the next process resumes from it. The snapshot
    /// keeps the time of the last tick (or restore), so reloading and shutting
    /// down again and again loses no time. [`Self::start`] resumes ticking.
    pub fn shutdown(&self) {
        let mut core = self.inner.borrow_mut();
        core.disarm();
        core.write();
        debug!(timer = %core.kind, "timer shut down");
    }

    /// Advance by one second. Normally called by the scheduler.
    pub(crate) fn tick(&self) -> Option<Event> {
        Self::tick_core(&self.inner, None)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm(&self) {
        let mut core = self.inner.borrow_mut();
        core.disarm();
        let generation = core.generation;
        let weak = Rc::downgrade(&self.inner);
        let handle = core.scheduler.schedule_repeating(
            TICK_PERIOD,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Self::tick_core(&inner, Some(generation));
                }
            }),
        );
        core.ticker = Some(handle);
    }

    fn tick_core(inner: &Rc<RefCell<TimerCore>>, generation: Option<u64>) -> Option<Event> {
        let (event, mut callback) = {
            let mut core = inner.borrow_mut();
            if generation.is_some_and(|g| g != core.generation) {
                return None;
            }
            if !core.countdown.tick() {
                if core.countdown.is_running() {
                    core.persist();
                    trace!(timer = %core.kind, time_left = core.countdown.time_left_secs(), "tick");
                }
                return None;
            }
            core.disarm();
            core.persist();
            info!(timer = %core.kind, "timer completed");
            let event = Event::TimerCompleted {
                timer: core.kind,
                total_secs: core.countdown.total_secs(),
                at: core.clock.now(),
            };
            (event, core.on_complete.take())
        };

        // Run outside the borrow; the callback may call back into this timer.
        if let Some(cb) = callback.as_mut() {
            cb();
        }
        if let Some(cb) = callback {
            let mut core = inner.borrow_mut();
            if core.on_complete.is_none() {
                core.on_complete = Some(cb);
            }
        }
        Some(event)
    }
}

fn next_break_label(core: &TimerCore) -> Option<String> {
    if !core.countdown.is_running() {
        return None;
    }
    let at = core.clock.now() + chrono::Duration::seconds(i64::from(core.countdown.time_left_secs()));
    Some(at.with_timezone(&Local).format("%-I:%M %p").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::clock::ManualClock;
    use crate::timer::scheduler::ManualScheduler;
    use crate::timer::{TimerPhase, TimerSnapshot};
    use chrono::{TimeZone, Utc};
    use std::cell::Cell;

    struct Rig {
        clock: Rc<ManualClock>,
        scheduler: Rc<ManualScheduler>,
        store: Rc<MemoryStore>,
    }

    impl Rig {
        fn new() -> Self {
            let clock = Rc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
            ));
            let scheduler = Rc::new(ManualScheduler::with_clock(clock.clone()));
            Self {
                clock,
                scheduler,
                store: Rc::new(MemoryStore::new()),
            }
        }

        fn timer(&self, minutes: u32) -> BreakTimer {
            BreakTimer::builder(TimerKind::Eye, minutes)
                .storage(self.store.clone(), "eye")
                .build(self.scheduler.clone(), self.clock.clone())
                .unwrap()
        }

        fn saved(&self) -> TimerSnapshot {
            load_json(self.store.as_ref(), "eye").unwrap()
        }
    }

    #[test]
    fn zero_minutes_is_rejected() {
        let rig = Rig::new();
        let result = BreakTimer::builder(TimerKind::Posture, 0)
            .build(rig.scheduler.clone(), rig.clock.clone());
        assert!(matches!(
            result,
            Err(ValidationError::InvalidInterval { minutes: 0, .. })
        ));
    }

    #[test]
    fn ticks_once_per_second_while_running() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        assert!(timer.start().is_some());
        rig.scheduler.advance(Duration::from_secs(10));
        assert_eq!(timer.state().time_left_seconds, 50);
        assert_eq!(rig.saved().time_left, 50);
    }

    #[test]
    fn start_twice_registers_one_ticker() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        timer.start();
        assert!(timer.start().is_none());
        assert_eq!(rig.scheduler.pending(), 1);
        rig.scheduler.advance(Duration::from_secs(3));
        assert_eq!(timer.state().time_left_seconds, 57);
    }

    #[test]
    fn pause_stops_ticks_and_persists() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        timer.start();
        rig.scheduler.advance(Duration::from_secs(5));
        assert!(timer.pause().is_some());
        assert!(timer.pause().is_none());
        assert!(!timer.is_armed());
        rig.scheduler.advance(Duration::from_secs(30));
        assert_eq!(timer.state().time_left_seconds, 55);
        assert!(!rig.saved().is_running);
    }

    #[test]
    fn no_tick_lands_after_reset() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        timer.start();
        rig.scheduler.advance(Duration::from_millis(2500));
        timer.reset(None);
        assert_eq!(rig.scheduler.pending(), 0);
        rig.scheduler.advance(Duration::from_secs(120));
        let state = timer.state();
        assert_eq!(state.time_left_seconds, 60);
        assert_eq!(state.phase, TimerPhase::Paused);
    }

    #[test]
    fn stale_generation_tick_is_ignored() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        timer.start();
        let stale = timer.inner.borrow().generation;
        timer.pause();
        timer.start();
        assert!(BreakTimer::tick_core(&timer.inner, Some(stale)).is_none());
        assert_eq!(timer.state().time_left_seconds, 60);
    }

    #[test]
    fn completion_fires_exactly_once() {
        let rig = Rig::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let timer = BreakTimer::builder(TimerKind::Eye, 1)
            .storage(rig.store.clone(), "eye")
            .on_complete(move || f.set(f.get() + 1))
            .build(rig.scheduler.clone(), rig.clock.clone())
            .unwrap();
        timer.start();
        rig.scheduler.advance(Duration::from_secs(300));

        assert_eq!(fired.get(), 1);
        let state = timer.state();
        assert!(!state.is_running);
        assert_eq!(state.time_left_seconds, 0);
        assert_eq!(state.progress_percent, 100.0);
        assert_eq!(rig.scheduler.pending(), 0);
        assert_eq!(rig.saved().progress, 100.0);
    }

    #[test]
    fn callback_survives_for_next_interval() {
        let rig = Rig::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let timer = BreakTimer::builder(TimerKind::Eye, 1)
            .on_complete(move || f.set(f.get() + 1))
            .build(rig.scheduler.clone(), rig.clock.clone())
            .unwrap();
        timer.start();
        rig.scheduler.advance(Duration::from_secs(60));
        timer.start();
        rig.scheduler.advance(Duration::from_secs(60));
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn callback_may_restart_its_own_timer() {
        let rig = Rig::new();
        let slot: Rc<RefCell<Option<BreakTimer>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let timer = BreakTimer::builder(TimerKind::Eye, 1)
            .on_complete(move || {
                if let Some(t) = s.borrow().as_ref() {
                    t.reset(None);
                    t.start();
                }
            })
            .build(rig.scheduler.clone(), rig.clock.clone())
            .unwrap();
        *slot.borrow_mut() = Some(timer.clone());

        timer.start();
        rig.scheduler.advance(Duration::from_secs(61));
        assert!(timer.is_running());
        assert_eq!(timer.state().time_left_seconds, 59);
        slot.borrow_mut().take();
    }

    #[test]
    fn memory_only_timer_writes_nothing() {
        let rig = Rig::new();
        let timer = BreakTimer::builder(TimerKind::Eye, 1)
            .build(rig.scheduler.clone(), rig.clock.clone())
            .unwrap();
        timer.start();
        rig.scheduler.advance(Duration::from_secs(5));
        assert!(rig.store.is_empty());
    }

    #[test]
    fn reload_compensates_for_downtime() {
        let rig = Rig::new();
        {
            let timer = rig.timer(20);
            timer.start();
            rig.scheduler.advance(Duration::from_secs(10));
            timer.shutdown();
        }
        rig.clock.advance(Duration::from_secs(30));

        let timer = rig.timer(20);
        assert!(timer.is_running());
        assert!(timer.is_armed());
        assert_eq!(timer.state().time_left_seconds, 1200 - 40);
    }

    #[test]
    fn frequent_reloads_keep_counting_down() {
        let rig = Rig::new();
        rig.timer(20).start();

        // Load and shut down every 600 ms for a minute of wall time.
        for _ in 0..100 {
            rig.clock.advance(Duration::from_millis(600));
            let timer = rig.timer(20);
            timer.shutdown();
        }

        assert_eq!(rig.timer(20).state().time_left_seconds, 1200 - 60);
    }

    #[test]
    fn shutdown_snapshot_keeps_last_tick_time() {
        let rig = Rig::new();
        let timer = rig.timer(20);
        timer.start();
        rig.scheduler.advance(Duration::from_millis(4_700));
        timer.shutdown();

        let saved = rig.saved();
        assert_eq!(saved.time_left, 1196);
        assert_eq!(rig.clock.now_ms() - saved.last_saved, 700);
    }

    #[test]
    fn start_after_shutdown_resumes_ticking() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        timer.start();
        rig.scheduler.advance(Duration::from_secs(5));
        timer.shutdown();
        assert!(timer.is_running());
        assert!(!timer.is_armed());

        assert!(timer.start().is_some());
        assert!(timer.is_armed());
        assert!(timer.start().is_none());
        rig.scheduler.advance(Duration::from_secs(5));
        assert_eq!(timer.state().time_left_seconds, 50);
    }

    #[test]
    fn reload_after_expiry_does_not_fire_callback() {
        let rig = Rig::new();
        rig.timer(1).start();
        rig.clock.advance(Duration::from_secs(600));

        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let timer = BreakTimer::builder(TimerKind::Eye, 1)
            .storage(rig.store.clone(), "eye")
            .on_complete(move || f.set(true))
            .build(rig.scheduler.clone(), rig.clock.clone())
            .unwrap();
        rig.scheduler.advance(Duration::from_secs(5));
        assert!(!fired.get());
        assert_eq!(timer.state().phase, TimerPhase::Expired);
        assert!(!timer.is_armed());
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_defaults() {
        let rig = Rig::new();
        rig.store.put_raw("eye", "{\"timeLeft\": \"soon\"");
        let timer = rig.timer(20);
        assert_eq!(timer.state().time_left_seconds, 1200);
        assert!(!timer.is_running());
    }

    #[test]
    fn write_failures_keep_in_memory_state() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        rig.store.set_read_only(true);
        timer.start();
        rig.scheduler.advance(Duration::from_secs(3));
        assert_eq!(timer.state().time_left_seconds, 57);
        assert!(rig.store.is_empty());
    }

    #[test]
    fn next_break_time_only_when_running() {
        let rig = Rig::new();
        let timer = rig.timer(20);
        assert!(timer.next_break_time().is_none());
        timer.start();
        let label = timer.next_break_time().unwrap();
        assert!(label.ends_with("AM") || label.ends_with("PM"), "{label}");
        assert!(label.contains(':'));
    }

    #[test]
    fn direct_tick_expires() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        timer.start();
        let events: Vec<_> = (0..60).filter_map(|_| timer.tick()).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::TimerCompleted { .. }));
    }

    #[test]
    fn dropping_last_handle_cancels_ticker() {
        let rig = Rig::new();
        let timer = rig.timer(1);
        timer.start();
        assert_eq!(rig.scheduler.pending(), 1);
        drop(timer);
        assert_eq!(rig.scheduler.pending(), 0);
    }
}
