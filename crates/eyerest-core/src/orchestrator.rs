//! Wires the eye and posture timers to settings, streaks and notifications.
//!
//! On every completion the orchestrator credits the streak tracker, alerts
//! the user when that timer's notifications are on, appends a history row
//! and, with auto-start enabled, restarts the timer after a short delay.
//! Interval changes in settings reset the affected timer immediately.
//!
//! Everything runs on one thread. Completion and settings callbacks hold only
//! a `Weak` reference back to the orchestrator, so dropping the last `Rc`
//! tears the whole graph down.

use std::cell::{OnceCell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ValidationError;
use crate::events::Event;
use crate::notify::Notifier;
use crate::settings::{Settings, SettingsStore};
use crate::storage::{BreakHistory, KeyValueStore};
use crate::streak::StreakTracker;
use crate::timer::{BreakTimer, Clock, ScheduleHandle, Scheduler, TimerKind};

pub const DEFAULT_AUTO_RESTART_DELAY: Duration = Duration::from_secs(1);

pub type EventListener = Box<dyn FnMut(&Event)>;

/// Collaborators handed to [`Orchestrator::new`].
pub struct OrchestratorDeps {
    pub scheduler: Rc<dyn Scheduler>,
    pub clock: Rc<dyn Clock>,
    pub store: Rc<dyn KeyValueStore>,
    pub notifier: Rc<dyn Notifier>,
    pub settings: Rc<SettingsStore>,
    pub history: Option<Rc<dyn BreakHistory>>,
    pub auto_restart_delay: Duration,
}

pub struct Orchestrator {
    eye: BreakTimer,
    posture: BreakTimer,
    streaks: RefCell<StreakTracker>,
    settings: Rc<SettingsStore>,
    notifier: Rc<dyn Notifier>,
    history: Option<Rc<dyn BreakHistory>>,
    scheduler: Rc<dyn Scheduler>,
    clock: Rc<dyn Clock>,
    auto_restart_delay: Duration,
    pending_restarts: RefCell<HashMap<TimerKind, ScheduleHandle>>,
    listeners: RefCell<Vec<EventListener>>,
}

impl Orchestrator {
    /// Build both timers from current settings, restoring any persisted
    /// snapshots, and subscribe to settings changes.
    pub fn new(deps: OrchestratorDeps) -> Result<Rc<Self>, ValidationError> {
        let settings = deps.settings.current();
        settings.validate()?;

        let slot: Rc<OnceCell<Weak<Orchestrator>>> = Rc::new(OnceCell::new());
        let build = |kind: TimerKind| {
            let slot = slot.clone();
            BreakTimer::builder(kind, settings.interval(kind))
                .storage(deps.store.clone(), kind.storage_key())
                .on_complete(move || {
                    if let Some(this) = slot.get().and_then(Weak::upgrade) {
                        this.handle_completion(kind);
                    }
                })
                .build(deps.scheduler.clone(), deps.clock.clone())
        };
        let eye = build(TimerKind::Eye)?;
        let posture = build(TimerKind::Posture)?;

        let this = Rc::new(Self {
            eye,
            posture,
            streaks: RefCell::new(StreakTracker::load(deps.store.clone(), deps.clock.clone())),
            settings: deps.settings,
            notifier: deps.notifier,
            history: deps.history,
            scheduler: deps.scheduler,
            clock: deps.clock,
            auto_restart_delay: deps.auto_restart_delay,
            pending_restarts: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
        });
        // The cell is fresh, so this set cannot fail.
        let _ = slot.set(Rc::downgrade(&this));

        let weak = Rc::downgrade(&this);
        this.settings.subscribe(move |previous, current| {
            if let Some(this) = weak.upgrade() {
                this.handle_settings_change(previous, current);
            }
        });

        info!(
            eye_interval = settings.eye_interval,
            posture_interval = settings.posture_interval,
            auto_start = settings.auto_start,
            "orchestrator ready"
        );
        Ok(this)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn timer(&self, kind: TimerKind) -> &BreakTimer {
        match kind {
            TimerKind::Eye => &self.eye,
            TimerKind::Posture => &self.posture,
        }
    }

    pub fn streaks(&self) -> Ref<'_, StreakTracker> {
        self.streaks.borrow()
    }

    pub fn settings(&self) -> &Rc<SettingsStore> {
        &self.settings
    }

    /// Whether an auto-restart is waiting to fire for `kind`.
    pub fn restart_pending(&self, kind: TimerKind) -> bool {
        self.pending_restarts.borrow().contains_key(&kind)
    }

    /// One `StateSnapshot` event per timer.
    pub fn status(&self) -> Vec<Event> {
        TimerKind::ALL
            .iter()
            .map(|&kind| self.timer(kind).snapshot_event())
            .collect()
    }

    pub fn subscribe(&self, listener: impl FnMut(&Event) + 'static) {
        self.listeners.borrow_mut().push(Box::new(listener));
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self, kind: TimerKind) {
        self.cancel_restart(kind);
        if let Some(event) = self.timer(kind).start() {
            self.emit(&event);
        }
    }

    pub fn pause(&self, kind: TimerKind) {
        self.cancel_restart(kind);
        if let Some(event) = self.timer(kind).pause() {
            self.emit(&event);
        }
    }

    pub fn toggle(&self, kind: TimerKind) {
        self.cancel_restart(kind);
        if let Some(event) = self.timer(kind).toggle() {
            self.emit(&event);
        }
    }

    /// Reset to the configured interval.
    pub fn reset(&self, kind: TimerKind) {
        self.cancel_restart(kind);
        let minutes = self.settings.current().interval(kind);
        let event = self.timer(kind).reset(Some(minutes));
        self.emit(&event);
    }

    pub fn start_all(&self) {
        for kind in TimerKind::ALL {
            self.start(kind);
        }
    }

    /// Cancel pending restarts and stop both tickers, persisting snapshots.
    pub fn shutdown(&self) {
        for kind in TimerKind::ALL {
            self.cancel_restart(kind);
            self.timer(kind).shutdown();
        }
        info!("orchestrator shut down");
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn handle_completion(self: &Rc<Self>, kind: TimerKind) {
        let now = self.clock.now();
        let total_secs = self.timer(kind).state().total_seconds;
        self.emit(&Event::TimerCompleted {
            timer: kind,
            total_secs,
            at: now,
        });

        let activity = self.streaks.borrow_mut().record_activity(kind);
        self.emit(&activity);

        let settings = self.settings.current();
        if settings.notifications_enabled(kind) {
            self.notifier.show_for(kind, settings.sound_alerts);
        } else {
            debug!(timer = %kind, "notifications off, skipping alert");
        }

        if let Some(history) = &self.history {
            if let Err(e) = history.record_break(kind, total_secs, now) {
                warn!(timer = %kind, error = %e, "failed to record break history");
            }
        }

        if settings.auto_start {
            self.schedule_restart(kind);
        }
    }

    fn schedule_restart(self: &Rc<Self>, kind: TimerKind) {
        self.cancel_restart(kind);
        let weak = Rc::downgrade(self);
        let handle = self.scheduler.schedule_once(
            self.auto_restart_delay,
            Box::new(move || {
                if let Some(this) = weak.upgrade() {
                    this.pending_restarts.borrow_mut().remove(&kind);
                    this.restart(kind);
                }
            }),
        );
        self.pending_restarts.borrow_mut().insert(kind, handle);
        debug!(timer = %kind, delay_ms = self.auto_restart_delay.as_millis() as u64, "auto-restart scheduled");
    }

    fn restart(&self, kind: TimerKind) {
        let minutes = self.settings.current().interval(kind);
        let timer = self.timer(kind);
        let reset = timer.reset(Some(minutes));
        self.emit(&reset);
        if let Some(started) = timer.start() {
            self.emit(&started);
        }
    }

    fn cancel_restart(&self, kind: TimerKind) {
        let handle = self.pending_restarts.borrow_mut().remove(&kind);
        if let Some(handle) = handle {
            self.scheduler.cancel(handle);
        }
    }

    fn handle_settings_change(&self, previous: &Settings, current: &Settings) {
        for kind in TimerKind::ALL {
            if previous.interval(kind) != current.interval(kind) {
                info!(
                    timer = %kind,
                    from = previous.interval(kind),
                    to = current.interval(kind),
                    "interval changed, resetting timer"
                );
                self.cancel_restart(kind);
                let event = self.timer(kind).reset(Some(current.interval(kind)));
                self.emit(&event);
            }
        }
        self.emit(&Event::SettingsChanged {
            previous: previous.clone(),
            current: current.clone(),
            at: self.clock.now(),
        });
    }

    fn emit(&self, event: &Event) {
        let mut running = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in running.iter_mut() {
            listener(event);
        }
        let mut listeners = self.listeners.borrow_mut();
        running.append(&mut listeners);
        *listeners = running;
    }
}
