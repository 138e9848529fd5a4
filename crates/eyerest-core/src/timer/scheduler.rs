//! Periodic and one-shot callback scheduling.
//!
//! Everything here is single-threaded: tasks are `!Send` closures that run on
//! the thread that owns the scheduler. Cancelling a handle guarantees the task
//! will not run again, including when a task cancels itself mid-run.
//!
//! - [`TokioScheduler`] drives tasks from a tokio `LocalSet`.
//! - [`ManualScheduler`] runs them against virtual time for tests and
//!   one-shot CLI use.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::clock::ManualClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleHandle(u64);

pub trait Scheduler {
    /// Run `task` every `period`, first after one full period.
    fn schedule_repeating(&self, period: Duration, task: Box<dyn FnMut()>) -> ScheduleHandle;

    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce()>) -> ScheduleHandle;

    /// Deregister `handle`. Unknown or already-finished handles are ignored.
    fn cancel(&self, handle: ScheduleHandle);
}

// ── Tokio ────────────────────────────────────────────────────────────

struct TokioTask {
    join: JoinHandle<()>,
    cancelled: Rc<Cell<bool>>,
}

/// Scheduler backed by `tokio::task::spawn_local`.
///
/// Must be used from inside a `tokio::task::LocalSet`.
#[derive(Default)]
pub struct TokioScheduler {
    next_id: Cell<u64>,
    tasks: Rc<RefCell<HashMap<u64, TokioTask>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&self) -> ScheduleHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        ScheduleHandle(id)
    }

    /// Number of live (not finished, not cancelled) tasks.
    pub fn active(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, mut task: Box<dyn FnMut()>) -> ScheduleHandle {
        let handle = self.next_handle();
        let cancelled = Rc::new(Cell::new(false));
        let flag = cancelled.clone();
        let join = tokio::task::spawn_local(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if flag.get() {
                    break;
                }
                task();
            }
        });
        self.tasks
            .borrow_mut()
            .insert(handle.0, TokioTask { join, cancelled });
        handle
    }

    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce()>) -> ScheduleHandle {
        let handle = self.next_handle();
        let cancelled = Rc::new(Cell::new(false));
        let flag = cancelled.clone();
        let registry: Weak<RefCell<HashMap<u64, TokioTask>>> = Rc::downgrade(&self.tasks);
        let join = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if flag.get() {
                return;
            }
            if let Some(tasks) = registry.upgrade() {
                tasks.borrow_mut().remove(&handle.0);
            }
            task();
        });
        self.tasks
            .borrow_mut()
            .insert(handle.0, TokioTask { join, cancelled });
        handle
    }

    fn cancel(&self, handle: ScheduleHandle) {
        let removed = self.tasks.borrow_mut().remove(&handle.0);
        if let Some(task) = removed {
            task.cancelled.set(true);
            task.join.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.borrow_mut().drain() {
            task.cancelled.set(true);
            task.join.abort();
        }
    }
}

// ── Manual ───────────────────────────────────────────────────────────

enum ManualTask {
    Repeating(Box<dyn FnMut()>),
    Once(Box<dyn FnOnce()>),
}

struct Entry {
    due: Duration,
    period: Option<Duration>,
    task: ManualTask,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
    running: Option<u64>,
    running_cancelled: bool,
}

/// Virtual-time scheduler. Nothing runs until [`ManualScheduler::advance`].
#[derive(Default)]
pub struct ManualScheduler {
    clock: Option<Rc<ManualClock>>,
    state: RefCell<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `clock` in step with virtual time.
    pub fn with_clock(clock: Rc<ManualClock>) -> Self {
        Self {
            clock: Some(clock),
            state: RefCell::default(),
        }
    }

    /// Number of registered tasks.
    pub fn pending(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Move virtual time forward by `by`, firing due tasks in deadline order.
    pub fn advance(&self, by: Duration) {
        let target = self.state.borrow().now + by;
        loop {
            let next = {
                let state = self.state.borrow();
                state
                    .entries
                    .iter()
                    .filter(|(_, e)| e.due <= target)
                    .min_by_key(|(id, e)| (e.due, **id))
                    .map(|(id, _)| *id)
            };
            let Some(id) = next else { break };

            let entry = {
                let mut state = self.state.borrow_mut();
                let Some(entry) = state.entries.remove(&id) else { break };
                let step = entry.due.saturating_sub(state.now);
                state.now = entry.due;
                state.running = Some(id);
                state.running_cancelled = false;
                drop(state);
                self.move_clock(step);
                entry
            };

            let Entry { due, period, task } = entry;
            match task {
                ManualTask::Once(f) => f(),
                ManualTask::Repeating(mut f) => {
                    f();
                    let mut state = self.state.borrow_mut();
                    if !state.running_cancelled {
                        let period = period.unwrap_or(Duration::from_secs(1));
                        state.entries.insert(
                            id,
                            Entry {
                                due: due + period,
                                period: Some(period),
                                task: ManualTask::Repeating(f),
                            },
                        );
                    }
                }
            }
            self.state.borrow_mut().running = None;
        }

        let step = {
            let mut state = self.state.borrow_mut();
            let step = target.saturating_sub(state.now);
            state.now = target;
            step
        };
        self.move_clock(step);
    }

    fn move_clock(&self, step: Duration) {
        if let Some(clock) = &self.clock {
            clock.advance(step);
        }
    }

    fn insert(&self, delay: Duration, period: Option<Duration>, task: ManualTask) -> ScheduleHandle {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        let due = state.now + delay;
        state.entries.insert(id, Entry { due, period, task });
        ScheduleHandle(id)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, task: Box<dyn FnMut()>) -> ScheduleHandle {
        // A zero period would spin forever inside `advance`.
        let period = period.max(Duration::from_millis(1));
        self.insert(period, Some(period), ManualTask::Repeating(task))
    }

    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce()>) -> ScheduleHandle {
        self.insert(delay, None, ManualTask::Once(task))
    }

    fn cancel(&self, handle: ScheduleHandle) {
        let mut state = self.state.borrow_mut();
        if state.running == Some(handle.0) {
            state.running_cancelled = true;
        }
        state.entries.remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Clock;
    use chrono::{TimeZone, Utc};

    fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move || c.set(c.get() + 1))
    }

    #[test]
    fn repeating_fires_once_per_period() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counter();
        scheduler.schedule_repeating(Duration::from_secs(1), Box::new(task));

        scheduler.advance(Duration::from_millis(999));
        assert_eq!(count.get(), 0);
        scheduler.advance(Duration::from_millis(1));
        assert_eq!(count.get(), 1);
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(count.get(), 6);
    }

    #[test]
    fn cancelled_task_never_fires_again() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counter();
        let handle = scheduler.schedule_repeating(Duration::from_secs(1), Box::new(task));
        scheduler.advance(Duration::from_secs(2));
        scheduler.cancel(handle);
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(count.get(), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn task_can_cancel_itself() {
        let scheduler = Rc::new(ManualScheduler::new());
        let count = Rc::new(Cell::new(0));
        let handle_slot: Rc<Cell<Option<ScheduleHandle>>> = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&scheduler);
        let (c, slot) = (count.clone(), handle_slot.clone());
        let handle = scheduler.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                c.set(c.get() + 1);
                if c.get() == 3 {
                    if let (Some(s), Some(h)) = (weak.upgrade(), slot.get()) {
                        s.cancel(h);
                    }
                }
            }),
        );
        handle_slot.set(Some(handle));

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn once_fires_after_delay_and_is_removed() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        scheduler.schedule_once(Duration::from_secs(1), Box::new(move || f.set(true)));
        scheduler.advance(Duration::from_millis(500));
        assert!(!fired.get());
        scheduler.advance(Duration::from_millis(500));
        assert!(fired.get());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tasks_scheduled_during_advance_run_in_same_window() {
        let scheduler = Rc::new(ManualScheduler::new());
        let fired = Rc::new(Cell::new(false));
        let weak = Rc::downgrade(&scheduler);
        let f = fired.clone();
        scheduler.schedule_once(
            Duration::from_secs(1),
            Box::new(move || {
                if let Some(s) = weak.upgrade() {
                    let f = f.clone();
                    s.schedule_once(Duration::from_secs(1), Box::new(move || f.set(true)));
                }
            }),
        );
        scheduler.advance(Duration::from_secs(2));
        assert!(fired.get());
    }

    #[test]
    fn clock_tracks_virtual_time() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let clock = Rc::new(ManualClock::new(start));
        let scheduler = ManualScheduler::with_clock(clock.clone());
        scheduler.advance(Duration::from_secs(90));
        assert_eq!(
            (clock.now() - start).num_seconds(),
            90,
            "clock should move with the scheduler"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_repeating_and_cancel() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let (count, task) = counter();
                let handle = scheduler.schedule_repeating(Duration::from_secs(1), Box::new(task));

                tokio::time::sleep(Duration::from_millis(3500)).await;
                assert_eq!(count.get(), 3);

                scheduler.cancel(handle);
                assert_eq!(scheduler.active(), 0);
                tokio::time::sleep(Duration::from_secs(5)).await;
                assert_eq!(count.get(), 3);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_once_cleans_up() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let fired = Rc::new(Cell::new(false));
                let f = fired.clone();
                scheduler.schedule_once(Duration::from_secs(1), Box::new(move || f.set(true)));
                tokio::time::sleep(Duration::from_millis(1500)).await;
                assert!(fired.get());
                assert_eq!(scheduler.active(), 0);
            })
            .await;
    }
}
