//! # EyeRest Core Library
//!
//! Break reminders for screen work: an eye-rest timer and a posture timer that
//! count down independently, alert when they expire, and feed a daily streak.
//! The `eyerest` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: a one-second countdown state machine driven by a
//!   [`Scheduler`], persisted on every transition and restored across
//!   restarts with the downtime subtracted
//! - **Streak**: per-day activity counts over a rolling week and a streak of
//!   consecutive active days
//! - **Orchestrator**: wires both timers to settings, streaks, notifications
//!   and break history, and applies the auto-restart policy
//! - **Storage**: a JSON key/value store (SQLite or in-memory), break history
//!   and the TOML application config
//!
//! ## Key Components
//!
//! - [`BreakTimer`]: one countdown with persistence and a completion callback
//! - [`StreakTracker`]: daily activity and streak bookkeeping
//! - [`Orchestrator`]: the running application
//! - [`SettingsStore`]: observable user settings
//! - [`Database`]: SQLite key/value store and break history

pub mod error;
pub mod events;
pub mod notify;
pub mod orchestrator;
pub mod settings;
pub mod storage;
pub mod streak;
pub mod timer;

pub use error::{ConfigError, CoreError, Result, StorageError, ValidationError};
pub use events::Event;
pub use notify::{ConsoleNotifier, NotificationPermission, Notifier, SoundSettings, SoundType};
pub use orchestrator::{Orchestrator, OrchestratorDeps, DEFAULT_AUTO_RESTART_DELAY};
pub use settings::{Settings, SettingsStore};
pub use storage::{BreakHistory, Config, Database, KeyValueStore, MemoryStore, Stats};
pub use streak::{DayActivity, StreakData, StreakTracker};
pub use timer::{
    format_time, BreakTimer, Clock, ManualClock, ManualScheduler, Scheduler, SystemClock,
    TimerKind, TimerPhase, TimerState, TokioScheduler,
};
