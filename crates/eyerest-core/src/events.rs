use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::timer::{TimerKind, TimerPhase};

/// Every state change in the system produces an Event.
/// The CLI prints them; orchestrator subscribers receive them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        timer: TimerKind,
        time_left_secs: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        timer: TimerKind,
        time_left_secs: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        timer: TimerKind,
        total_secs: u32,
        at: DateTime<Utc>,
    },
    /// A live tick brought the countdown to zero.
    TimerCompleted {
        timer: TimerKind,
        total_secs: u32,
        at: DateTime<Utc>,
    },
    /// A completion was credited to the streak tracker.
    ActivityRecorded {
        timer: TimerKind,
        current_streak: u32,
        longest_streak: u32,
        total_completed_sessions: u32,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        timer: TimerKind,
        phase: TimerPhase,
        time_left_secs: u32,
        total_secs: u32,
        progress_pct: f64,
        display: String,
        next_break: Option<String>,
        at: DateTime<Utc>,
    },
    SettingsChanged {
        previous: Settings,
        current: Settings,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The timer this event concerns, if any.
    pub fn timer(&self) -> Option<TimerKind> {
        match self {
            Event::TimerStarted { timer, .. }
            | Event::TimerPaused { timer, .. }
            | Event::TimerReset { timer, .. }
            | Event::TimerCompleted { timer, .. }
            | Event::ActivityRecorded { timer, .. }
            | Event::StateSnapshot { timer, .. } => Some(*timer),
            Event::SettingsChanged { .. } => None,
        }
    }
}
