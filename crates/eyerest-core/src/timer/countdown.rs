//! Countdown state machine.
//!
//! Pure state: no scheduling, no storage. [`super::BreakTimer`] wraps it with
//! a ticker and persistence.
//!
//! ## State Transitions
//!
//! ```text
//! Paused --start--> Running --tick(0 left)--> Expired
//!   ^                  |                         |
//!   +------pause-------+                         |
//!   +--------------------reset-------------------+
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    /// Not counting. Also the initial state.
    Paused,
    Running,
    /// Reached zero; stays here until started or reset.
    Expired,
}

/// Read-only view of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub phase: TimerPhase,
    pub is_running: bool,
    pub time_left_seconds: u32,
    pub total_seconds: u32,
    pub progress_percent: f64,
}

/// Durable shadow of a countdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub time_left: u32,
    pub total_time: u32,
    pub is_running: bool,
    /// Display only; recomputed on restore.
    #[serde(default)]
    pub progress: f64,
    /// Epoch milliseconds of the write.
    pub last_saved: i64,
}

/// Result of restoring a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub countdown: Countdown,
    /// Whole seconds subtracted for time spent while the process was gone.
    pub elapsed_secs: u32,
    /// Epoch milliseconds at which the restored time left is exact. Trails
    /// `now_ms` by the sub-second part of the downtime, which has not been
    /// counted yet.
    pub synced_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    phase: TimerPhase,
    time_left_secs: u32,
    total_secs: u32,
    /// Duration used by `reset(None)`.
    default_secs: u32,
}

impl Countdown {
    /// Create a paused countdown of `minutes` (at least one).
    pub fn new(minutes: u32) -> Self {
        let secs = minutes.max(1).saturating_mul(60);
        Self {
            phase: TimerPhase::Paused,
            time_left_secs: secs,
            total_secs: secs,
            default_secs: secs,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    /// 0.0 .. 100.0, derived from time left and total.
    pub fn progress_percent(&self) -> f64 {
        progress(self.time_left_secs, self.total_secs)
    }

    pub fn state(&self) -> TimerState {
        TimerState {
            phase: self.phase,
            is_running: self.is_running(),
            time_left_seconds: self.time_left_secs,
            total_seconds: self.total_secs,
            progress_percent: self.progress_percent(),
        }
    }

    pub fn snapshot(&self, now_ms: i64) -> TimerSnapshot {
        TimerSnapshot {
            time_left: self.time_left_secs,
            total_time: self.total_secs,
            is_running: self.is_running(),
            progress: self.progress_percent(),
            last_saved: now_ms,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Returns `true` if the countdown was not already running.
    pub fn start(&mut self) -> bool {
        match self.phase {
            TimerPhase::Running => false,
            TimerPhase::Paused => {
                self.phase = TimerPhase::Running;
                true
            }
            TimerPhase::Expired => {
                // Re-arm a finished countdown for another full interval.
                self.time_left_secs = self.total_secs;
                self.phase = TimerPhase::Running;
                true
            }
        }
    }

    /// Returns `true` if the countdown was running.
    pub fn pause(&mut self) -> bool {
        if self.phase != TimerPhase::Running {
            return false;
        }
        self.phase = TimerPhase::Paused;
        true
    }

    /// Returns the phase after toggling.
    pub fn toggle(&mut self) -> TimerPhase {
        if self.is_running() {
            self.pause();
        } else {
            self.start();
        }
        self.phase
    }

    /// One elapsed second. Returns `true` exactly when this tick expired the
    /// countdown.
    pub fn tick(&mut self) -> bool {
        if self.phase != TimerPhase::Running {
            return false;
        }
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if self.time_left_secs == 0 {
            self.phase = TimerPhase::Expired;
            return true;
        }
        false
    }

    /// Back to a full, paused countdown. `None` or `Some(0)` uses the
    /// construction default.
    pub fn reset(&mut self, minutes: Option<u32>) {
        let secs = match minutes {
            Some(m) if m > 0 => m.saturating_mul(60),
            _ => self.default_secs,
        };
        self.phase = TimerPhase::Paused;
        self.time_left_secs = secs;
        self.total_secs = secs;
    }

    /// Rebuild from a snapshot written at `snapshot.last_saved`.
    ///
    /// A running snapshot has the wall-clock time since it was written
    /// subtracted, as if it had kept ticking. Reaching zero this way leaves
    /// the countdown expired but does not count as a live expiry.
    pub fn restore(snapshot: &TimerSnapshot, default_minutes: u32, now_ms: i64) -> Restored {
        let mut countdown = Self::new(default_minutes);
        if snapshot.total_time == 0 {
            return Restored {
                countdown,
                elapsed_secs: 0,
                synced_ms: now_ms,
            };
        }

        countdown.total_secs = snapshot.total_time;
        countdown.time_left_secs = snapshot.time_left.min(snapshot.total_time);

        let mut elapsed_secs = 0;
        let mut synced_ms = now_ms;
        if snapshot.is_running {
            // Negative deltas (clock moved backwards) count as no time passed.
            let delta_ms = now_ms.saturating_sub(snapshot.last_saved).max(0);
            synced_ms = now_ms - delta_ms % 1000;
            elapsed_secs = u32::try_from(delta_ms / 1000).unwrap_or(u32::MAX);
            countdown.time_left_secs = countdown.time_left_secs.saturating_sub(elapsed_secs);
            countdown.phase = if countdown.time_left_secs > 0 {
                TimerPhase::Running
            } else {
                TimerPhase::Expired
            };
        } else if countdown.time_left_secs == 0 {
            countdown.phase = TimerPhase::Expired;
        }

        Restored {
            countdown,
            elapsed_secs,
            synced_ms,
        }
    }
}

fn progress(time_left: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let done = f64::from(total.saturating_sub(time_left));
    (done / f64::from(total) * 100.0).min(100.0)
}

/// A duration split for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedTime {
    pub minutes: u64,
    /// Always two digits.
    pub seconds: String,
    /// `m:ss`
    pub display: String,
}

/// Split `seconds` into minutes and zero-padded seconds.
///
/// NaN, infinite, negative and zero input all yield `0:00`.
pub fn format_time(seconds: f64) -> FormattedTime {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let minutes = whole / 60;
    let secs = format!("{:02}", whole % 60);
    FormattedTime {
        minutes,
        display: format!("{minutes}:{secs}"),
        seconds: secs,
    }
}
