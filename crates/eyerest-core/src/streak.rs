//! Daily activity and streak tracking.
//!
//! Every completed break is recorded against today's [`DayActivity`] in a
//! rolling seven-day window. A day counts toward the streak once it reaches
//! four eye breaks or two posture checks; the display-only daily goal is the
//! stricter five eye breaks and three posture checks.
//!
//! Both the window and the [`StreakData`] aggregate are written to the store
//! after every change. Unreadable stored data is replaced with defaults.

use std::rc::Rc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::error::ValidationError;
use crate::events::Event;
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::timer::{Clock, TimerKind};

pub const STREAK_KEY: &str = "eyerest-streak-data";
pub const ACTIVITY_KEY: &str = "eyerest-daily-activity";

/// Days kept in the activity window, today included.
pub const WINDOW_DAYS: usize = 7;

const DAILY_EYE_GOAL: u32 = 5;
const DAILY_POSTURE_GOAL: u32 = 3;
const EYE_STREAK_THRESHOLD: u32 = 4;
const POSTURE_STREAK_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayActivity {
    pub date: NaiveDate,
    #[serde(default)]
    pub eye_breaks: u32,
    #[serde(default)]
    pub posture_checks: u32,
    #[serde(default)]
    pub completed: bool,
}

impl DayActivity {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            eye_breaks: 0,
            posture_checks: 0,
            completed: false,
        }
    }

    fn refresh_completed(&mut self) {
        self.completed =
            self.eye_breaks >= DAILY_EYE_GOAL && self.posture_checks >= DAILY_POSTURE_GOAL;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakData {
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Stored as `""` when unset.
    #[serde(with = "date_or_empty")]
    pub last_activity_date: Option<NaiveDate>,
    pub total_completed_sessions: u32,
    pub weekly_goal: u32,
    pub completed_this_week: u32,
    pub streak_goal: u32,
}

impl Default for StreakData {
    fn default() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            total_completed_sessions: 0,
            // 5 sessions a day, every day
            weekly_goal: 35,
            completed_this_week: 0,
            streak_goal: 7,
        }
    }
}

mod date_or_empty {
    use super::*;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
    }
}

pub struct StreakTracker {
    data: StreakData,
    window: Vec<DayActivity>,
    store: Rc<dyn KeyValueStore>,
    clock: Rc<dyn Clock>,
}

impl StreakTracker {
    /// Load persisted streak data and activity, falling back to defaults.
    pub fn load(store: Rc<dyn KeyValueStore>, clock: Rc<dyn Clock>) -> Self {
        let data = load_json::<StreakData>(store.as_ref(), STREAK_KEY).unwrap_or_default();
        let window = load_json::<Vec<DayActivity>>(store.as_ref(), ACTIVITY_KEY);

        let mut tracker = Self {
            data,
            window: Vec::new(),
            store,
            clock,
        };
        match window {
            Some(window) if !window.is_empty() => {
                tracker.window = window;
                if tracker.roll_window() {
                    tracker.persist_window();
                }
            }
            _ => tracker.initialize_weekly_activity(),
        }
        tracker
    }

    pub fn data(&self) -> &StreakData {
        &self.data
    }

    /// Oldest day first; the last entry is today after any mutation.
    pub fn weekly_activity(&self) -> &[DayActivity] {
        &self.window
    }

    /// Today's counts (zeroed when nothing has been recorded yet).
    pub fn today(&self) -> DayActivity {
        let today = self.clock.today();
        self.window
            .iter()
            .find(|d| d.date == today)
            .cloned()
            .unwrap_or_else(|| DayActivity::empty(today))
    }

    /// Re-seed the window with seven zeroed days ending today.
    pub fn initialize_weekly_activity(&mut self) {
        let today = self.clock.today();
        self.window = window_dates(today).map(DayActivity::empty).collect();
        self.persist_window();
    }

    /// Count one completed break or posture check.
    pub fn record_activity(&mut self, kind: TimerKind) -> Event {
        let today = self.clock.today();
        self.roll_window();

        let day = self.day_mut(today);
        let reached = match kind {
            TimerKind::Eye => {
                day.eye_breaks += 1;
                day.eye_breaks >= EYE_STREAK_THRESHOLD
            }
            TimerKind::Posture => {
                day.posture_checks += 1;
                day.posture_checks >= POSTURE_STREAK_THRESHOLD
            }
        };
        day.refresh_completed();

        if reached && self.data.last_activity_date != Some(today) {
            let continues = today
                .pred_opt()
                .is_some_and(|yesterday| self.data.last_activity_date == Some(yesterday));
            if continues || self.data.current_streak == 0 {
                self.data.current_streak += 1;
            } else {
                self.data.current_streak = 1;
            }
            self.data.longest_streak = self.data.longest_streak.max(self.data.current_streak);
            self.data.last_activity_date = Some(today);
            info!(
                current = self.data.current_streak,
                longest = self.data.longest_streak,
                "streak extended"
            );
        }

        self.data.total_completed_sessions += 1;
        self.data.completed_this_week = self
            .window
            .iter()
            .map(|d| d.eye_breaks + d.posture_checks)
            .sum();

        self.persist_window();
        self.persist_data();

        Event::ActivityRecorded {
            timer: kind,
            current_streak: self.data.current_streak,
            longest_streak: self.data.longest_streak,
            total_completed_sessions: self.data.total_completed_sessions,
            at: self.clock.now(),
        }
    }

    pub fn streak_message(&self) -> String {
        streak_message(self.data.current_streak)
    }

    /// Share of the weekly goal met, 0..=100.
    pub fn weekly_progress(&self) -> f64 {
        if self.data.weekly_goal == 0 {
            return 100.0;
        }
        (f64::from(self.data.completed_this_week) / f64::from(self.data.weekly_goal) * 100.0)
            .min(100.0)
    }

    pub fn update_weekly_goal(&mut self, goal: u32) -> Result<(), ValidationError> {
        if goal == 0 {
            return Err(ValidationError::InvalidGoal {
                goal: "weekly",
                value: goal,
            });
        }
        self.data.weekly_goal = goal;
        self.persist_data();
        Ok(())
    }

    pub fn update_streak_goal(&mut self, goal: u32) -> Result<(), ValidationError> {
        if goal == 0 {
            return Err(ValidationError::InvalidGoal {
                goal: "streak",
                value: goal,
            });
        }
        self.data.streak_goal = goal;
        self.persist_data();
        Ok(())
    }

    /// Back to defaults, keeping the longest streak and the session total.
    pub fn reset_streak(&mut self) {
        self.data = StreakData {
            longest_streak: self.data.longest_streak,
            total_completed_sessions: self.data.total_completed_sessions,
            ..StreakData::default()
        };
        self.persist_data();
        info!(longest = self.data.longest_streak, "streak reset");
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Make the window the seven days ending today, keeping counts for days
    /// still inside it. Returns whether anything changed.
    fn roll_window(&mut self) -> bool {
        let today = self.clock.today();
        let current = self.window.len() == WINDOW_DAYS
            && self.window.last().is_some_and(|d| d.date == today)
            && self.window.windows(2).all(|w| w[0].date < w[1].date);
        if current {
            return false;
        }

        let old = std::mem::take(&mut self.window);
        self.window = window_dates(today)
            .map(|date| {
                old.iter()
                    .find(|d| d.date == date)
                    .cloned()
                    .map(|mut d| {
                        d.refresh_completed();
                        d
                    })
                    .unwrap_or_else(|| DayActivity::empty(date))
            })
            .collect();
        true
    }

    fn day_mut(&mut self, date: NaiveDate) -> &mut DayActivity {
        let idx = match self.window.iter().position(|d| d.date == date) {
            Some(idx) => idx,
            None => {
                warn!(%date, "day missing from activity window, appending");
                self.window.push(DayActivity::empty(date));
                self.window.len() - 1
            }
        };
        &mut self.window[idx]
    }

    fn persist_window(&self) {
        save_json(self.store.as_ref(), ACTIVITY_KEY, &self.window);
    }

    fn persist_data(&self) {
        save_json(self.store.as_ref(), STREAK_KEY, &self.data);
    }
}

/// Tiered encouragement for a streak length.
pub fn streak_message(current_streak: u32) -> String {
    match current_streak {
        0 => "Start your wellness streak today!".to_string(),
        1 => "Great start! Keep it going tomorrow.".to_string(),
        n @ 2..=6 => format!("{n} days strong! You're building a healthy habit."),
        n @ 7..=29 => format!("Amazing! {n} day streak. You're on fire! 🔥"),
        n => format!("Incredible! {n} days of wellness. You're a champion! 🏆"),
    }
}

fn window_dates(today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    (0..WINDOW_DAYS as u64)
        .rev()
        .filter_map(move |back| today.checked_sub_days(Days::new(back)))
}
