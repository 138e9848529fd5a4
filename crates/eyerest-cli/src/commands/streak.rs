use std::rc::Rc;

use clap::Subcommand;
use eyerest_core::{Config, StreakTracker, SystemClock};
use serde_json::json;

use super::{open_database, print_json, CmdResult};

#[derive(Subcommand)]
pub enum StreakAction {
    /// Streak, today's counts and weekly progress
    Show,
    /// Reset the current streak (the longest streak is kept)
    Reset,
    /// Set the weekly session goal
    WeeklyGoal { goal: u32 },
    /// Set the streak goal in days
    StreakGoal { goal: u32 },
}

pub fn run(action: StreakAction, config: &Config) -> CmdResult {
    let db = open_database(config)?;
    let mut tracker = StreakTracker::load(db, Rc::new(SystemClock));

    match action {
        StreakAction::Show => {
            print_json(&json!({
                "streak": tracker.data(),
                "today": tracker.today(),
                "week": tracker.weekly_activity(),
                "weeklyProgress": tracker.weekly_progress(),
                "message": tracker.streak_message(),
            }))?;
        }
        StreakAction::Reset => {
            tracker.reset_streak();
            print_json(tracker.data())?;
        }
        StreakAction::WeeklyGoal { goal } => {
            tracker.update_weekly_goal(goal)?;
            print_json(tracker.data())?;
        }
        StreakAction::StreakGoal { goal } => {
            tracker.update_streak_goal(goal)?;
            print_json(tracker.data())?;
        }
    }
    Ok(())
}
