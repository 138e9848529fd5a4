mod clock;
mod countdown;
mod engine;
mod kind;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use countdown::{
    format_time, Countdown, FormattedTime, Restored, TimerPhase, TimerSnapshot, TimerState,
};
pub use engine::{BreakTimer, BreakTimerBuilder};
pub use kind::TimerKind;
pub use scheduler::{ManualScheduler, ScheduleHandle, Scheduler, TokioScheduler};
