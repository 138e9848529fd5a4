use std::cell::RefCell;
use std::rc::Rc;

use clap::Subcommand;
use eyerest_core::{
    Config, ConsoleNotifier, Event, ManualScheduler, NotificationPermission, SystemClock,
    TimerKind,
};

use super::{open_database, open_orchestrator, print_json, CmdResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print timer state as JSON
    Status {
        /// eye or posture (both when omitted)
        timer: Option<TimerKind>,
    },
    /// Start (or resume) a timer
    Start { timer: TimerKind },
    /// Pause a running timer
    Pause { timer: TimerKind },
    /// Start if paused, pause if running
    Toggle { timer: TimerKind },
    /// Stop and refill a timer
    Reset {
        timer: TimerKind,
        /// New interval in minutes (defaults to the configured interval)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        minutes: Option<u32>,
    },
}

/// Apply one command to the persisted timers.
///
/// Time that passed since the last save is subtracted on load, so a timer
/// started here keeps counting while no process is running. Completions are
/// only observed by `eyerest run`.
pub fn run(action: TimerAction, config: &Config) -> CmdResult {
    let db = open_database(config)?;
    let orchestrator = open_orchestrator(
        config,
        &db,
        Rc::new(ManualScheduler::new()),
        Rc::new(SystemClock),
        Rc::new(ConsoleNotifier::new(
            std::io::stderr(),
            NotificationPermission::Granted,
        )),
    )?;

    let events: Rc<RefCell<Vec<Event>>> = Rc::default();
    let sink = events.clone();
    orchestrator.subscribe(move |e| sink.borrow_mut().push(e.clone()));

    let shown = match action {
        TimerAction::Status { timer } => match timer {
            Some(kind) => vec![kind],
            None => TimerKind::ALL.to_vec(),
        },
        TimerAction::Start { timer } => {
            orchestrator.start(timer);
            vec![timer]
        }
        TimerAction::Pause { timer } => {
            orchestrator.pause(timer);
            vec![timer]
        }
        TimerAction::Toggle { timer } => {
            orchestrator.toggle(timer);
            vec![timer]
        }
        TimerAction::Reset { timer, minutes } => {
            match minutes {
                Some(minutes) => {
                    let event = orchestrator.timer(timer).reset(Some(minutes));
                    events.borrow_mut().push(event);
                }
                None => orchestrator.reset(timer),
            }
            vec![timer]
        }
    };

    for event in events.borrow().iter() {
        print_json(event)?;
    }
    for kind in shown {
        print_json(&orchestrator.timer(kind).snapshot_event())?;
    }

    orchestrator.shutdown();
    Ok(())
}
