use std::rc::Rc;

use clap::Subcommand;
use eyerest_core::{
    Config, ConfigError, ConsoleNotifier, Event, ManualScheduler, NotificationPermission,
    SystemClock,
};

use super::{open_database, open_orchestrator, print_json, CmdResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a setting value
    Get {
        /// Setting key (e.g. "eyeInterval", "autoStart")
        key: String,
    },
    /// Set a setting value
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
    /// List all settings
    List,
    /// Reset settings to defaults
    Reset,
}

pub fn run(action: ConfigAction, config: &Config) -> CmdResult {
    let db = open_database(config)?;
    // Interval changes reset the affected timer, which the orchestrator
    // handles through its settings subscription.
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
    orchestrator.subscribe(|event| {
        if let Event::TimerReset { timer, total_secs, .. } = event {
            eprintln!("{timer} timer reset to {} min", total_secs / 60);
        }
    });
    let settings = orchestrator.settings().clone();

    match action {
        ConfigAction::Get { key } => match settings.get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(ConfigError::UnknownKey(key).into()),
        },
        ConfigAction::Set { key, value } => {
            settings.set(&key, &value)?;
            println!("ok");
        }
        ConfigAction::List => print_json(&settings.current())?,
        ConfigAction::Reset => {
            settings.reset();
            println!("settings reset to defaults");
        }
    }

    orchestrator.shutdown();
    Ok(())
}
