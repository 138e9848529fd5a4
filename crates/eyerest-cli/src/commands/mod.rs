pub mod config;
pub mod run;
pub mod sound;
pub mod stats;
pub mod streak;
pub mod timer;

use std::rc::Rc;
use std::time::Duration;

use eyerest_core::storage::BreakHistory;
use eyerest_core::{
    Clock, Config, Database, KeyValueStore, Notifier, Orchestrator, OrchestratorDeps, Result,
    Scheduler, SettingsStore,
};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Open the database named by the config.
pub fn open_database(config: &Config) -> Result<Rc<Database>> {
    let path = config.database_path()?;
    Ok(Rc::new(Database::open_at(&path)?))
}

/// Build the orchestrator over `db` with the given scheduler and notifier.
pub fn open_orchestrator(
    config: &Config,
    db: &Rc<Database>,
    scheduler: Rc<dyn Scheduler>,
    clock: Rc<dyn Clock>,
    notifier: Rc<dyn Notifier>,
) -> Result<Rc<Orchestrator>> {
    let store: Rc<dyn KeyValueStore> = db.clone();
    let history: Rc<dyn BreakHistory> = db.clone();
    let settings = Rc::new(SettingsStore::load(store.clone()));
    let orchestrator = Orchestrator::new(OrchestratorDeps {
        scheduler,
        clock,
        store,
        notifier,
        settings,
        history: Some(history),
        auto_restart_delay: Duration::from_millis(config.daemon.auto_restart_delay_ms),
    })?;
    Ok(orchestrator)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
