use std::rc::Rc;

use clap::Args;
use eyerest_core::{
    Config, ConsoleNotifier, NotificationPermission, SoundSettings, SystemClock, TokioScheduler,
};
use tracing::{info, warn};

use super::{open_database, open_orchestrator, CmdResult};

#[derive(Args)]
pub struct RunArgs {
    /// Resume persisted timers without starting stopped ones
    #[arg(long)]
    pub no_start: bool,
}

/// Host both timers until Ctrl-C, printing every event as a JSON line.
pub fn run(args: RunArgs, config: &Config) -> CmdResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, serve(args, config))
}

async fn serve(args: RunArgs, config: &Config) -> CmdResult {
    let db = open_database(config)?;
    let notifier = ConsoleNotifier::new(std::io::stderr(), NotificationPermission::Default)
        .with_sound(SoundSettings::load(db.as_ref()));
    notifier.request_permission();

    let orchestrator = open_orchestrator(
        config,
        &db,
        Rc::new(TokioScheduler::new()),
        Rc::new(SystemClock),
        Rc::new(notifier),
    )?;
    orchestrator.subscribe(|event| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to encode event"),
    });

    for event in orchestrator.status() {
        println!("{}", serde_json::to_string(&event)?);
    }
    if !args.no_start {
        orchestrator.start_all();
    }
    info!("running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    orchestrator.shutdown();
    Ok(())
}
