use clap::Subcommand;
use eyerest_core::Config;

use super::{open_database, print_json, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats
    All,
    /// Most recent completed breaks
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction, config: &Config) -> CmdResult {
    let db = open_database(config)?;

    match action {
        StatsAction::Today => {
            let stats = db.stats_today()?;
            print_json(&stats)?;
        }
        StatsAction::All => {
            let stats = db.stats_all()?;
            print_json(&stats)?;
        }
        StatsAction::Recent { limit } => {
            let breaks = db.recent_breaks(limit)?;
            print_json(&breaks)?;
        }
    }
    Ok(())
}
