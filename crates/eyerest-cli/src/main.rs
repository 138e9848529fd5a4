use clap::{Parser, Subcommand};
use eyerest_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "eyerest", version, about = "Eye-rest and posture break reminders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both timers in the foreground until Ctrl-C
    Run(commands::run::RunArgs),
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Reminder settings
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Alert sound settings
    Sound {
        #[command(subcommand)]
        action: commands::sound::SoundAction,
    },
    /// Daily streak and weekly goal
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Break statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
}

/// `EYEREST_LOG` wins over the config file; a bad directive falls back to
/// `info`.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("EYEREST_LOG")
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_logging(&config);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, &config),
        Commands::Timer { action } => commands::timer::run(action, &config),
        Commands::Config { action } => commands::config::run(action, &config),
        Commands::Sound { action } => commands::sound::run(action, &config),
        Commands::Streak { action } => commands::streak::run(action, &config),
        Commands::Stats { action } => commands::stats::run(action, &config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
