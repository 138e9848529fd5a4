use clap::Subcommand;
use eyerest_core::{Config, ConfigError, ConsoleNotifier, NotificationPermission, SoundSettings};
use serde_json::json;

use super::{open_database, print_json, CmdResult};

#[derive(Subcommand)]
pub enum SoundAction {
    /// Print sound settings and the tone they produce
    Show,
    /// Set a sound setting (soundType, volume, duration, enabled)
    Set { key: String, value: String },
    /// Play the configured alert sound
    Test,
}

pub fn run(action: SoundAction, config: &Config) -> CmdResult {
    let db = open_database(config)?;
    let settings = SoundSettings::load(db.as_ref());

    match action {
        SoundAction::Show => {
            print_json(&json!({
                "settings": settings,
                "tone": settings.tone_plan(),
            }))?;
        }
        SoundAction::Set { key, value } => {
            let updated = settings.with_field(&key, &value)?;
            if !updated.save(db.as_ref()) {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: "could not be saved".into(),
                }
                .into());
            }
            println!("ok");
        }
        SoundAction::Test => {
            if !settings.enabled {
                eprintln!("sound is disabled; enable it with `eyerest sound set enabled true`");
                return Ok(());
            }
            let notifier = ConsoleNotifier::new(std::io::stdout(), NotificationPermission::Granted)
                .with_sound(settings);
            notifier.play_notification_sound();
        }
    }
    Ok(())
}
