mod config;
pub mod database;
pub mod json_path;
mod memory;

pub use config::{Config, DaemonConfig, LogConfig, StorageConfig};
pub use database::{BreakRecord, Database, Stats};
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{ConfigError, StorageError};
use crate::timer::TimerKind;

/// Durable string-keyed storage of JSON values.
///
/// Both operations may fail. Callers in the timer and streak paths go through
/// [`load_json`] / [`save_json`], which log failures instead of returning them.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError>;
}

/// Sink for completed breaks, used for historical statistics.
pub trait BreakHistory {
    fn record_break(
        &self,
        kind: TimerKind,
        duration_secs: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Read and decode `key`, returning `None` when it is missing, unreadable or
/// does not match `T`.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key, error = %e, "stored value has unexpected shape, using defaults");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "failed to read from store, using defaults");
            None
        }
    }
}

/// Encode and write `value` under `key`. Returns whether the write landed.
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(e) => {
            warn!(key, error = %e, "failed to encode value for store");
            return false;
        }
    };
    match store.set(key, &json) {
        Ok(()) => true,
        Err(e) => {
            warn!(key, error = %e, "failed to write to store, keeping in-memory state");
            false
        }
    }
}

/// Returns `~/.config/eyerest[-dev]/` based on EYEREST_ENV.
///
/// Set EYEREST_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("EYEREST_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("eyerest-dev")
    } else {
        base_dir.join("eyerest")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}
