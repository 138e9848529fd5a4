//! User settings: break intervals and notification toggles.
//!
//! Settings live in the key/value store as a camelCase JSON object under
//! [`SETTINGS_KEY`]. Missing fields take their defaults, so payloads written
//! by older versions keep loading. Changes go through [`SettingsStore`],
//! which validates, persists, and notifies subscribers.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, ValidationError};
use crate::storage::json_path::{display_value, get_by_path, set_by_path};
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::timer::TimerKind;

pub const SETTINGS_KEY: &str = "eyerest-settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Minutes between eye breaks.
    pub eye_interval: u32,
    /// Minutes between posture checks.
    pub posture_interval: u32,
    pub eye_notifications: bool,
    pub posture_notifications: bool,
    pub sound_alerts: bool,
    /// Restart a timer shortly after it completes.
    pub auto_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            eye_interval: TimerKind::Eye.default_minutes(),
            posture_interval: TimerKind::Posture.default_minutes(),
            eye_notifications: true,
            posture_notifications: true,
            sound_alerts: false,
            auto_start: true,
        }
    }
}

impl Settings {
    pub fn interval(&self, kind: TimerKind) -> u32 {
        match kind {
            TimerKind::Eye => self.eye_interval,
            TimerKind::Posture => self.posture_interval,
        }
    }

    pub fn notifications_enabled(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Eye => self.eye_notifications,
            TimerKind::Posture => self.posture_notifications,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for kind in TimerKind::ALL {
            let minutes = self.interval(kind);
            if minutes == 0 {
                return Err(ValidationError::InvalidInterval {
                    timer: kind.to_string(),
                    minutes,
                });
            }
        }
        Ok(())
    }

    /// Get a field as a string by camelCase key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        get_by_path(&json, key).map(display_value)
    }

    /// Return a copy with one field replaced, coerced from `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value does not parse as
    /// the field's type, or the result fails validation.
    pub fn with_field(&self, key: &str, value: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(self).map_err(|e| invalid(e.to_string()))?;
        set_by_path(&mut json, key, value)?;
        let updated: Settings = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate().map_err(|e| invalid(e.to_string()))?;
        Ok(updated)
    }

    /// Zero intervals can only come from hand-edited storage; replace them.
    fn sanitized(mut self) -> Self {
        let defaults = Settings::default();
        if self.eye_interval == 0 {
            warn!("stored eye interval is zero, using default");
            self.eye_interval = defaults.eye_interval;
        }
        if self.posture_interval == 0 {
            warn!("stored posture interval is zero, using default");
            self.posture_interval = defaults.posture_interval;
        }
        self
    }
}

/// Receives `(previous, current)` after every effective change.
pub type SettingsListener = Box<dyn FnMut(&Settings, &Settings)>;

/// Shared, observable settings backed by a key/value store.
pub struct SettingsStore {
    store: Rc<dyn KeyValueStore>,
    current: RefCell<Settings>,
    listeners: RefCell<Vec<SettingsListener>>,
}

impl SettingsStore {
    pub fn load(store: Rc<dyn KeyValueStore>) -> Self {
        let current = load_json::<Settings>(store.as_ref(), SETTINGS_KEY)
            .map(Settings::sanitized)
            .unwrap_or_default();
        Self {
            store,
            current: RefCell::new(current),
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn current(&self) -> Settings {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self, listener: impl FnMut(&Settings, &Settings) + 'static) {
        self.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Validate and apply `settings`, persisting and notifying on change.
    pub fn replace(&self, settings: Settings) -> Result<(), ValidationError> {
        settings.validate()?;
        let previous = self.current.replace(settings.clone());
        if previous == settings {
            return Ok(());
        }
        save_json(self.store.as_ref(), SETTINGS_KEY, &settings);
        info!(?settings, "settings updated");
        self.notify(&previous, &settings);
        Ok(())
    }

    pub fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<(), ValidationError> {
        let mut next = self.current();
        apply(&mut next);
        self.replace(next)
    }

    /// Set one field by key, see [`Settings::with_field`].
    pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let next = self.current().with_field(key, value)?;
        self.replace(next).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.current.borrow().get(key)
    }

    pub fn reset(&self) {
        // Defaults always validate.
        let _ = self.replace(Settings::default());
    }

    fn notify(&self, previous: &Settings, current: &Settings) {
        // Listeners may subscribe or read settings while running.
        let mut running = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in running.iter_mut() {
            listener(previous, current);
        }
        let mut listeners = self.listeners.borrow_mut();
        running.append(&mut listeners);
        *listeners = running;
    }
}
