//! Alert sound preferences and the tone sequence they describe.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::storage::json_path::{display_value, get_by_path, set_by_path};
use crate::storage::{load_json, save_json, KeyValueStore};

pub const SOUND_SETTINGS_KEY: &str = "eyerest-sound-settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundType {
    Beep,
    Chime,
    Bell,
    Nature,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundSettings {
    pub sound_type: SoundType,
    /// 0.0 to 1.0
    pub volume: f64,
    /// Milliseconds.
    pub duration: u32,
    pub enabled: bool,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            sound_type: SoundType::Chime,
            volume: 0.5,
            duration: 500,
            enabled: false,
        }
    }
}

/// What produces the sound for one step of a [`TonePlan`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ToneSource {
    Sine { frequency_hz: u32 },
    /// White noise through a low-pass filter.
    Noise { cutoff_hz: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToneStep {
    pub at_ms: u32,
    #[serde(flatten)]
    pub source: ToneSource,
}

/// A rendered alert: steps starting at their offsets, all sharing one gain
/// envelope that decays to near silence over `duration_ms`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TonePlan {
    pub steps: Vec<ToneStep>,
    pub gain: f64,
    pub duration_ms: u32,
}

const TONE_GAIN: f64 = 0.3;
const NOISE_GAIN: f64 = 0.5;
const STEP_MS: u32 = 100;

fn sweep(frequencies: &[u32]) -> Vec<ToneStep> {
    frequencies
        .iter()
        .zip(0u32..)
        .map(|(&frequency_hz, i)| ToneStep {
            at_ms: i * STEP_MS,
            source: ToneSource::Sine { frequency_hz },
        })
        .collect()
}

impl SoundSettings {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        load_json::<SoundSettings>(store, SOUND_SETTINGS_KEY)
            .filter(|s| s.validate().is_ok())
            .unwrap_or_default()
    }

    /// Returns whether the write landed.
    pub fn save(&self, store: &dyn KeyValueStore) -> bool {
        save_json(store, SOUND_SETTINGS_KEY, self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::InvalidValue {
                key: "volume".into(),
                message: format!("{} is outside 0.0..=1.0", self.volume),
            });
        }
        if self.duration == 0 {
            return Err(ConfigError::InvalidValue {
                key: "duration".into(),
                message: "must be at least 1 ms".into(),
            });
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        get_by_path(&json, key).map(display_value)
    }

    /// Return a copy with one field replaced, coerced from `value`.
    pub fn with_field(&self, key: &str, value: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(self).map_err(|e| invalid(e.to_string()))?;
        set_by_path(&mut json, key, value)?;
        let updated: SoundSettings =
            serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        Ok(updated)
    }

    pub fn tone_plan(&self) -> TonePlan {
        let (steps, gain) = match self.sound_type {
            SoundType::Beep => (sweep(&[800]), TONE_GAIN),
            SoundType::Chime => (sweep(&[800, 600, 400]), TONE_GAIN),
            // C5, E5, G5
            SoundType::Bell => (sweep(&[523, 659, 784]), TONE_GAIN),
            SoundType::Nature => (
                vec![ToneStep {
                    at_ms: 0,
                    source: ToneSource::Noise { cutoff_hz: 300 },
                }],
                NOISE_GAIN,
            ),
            SoundType::Custom => (sweep(&[600]), TONE_GAIN),
        };
        TonePlan {
            steps,
            gain: self.volume * gain,
            duration_ms: self.duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn frequencies(plan: &TonePlan) -> Vec<u32> {
        plan.steps
            .iter()
            .filter_map(|s| match s.source {
                ToneSource::Sine { frequency_hz } => Some(frequency_hz),
                ToneSource::Noise { .. } => None,
            })
            .collect()
    }

    #[test]
    fn defaults_match_stored_shape() {
        let json = serde_json::to_value(SoundSettings::default()).unwrap();
        assert_eq!(json["soundType"], "chime");
        assert_eq!(json["volume"], 0.5);
        assert_eq!(json["duration"], 500);
        assert_eq!(json["enabled"], false);
    }

    #[test]
    fn tone_plans_per_type() {
        let mut settings = SoundSettings::default();
        assert_eq!(frequencies(&settings.tone_plan()), vec![800, 600, 400]);
        assert_eq!(
            settings.tone_plan().steps.iter().map(|s| s.at_ms).collect::<Vec<_>>(),
            vec![0, 100, 200]
        );

        settings.sound_type = SoundType::Bell;
        assert_eq!(frequencies(&settings.tone_plan()), vec![523, 659, 784]);

        settings.sound_type = SoundType::Beep;
        assert_eq!(frequencies(&settings.tone_plan()), vec![800]);

        settings.sound_type = SoundType::Custom;
        assert_eq!(frequencies(&settings.tone_plan()), vec![600]);

        settings.sound_type = SoundType::Nature;
        let plan = settings.tone_plan();
        assert_eq!(
            plan.steps[0].source,
            ToneSource::Noise { cutoff_hz: 300 }
        );
        assert!((plan.gain - 0.25).abs() < 1e-9);
    }

    #[test]
    fn gain_scales_with_volume() {
        let settings = SoundSettings {
            volume: 1.0,
            duration: 1200,
            ..SoundSettings::default()
        };
        let plan = settings.tone_plan();
        assert!((plan.gain - 0.3).abs() < 1e-9);
        assert_eq!(plan.duration_ms, 1200);
    }

    #[test]
    fn load_merges_and_rejects_out_of_range() {
        let store = MemoryStore::new();
        store.put_raw(SOUND_SETTINGS_KEY, r#"{"soundType":"bell","enabled":true}"#);
        let loaded = SoundSettings::load(&store);
        assert_eq!(loaded.sound_type, SoundType::Bell);
        assert!(loaded.enabled);
        assert_eq!(loaded.duration, 500);

        store.put_raw(SOUND_SETTINGS_KEY, r#"{"volume": 7}"#);
        assert_eq!(SoundSettings::load(&store), SoundSettings::default());

        store.put_raw(SOUND_SETTINGS_KEY, r#"{"soundType":"kazoo"}"#);
        assert_eq!(SoundSettings::load(&store), SoundSettings::default());
    }

    #[test]
    fn field_updates_validate() {
        let settings = SoundSettings::default();
        let louder = settings.with_field("volume", "0.9").unwrap();
        assert!((louder.volume - 0.9).abs() < 1e-9);
        let bell = settings.with_field("soundType", "bell").unwrap();
        assert_eq!(bell.sound_type, SoundType::Bell);

        assert!(settings.with_field("volume", "1.5").is_err());
        assert!(settings.with_field("duration", "0").is_err());
        assert!(settings.with_field("soundType", "kazoo").is_err());
        assert!(settings.with_field("pitch", "3").is_err());
    }

    #[test]
    fn save_then_load() {
        let store = MemoryStore::new();
        let settings = SoundSettings {
            enabled: true,
            sound_type: SoundType::Nature,
            ..SoundSettings::default()
        };
        assert!(settings.save(&store));
        assert_eq!(SoundSettings::load(&store), settings);
    }
}
