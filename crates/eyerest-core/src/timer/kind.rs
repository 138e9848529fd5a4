use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The two independently configured reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    Eye,
    Posture,
}

impl TimerKind {
    pub const ALL: [TimerKind; 2] = [TimerKind::Eye, TimerKind::Posture];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Eye => "eye",
            TimerKind::Posture => "posture",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eye" => Some(TimerKind::Eye),
            "posture" => Some(TimerKind::Posture),
            _ => None,
        }
    }

    /// Interval used when settings are absent.
    pub fn default_minutes(&self) -> u32 {
        match self {
            TimerKind::Eye => 20,
            TimerKind::Posture => 45,
        }
    }

    /// Key of the persisted countdown snapshot.
    pub fn storage_key(&self) -> &'static str {
        match self {
            TimerKind::Eye => "eyerest-eye-timer",
            TimerKind::Posture => "eyerest-posture-timer",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ValidationError::UnknownTimer(s.to_string()))
    }
}
