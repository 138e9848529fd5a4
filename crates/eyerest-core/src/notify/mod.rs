//! Break notifications.
//!
//! The orchestrator only sees the [`Notifier`] trait. [`ConsoleNotifier`]
//! writes alerts to any `io::Write` and renders sound as terminal bells.

mod sound;

pub use sound::{SoundSettings, SoundType, TonePlan, ToneSource, ToneStep, SOUND_SETTINGS_KEY};

use std::cell::{Cell, RefCell};
use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::timer::TimerKind;

/// Every alert sink implements this trait. Calls are fire-and-forget.
pub trait Notifier {
    fn show_eye_break_notification(&self, with_sound: bool);

    fn show_posture_notification(&self, with_sound: bool);

    /// Dispatch to the alert for `kind`.
    fn show_for(&self, kind: TimerKind, with_sound: bool) {
        match kind {
            TimerKind::Eye => self.show_eye_break_notification(with_sound),
            TimerKind::Posture => self.show_posture_notification(with_sound),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    /// Not yet asked.
    #[default]
    Default,
    Granted,
    Denied,
}

/// Title, body and tag of a break alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub title: &'static str,
    pub body: &'static str,
    pub tag: &'static str,
}

impl Notification {
    pub fn for_timer(kind: TimerKind) -> Self {
        match kind {
            TimerKind::Eye => Self {
                title: "Time for an eye break! 👁️",
                body: "Look at something 20 feet away for 20 seconds to rest your eyes.",
                tag: "eye-break",
            },
            TimerKind::Posture => Self {
                title: "Posture check time! 🧘",
                body: "Take a moment to stretch and check your posture.",
                tag: "posture-check",
            },
        }
    }
}

const BELL: &str = "\x07";

pub struct ConsoleNotifier<W: Write> {
    out: RefCell<W>,
    permission: Cell<NotificationPermission>,
    sound: SoundSettings,
}

impl<W: Write> ConsoleNotifier<W> {
    pub fn new(out: W, permission: NotificationPermission) -> Self {
        Self {
            out: RefCell::new(out),
            permission: Cell::new(permission),
            sound: SoundSettings::default(),
        }
    }

    pub fn with_sound(mut self, sound: SoundSettings) -> Self {
        self.sound = sound;
        self
    }

    pub fn permission(&self) -> NotificationPermission {
        self.permission.get()
    }

    /// Ask for permission. A console can always show alerts, so anything
    /// not explicitly denied becomes granted.
    pub fn request_permission(&self) -> NotificationPermission {
        if self.permission.get() != NotificationPermission::Denied {
            self.permission.set(NotificationPermission::Granted);
        }
        self.permission.get()
    }

    pub fn set_permission(&self, permission: NotificationPermission) {
        self.permission.set(permission);
    }

    /// Play the configured alert sound, unless sound is disabled.
    pub fn play_notification_sound(&self) {
        if !self.sound.enabled {
            return;
        }
        self.play(&self.sound.tone_plan());
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn play(&self, plan: &TonePlan) {
        let bells = BELL.repeat(plan.steps.len().max(1));
        self.write(&bells);
        debug!(steps = plan.steps.len(), gain = plan.gain, "played alert tone");
    }

    fn show(&self, kind: TimerKind, with_sound: bool) {
        if with_sound {
            self.play(&self.sound.tone_plan());
        }
        if self.permission.get() != NotificationPermission::Granted {
            debug!(timer = %kind, permission = ?self.permission.get(), "notification suppressed");
            return;
        }
        let n = Notification::for_timer(kind);
        self.write(&format!("{}\n  {}\n", n.title, n.body));
    }

    fn write(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(error = %e, "failed to write notification");
        }
    }
}

impl<W: Write> Notifier for ConsoleNotifier<W> {
    fn show_eye_break_notification(&self, with_sound: bool) {
        self.show(TimerKind::Eye, with_sound);
    }

    fn show_posture_notification(&self, with_sound: bool) {
        self.show(TimerKind::Posture, with_sound);
    }
}
