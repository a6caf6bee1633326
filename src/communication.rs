use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use log::warn;

use crate::alarm::Sound;

/// sent from the alarm service to whatever shows the alarm to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    pub alarm_name: String,
}

impl Message {
    #[must_use]
    pub fn new(kind: MessageType, alarm_name: impl Into<String>) -> Self {
        Self {
            kind,
            alarm_name: alarm_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// show the alarm prompt and start ringing
    AlarmDue {
        steps: u32,
        sound: Sound,
        vibrate: bool,
    },
    StepsUpdate {
        remaining: u32,
    },
    /// stop ringing and close the prompt
    Dismiss,
    /// short text for the user, mostly errors
    Toast(String),
}

/// fire and forget, a presenter that went away only gets logged
pub fn send(sender: &Sender<Message>, message: Message) {
    if let Err(e) = sender.send(message) {
        warn!("couldn't deliver {:?}: presenter is gone", e.into_inner().kind);
    }
}

/// flags shared between the alarm service and the presenter
#[derive(Debug, Default)]
pub struct SharedState {
    notification_shown: AtomicBool,
    prompt_open: AtomicBool,
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl SharedState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// called by the presenter once the alarm has actually reached the user
    pub fn mark_notification_shown(&self) {
        self.notification_shown.store(true, Ordering::SeqCst);
    }

    /// reads and clears the shown flag
    pub fn take_notification_shown(&self) -> bool {
        self.notification_shown.swap(false, Ordering::SeqCst)
    }

    pub fn set_prompt_open(&self, open: bool) {
        self.prompt_open.store(open, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_prompt_open(&self) -> bool {
        self.prompt_open.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// forget everything about the alarm that just ended
    pub fn reset_alarm(&self) {
        self.notification_shown.store(false, Ordering::SeqCst);
    }
}
