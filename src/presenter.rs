use std::{
    io::Write,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;
use log::{info, warn};
use notify_rust::Notification;

use crate::communication::{Message, MessageType, SharedState};
#[cfg(feature = "sound")]
use crate::sound::AlarmPlayer;

/// shows what the alarm service sends over the message channel
pub trait Presenter {
    fn present(&mut self, message: Message);
}

/// hands every message to `presenter` until the service side hangs up
pub fn run_presenter<P: Presenter>(events: &Receiver<Message>, presenter: &mut P) {
    for message in events {
        presenter.present(message);
    }
}

/// `make` runs on the presenter thread, so presenters holding things that
/// can't leave their thread (audio streams) are fine
pub fn spawn_presenter<P, F>(events: Receiver<Message>, make: F) -> JoinHandle<()>
where
    P: Presenter,
    F: FnOnce() -> P + Send + 'static,
{
    thread::spawn(move || {
        let mut presenter = make();
        run_presenter(&events, &mut presenter);
        info!("presenter stopped");
    })
}

/// prints alarms to a terminal and optionally mirrors them as desktop notifications
pub struct TerminalPresenter<W> {
    out: W,
    shared: Arc<SharedState>,
    desktop: bool,
    last_remaining: Option<u32>,
    #[cfg(feature = "sound")]
    player: Option<AlarmPlayer>,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, shared: Arc<SharedState>, desktop: bool) -> Self {
        Self {
            out,
            shared,
            desktop,
            last_remaining: None,
            #[cfg(feature = "sound")]
            player: AlarmPlayer::new()
                .map_err(|e| warn!("alarm sounds disabled: {e}"))
                .ok(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!("couldn't write to terminal: {e}");
        }
    }

    fn notify(&self, summary: &str, body: &str) {
        if !self.desktop {
            return;
        }
        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .appname("walking_alarm")
            .show()
        {
            warn!("couldn't show desktop notification: {e}");
        }
    }

    #[cfg(feature = "sound")]
    fn ring(&mut self, sound: &crate::alarm::Sound) {
        if let Some(player) = &mut self.player {
            if let Err(e) = player.play(sound) {
                warn!("couldn't play {sound}: {e}");
            }
        }
    }

    #[cfg(not(feature = "sound"))]
    fn ring(&mut self, sound: &crate::alarm::Sound) {
        info!("would play {sound}, built without sound support");
    }

    fn silence(&mut self) {
        #[cfg(feature = "sound")]
        if let Some(player) = &mut self.player {
            player.stop();
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present(&mut self, message: Message) {
        let Message { kind, alarm_name } = message;
        match kind {
            MessageType::AlarmDue {
                steps,
                sound,
                vibrate,
            } => {
                let body = format!("Walk {steps} steps to dismiss");
                self.line(&format!("alarm {alarm_name}: {body}"));
                if vibrate {
                    self.line("(vibrating)");
                }
                self.notify(&format!("Alarm {alarm_name}"), &body);
                self.ring(&sound);
                self.last_remaining = Some(steps);
                self.shared.set_prompt_open(true);
                self.shared.mark_notification_shown();
            }
            MessageType::StepsUpdate { remaining } => {
                // only print changes, updates come in every poll
                if self.last_remaining != Some(remaining) {
                    self.line(&format!("{remaining} steps remaining"));
                    self.last_remaining = Some(remaining);
                }
            }
            MessageType::Dismiss => {
                self.silence();
                self.line(&format!("alarm {alarm_name} dismissed"));
                self.last_remaining = None;
                self.shared.set_prompt_open(false);
            }
            MessageType::Toast(text) => {
                self.line(&text);
                self.notify("Walking Alarm", &text);
            }
        }
    }
}
