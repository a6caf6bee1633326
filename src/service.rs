use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info};

use crate::{
    communication::{send, Message, MessageType, SharedState},
    config::Config,
    dismiss::DismissWorkflow,
    error::Result,
    monitor::find_due_alarm,
    AppContext,
};

const FIRST_RESTART_DELAY: Duration = Duration::from_secs(1);
const MAX_RESTART_DELAY: Duration = Duration::from_secs(60);
/// how often a pause checks for a stop request
const PAUSE_SLICE: Duration = Duration::from_millis(250);

/// runs one monitor pass, returns whether an alarm went off
///
/// settings are read fresh for every alarm so changes apply to the next one
pub fn run_pass(ctx: &AppContext) -> Result<bool> {
    let Some(alarm) = find_due_alarm(&ctx.store, ctx.clock.now())? else {
        return Ok(false);
    };
    let config = Config::load_or_default(&ctx.config_path);
    if let Err(e) = DismissWorkflow::new(ctx, &config).run(&alarm) {
        debug!("alarm ended with {e:?}");
    }
    Ok(true)
}

/// one background thread that checks the store and rings whatever is due,
/// restarted with a doubling delay if it panics
pub struct AlarmService;

impl AlarmService {
    /// starts the monitor thread, the returned handle stops it again
    #[must_use]
    pub fn start(ctx: AppContext) -> ServiceHandle {
        let shared = ctx.shared.clone();
        shared.clear_stop();
        shared.set_running(true);
        info!("starting alarm service on {}", ctx.store.path().display());
        let thread = thread::spawn(move || supervise(&ctx));
        ServiceHandle {
            shared,
            thread: Some(thread),
        }
    }
}

pub struct ServiceHandle {
    shared: Arc<SharedState>,
    thread: Option<JoinHandle<()>>,
}

impl ServiceHandle {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// asks the service to stop and waits for it, an alarm that is ringing
    /// gets dismissed
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// blocks until the service stops on its own
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("alarm service thread panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shared.request_stop();
            if thread.join().is_err() {
                error!("alarm service thread panicked");
            }
        }
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn supervise(ctx: &AppContext) {
    let mut delay = FIRST_RESTART_DELAY;
    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| monitor(ctx))) {
            Ok(()) => break,
            Err(payload) => {
                error!(
                    "alarm service crashed: {}, restarting in {delay:?}",
                    panic_message(payload.as_ref())
                );
                // whatever was ringing has no workflow behind it anymore
                send(&ctx.sender, Message::new(MessageType::Dismiss, ""));
                ctx.shared.reset_alarm();
                pause(ctx, delay);
                if ctx.shared.stop_requested() {
                    break;
                }
                delay = (delay * 2).min(MAX_RESTART_DELAY);
            }
        }
    }
    ctx.shared.set_running(false);
    info!("alarm service stopped");
}

fn monitor(ctx: &AppContext) {
    while !ctx.shared.stop_requested() {
        if let Err(e) = run_pass(ctx) {
            error!("couldn't check alarms: {e}");
        }
        pause(ctx, Config::load_or_default(&ctx.config_path).poll_interval());
    }
}

/// sleeps for `total` unless a stop is requested first
fn pause(ctx: &AppContext, total: Duration) {
    let mut left = total;
    while !left.is_zero() && !ctx.shared.stop_requested() {
        let slice = left.min(PAUSE_SLICE);
        ctx.clock.sleep(slice);
        left = left.saturating_sub(slice);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
