use std::time::Duration;

use chrono::NaiveDateTime;
use log::{info, warn};
use thiserror::Error;

use crate::{
    alarm::Alarm,
    communication::{send, Message, MessageType},
    config::Config,
    steps::{fetch_steps, StepError},
    AppContext,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DismissError {
    #[error(transparent)]
    Steps(#[from] StepError),
    #[error("no steps were detected, dismissing alarm")]
    NoStepsDetected,
    #[error("alarm was not dismissed in time")]
    NotDismissedInTime,
    #[error("alarm service is stopping")]
    Interrupted,
}

/// steps still to walk, never below zero
/// a count below the baseline (a new day started) counts as nothing walked
#[must_use]
pub fn steps_remaining(target: u32, starting: u64, current: u64) -> u32 {
    let walked = u32::try_from(current.saturating_sub(starting)).unwrap_or(u32::MAX);
    target.saturating_sub(walked)
}

fn after(now: NaiveDateTime, window: Duration) -> NaiveDateTime {
    now + chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero())
}

#[derive(Debug, Clone, Copy)]
struct Deadlines {
    no_steps: NaiveDateTime,
    partial: NaiveDateTime,
}

impl Deadlines {
    fn starting_at(now: NaiveDateTime, config: &Config) -> Self {
        Self {
            no_steps: after(now, config.no_steps_window()),
            partial: after(now, config.partial_steps_window()),
        }
    }
}

/// rings an alarm and polls steps until the user has walked far enough
/// the no-steps and partial-steps deadlines only start once the presenter
/// reports the alarm was shown
pub struct DismissWorkflow<'a> {
    ctx: &'a AppContext,
    config: &'a Config,
}

impl<'a> DismissWorkflow<'a> {
    #[must_use]
    pub const fn new(ctx: &'a AppContext, config: &'a Config) -> Self {
        Self { ctx, config }
    }

    /// rings `alarm` until it is walked off or gives up, the presenter is
    /// always told to dismiss at the end
    pub fn run(&self, alarm: &Alarm) -> Result<(), DismissError> {
        let name = alarm.name(&self.config.time_format);
        let result = self.walk(alarm, &name);
        match &result {
            Ok(()) => {
                info!("alarm {name} dismissed");
                if !self.ctx.shared.is_prompt_open() {
                    self.notify(&name, MessageType::Toast("Alarm dismissed".to_string()));
                }
            }
            Err(DismissError::Interrupted) => warn!("alarm {name} dropped, service is stopping"),
            Err(e) => {
                warn!("alarm {name} force dismissed: {e}");
                self.notify(&name, MessageType::Toast(e.to_string()));
                // give the message time to reach the user
                self.ctx.clock.sleep(self.config.poll_interval());
            }
        }
        self.notify(&name, MessageType::Dismiss);
        self.ctx.shared.reset_alarm();
        result
    }

    fn walk(&self, alarm: &Alarm, name: &str) -> Result<(), DismissError> {
        let target = self.config.steps_to_dismiss();
        self.notify(
            name,
            MessageType::AlarmDue {
                steps: target,
                sound: alarm.sound.clone(),
                vibrate: self.config.vibrate,
            },
        );
        self.ctx.clock.sleep(self.config.poll_interval());

        let starting = self.current_steps()?;
        info!("alarm {name} needs {target} steps, starting from {starting}");
        let mut deadlines = None;
        loop {
            if self.ctx.shared.stop_requested() {
                return Err(DismissError::Interrupted);
            }
            let remaining = steps_remaining(target, starting, self.current_steps()?);
            self.notify(name, MessageType::StepsUpdate { remaining });

            let now = self.ctx.clock.now();
            if self.ctx.shared.take_notification_shown() {
                deadlines = Some(Deadlines::starting_at(now, self.config));
            }
            if remaining == 0 {
                return Ok(());
            }
            if let Some(deadlines) = deadlines {
                if now > deadlines.no_steps && remaining == target {
                    return Err(DismissError::NoStepsDetected);
                }
                if now > deadlines.partial {
                    return Err(DismissError::NotDismissedInTime);
                }
            }
            self.ctx.clock.sleep(self.config.step_poll_interval());
        }
    }

    fn current_steps(&self) -> Result<u64, StepError> {
        fetch_steps(self.ctx.steps.as_ref(), self.config.step_fetch_timeout())
    }

    fn notify(&self, name: &str, kind: MessageType) {
        send(&self.ctx.sender, Message::new(kind, name));
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex,
        },
    };

    use chrono::{NaiveDate, Weekday};
    use crossbeam_channel::Receiver;
    use test_case::test_case;

    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        communication::SharedState,
        steps::{StepCallback, StepSource},
        store::AlarmStore,
    };

    /// answers with the queued counts, then keeps repeating the last one
    struct Scripted(Mutex<VecDeque<u64>>);

    impl Scripted {
        fn new(counts: impl IntoIterator<Item = u64>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(counts.into_iter().collect())))
        }
    }

    impl StepSource for Scripted {
        fn request_daily_total(&self, callback: StepCallback) -> Result<(), StepError> {
            let mut counts = self.0.lock().unwrap();
            let steps = if counts.len() > 1 {
                counts.pop_front()
            } else {
                counts.front().copied()
            };
            callback.complete(steps);
            Ok(())
        }
    }

    struct NoAccount;

    impl StepSource for NoAccount {
        fn request_daily_total(&self, _callback: StepCallback) -> Result<(), StepError> {
            Err(StepError::NoAccount)
        }
    }

    /// keeps every callback without ever answering
    #[derive(Default)]
    struct Hangs(Mutex<Vec<StepCallback>>);

    impl StepSource for Hangs {
        fn request_daily_total(&self, callback: StepCallback) -> Result<(), StepError> {
            self.0.lock().unwrap().push(callback);
            Ok(())
        }
    }

    /// gives the baseline, then drops every later request
    #[derive(Default)]
    struct AnswersOnce(AtomicBool);

    impl StepSource for AnswersOnce {
        fn request_daily_total(&self, callback: StepCallback) -> Result<(), StepError> {
            if !self.0.swap(true, Ordering::SeqCst) {
                callback.complete(Some(100));
            }
            Ok(())
        }
    }

    /// raises the shown flag the way a presenter would, then loses the read
    struct ShownThenFails(Arc<SharedState>);

    impl StepSource for ShownThenFails {
        fn request_daily_total(&self, _callback: StepCallback) -> Result<(), StepError> {
            self.0.mark_notification_shown();
            Ok(())
        }
    }

    struct Harness {
        ctx: AppContext,
        clock: Arc<ManualClock>,
        events: Receiver<Message>,
        _dir: tempfile::TempDir,
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(7, 0, 0))
            .unwrap()
    }

    fn harness(steps: Arc<dyn StepSource>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let (sender, events) = crossbeam_channel::unbounded();
        let ctx = AppContext {
            store: AlarmStore::new(dir.path().join("alarms.toml")),
            config_path: dir.path().join("settings.toml"),
            shared: Arc::new(SharedState::new()),
            sender,
            steps,
            clock: clock.clone(),
        };
        Harness {
            ctx,
            clock,
            events,
            _dir: dir,
        }
    }

    fn alarm() -> Alarm {
        Alarm::new(7, 0, Weekday::Mon).unwrap()
    }

    fn kinds(events: &Receiver<Message>) -> Vec<MessageType> {
        events.try_iter().map(|m| m.kind).collect()
    }

    #[test_case(5, 100, 100 => 5 ; "nothing walked")]
    #[test_case(5, 100, 103 => 2 ; "some walked")]
    #[test_case(5, 100, 105 => 0 ; "exactly enough")]
    #[test_case(5, 100, 900 => 0 ; "floored at zero")]
    #[test_case(5, 100, 40 => 5 ; "count went backwards")]
    fn remaining(target: u32, starting: u64, current: u64) -> u32 {
        steps_remaining(target, starting, current)
    }

    #[test]
    fn remaining_never_increases_as_steps_go_up() {
        let mut last = u32::MAX;
        for current in 1000..1020 {
            let remaining = steps_remaining(5, 1000, current);
            assert!(remaining <= last);
            assert_eq!(remaining, 5u32.saturating_sub((current - 1000) as u32));
            last = remaining;
        }
    }

    #[test]
    fn walking_enough_dismisses() {
        let h = harness(Scripted::new([100, 100, 102, 106]));
        let config = Config::default();
        assert_eq!(DismissWorkflow::new(&h.ctx, &config).run(&alarm()), Ok(()));

        let sound = alarm().sound;
        assert_eq!(
            kinds(&h.events),
            vec![
                MessageType::AlarmDue {
                    steps: 5,
                    sound,
                    vibrate: false
                },
                MessageType::StepsUpdate { remaining: 5 },
                MessageType::StepsUpdate { remaining: 3 },
                MessageType::StepsUpdate { remaining: 0 },
                MessageType::Toast("Alarm dismissed".to_string()),
                MessageType::Dismiss,
            ]
        );
    }

    #[test]
    fn open_prompt_gets_no_toast() {
        let h = harness(Scripted::new([0, 10]));
        h.ctx.shared.set_prompt_open(true);
        let config = Config::default();
        DismissWorkflow::new(&h.ctx, &config).run(&alarm()).unwrap();
        let kinds = kinds(&h.events);
        assert!(!kinds.iter().any(|k| matches!(k, MessageType::Toast(_))));
        assert_eq!(kinds.last(), Some(&MessageType::Dismiss));
    }

    #[test]
    fn messages_carry_the_alarm_name() {
        let h = harness(Scripted::new([0, 10]));
        let config = Config {
            time_format: "%I:%M %p".to_string(),
            ..Config::default()
        };
        DismissWorkflow::new(&h.ctx, &config).run(&alarm()).unwrap();
        assert!(h.events.try_iter().all(|m| m.alarm_name == "07:00 AM"));
    }

    #[test]
    fn no_steps_after_prompt_shown_gives_up() {
        let h = harness(Scripted::new([50]));
        h.ctx.shared.mark_notification_shown();
        let config = Config::default();

        let result = DismissWorkflow::new(&h.ctx, &config).run(&alarm());
        assert_eq!(result, Err(DismissError::NoStepsDetected));

        let waited = h.clock.now() - start();
        assert!(waited > chrono::Duration::seconds(45));
        assert!(waited < chrono::Duration::seconds(90));
        let kinds = kinds(&h.events);
        assert_eq!(
            &kinds[kinds.len() - 2..],
            &[
                MessageType::Toast(DismissError::NoStepsDetected.to_string()),
                MessageType::Dismiss
            ]
        );
    }

    #[test]
    fn some_steps_but_not_enough_gives_up_later() {
        let h = harness(Scripted::new([50, 50, 52]));
        h.ctx.shared.mark_notification_shown();
        let config = Config::default();

        let result = DismissWorkflow::new(&h.ctx, &config).run(&alarm());
        assert_eq!(result, Err(DismissError::NotDismissedInTime));
        assert!(h.clock.now() - start() > chrono::Duration::seconds(90));
    }

    #[test]
    fn deadlines_follow_max_seconds_setting() {
        let h = harness(Scripted::new([50]));
        h.ctx.shared.mark_notification_shown();
        let config = Config {
            max_seconds_to_wait: Some(15.into()),
            ..Config::default()
        };
        let result = DismissWorkflow::new(&h.ctx, &config).run(&alarm());
        assert_eq!(result, Err(DismissError::NoStepsDetected));
        assert!(h.clock.now() - start() < chrono::Duration::seconds(30));
    }

    #[test]
    fn deadlines_never_start_without_the_prompt() {
        // ten simulated minutes of nothing, then the walk
        let polls = 10 * 60 * 2;
        let counts = std::iter::repeat(7).take(polls).chain([20]);
        let h = harness(Scripted::new(counts));
        let config = Config::default();

        assert_eq!(DismissWorkflow::new(&h.ctx, &config).run(&alarm()), Ok(()));
        assert!(h.clock.now() - start() > chrono::Duration::minutes(9));
    }

    #[test]
    fn missing_account_force_dismisses() {
        let h = harness(Arc::new(NoAccount));
        let config = Config::default();
        let result = DismissWorkflow::new(&h.ctx, &config).run(&alarm());
        assert_eq!(result, Err(DismissError::Steps(StepError::NoAccount)));
        let kinds = kinds(&h.events);
        assert!(matches!(kinds[0], MessageType::AlarmDue { .. }));
        assert_eq!(
            &kinds[1..],
            &[
                MessageType::Toast(StepError::NoAccount.to_string()),
                MessageType::Dismiss
            ]
        );
    }

    #[test]
    fn stop_request_interrupts() {
        let h = harness(Scripted::new([0]));
        h.ctx.shared.request_stop();
        let config = Config::default();
        let result = DismissWorkflow::new(&h.ctx, &config).run(&alarm());
        assert_eq!(result, Err(DismissError::Interrupted));
        assert_eq!(kinds(&h.events).last(), Some(&MessageType::Dismiss));
    }

    #[test]
    fn shown_flag_raised_during_a_run_is_cleared_afterwards() {
        let h = harness(Scripted::new([0]));
        let raises_then_fails = AppContext {
            steps: Arc::new(ShownThenFails(h.ctx.shared.clone())),
            ..h.ctx.clone()
        };
        let config = Config::default();
        let result = DismissWorkflow::new(&raises_then_fails, &config).run(&alarm());
        assert_eq!(result, Err(DismissError::Steps(StepError::Failed)));
        assert!(!h.ctx.shared.take_notification_shown());

        // the next alarm starts from a clean slate
        let walks = AppContext {
            steps: Scripted::new([0, 10]),
            ..h.ctx.clone()
        };
        assert_eq!(DismissWorkflow::new(&walks, &config).run(&alarm()), Ok(()));
        assert!(!h.ctx.shared.take_notification_shown());
    }

    fn short_fetch_timeout() -> Config {
        Config {
            step_fetch_timeout_ms: 20,
            ..Config::default()
        }
    }

    #[test]
    fn step_source_timeout_force_dismisses() {
        let h = harness(Arc::new(Hangs::default()));
        let result = DismissWorkflow::new(&h.ctx, &short_fetch_timeout()).run(&alarm());
        assert_eq!(result, Err(DismissError::Steps(StepError::Timeout)));

        let kinds = kinds(&h.events);
        assert!(matches!(kinds[0], MessageType::AlarmDue { .. }));
        assert_eq!(
            &kinds[1..],
            &[
                MessageType::Toast(StepError::Timeout.to_string()),
                MessageType::Dismiss
            ]
        );
    }

    #[test]
    fn failed_read_while_polling_force_dismisses() {
        let h = harness(Arc::new(AnswersOnce::default()));
        let result = DismissWorkflow::new(&h.ctx, &short_fetch_timeout()).run(&alarm());
        assert_eq!(result, Err(DismissError::Steps(StepError::Failed)));

        let kinds = kinds(&h.events);
        assert_eq!(
            &kinds[kinds.len() - 2..],
            &[
                MessageType::Toast(StepError::Failed.to_string()),
                MessageType::Dismiss
            ]
        );
        assert!(!kinds
            .iter()
            .any(|k| matches!(k, MessageType::StepsUpdate { .. })));
    }
}
