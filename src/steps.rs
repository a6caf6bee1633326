use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use chrono::NaiveDate;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::Config,
    error::{Error as StoreError, Result as StoreResult},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("no step counting account is set up")]
    NoAccount,
    #[error("couldn't find current steps in time")]
    Timeout,
    #[error("couldn't read current steps")]
    Failed,
}

/// handed to a [`StepSource`], completing it answers the request
#[derive(Debug)]
pub struct StepCallback {
    reply: Sender<u64>,
}

impl StepCallback {
    /// `None` means nothing was recorded today, which counts as zero steps
    pub fn complete(self, steps: Option<u64>) {
        // the requester may have given up already
        let _ = self.reply.try_send(steps.unwrap_or(0));
    }
}

pub trait StepSource: Send + Sync {
    /// ask for today's total, the callback may be completed from any thread
    /// dropping the callback without completing it reports a failed read
    fn request_daily_total(&self, callback: StepCallback) -> Result<(), StepError>;
}

/// today's total from `source`, waiting at most `timeout` for the answer
/// a late reply lands in a channel nobody reads anymore
pub fn fetch_steps(source: &dyn StepSource, timeout: Duration) -> Result<u64, StepError> {
    let (reply, answer) = bounded(1);
    source.request_daily_total(StepCallback { reply })?;
    match answer.recv_timeout(timeout) {
        Ok(steps) => {
            debug!("{steps} steps today");
            Ok(steps)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!("step source didn't answer within {timeout:?}");
            Err(StepError::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => Err(StepError::Failed),
    }
}

/// what a pedometer bridge writes: the day and the steps walked on it
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DailySteps {
    #[serde(with = "toml_datetime_compat")]
    pub date: NaiveDate,
    pub steps: u64,
}

/// step source backed by a small TOML file that something else keeps up to date
#[derive(Debug, Clone)]
pub struct PedometerFile {
    path: Option<PathBuf>,
}

impl PedometerFile {
    /// `None` behaves like a user who never signed in
    #[must_use]
    pub const fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn read(path: &Path) -> StoreResult<Option<DailySteps>> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .map(Some)
                .map_err(|e| StoreError::parse(path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// adds `steps` to the total for `today`, starting over on a new day
    pub fn record(path: &Path, today: NaiveDate, steps: u64) -> StoreResult<DailySteps> {
        let total = match Self::read(path)? {
            Some(daily) if daily.date == today => daily.steps + steps,
            _ => steps,
        };
        let daily = DailySteps {
            date: today,
            steps: total,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        std::fs::write(path, toml::to_string(&daily)?).map_err(|e| StoreError::io(path, e))?;
        Ok(daily)
    }

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

impl StepSource for PedometerFile {
    fn request_daily_total(&self, callback: StepCallback) -> Result<(), StepError> {
        let path = self.path.clone().ok_or(StepError::NoAccount)?;
        thread::spawn(move || match Self::read(&path) {
            Ok(Some(daily)) if daily.date == Self::today() => callback.complete(Some(daily.steps)),
            Ok(_) => callback.complete(None),
            Err(e) => warn!("{e}"),
        });
        Ok(())
    }
}

/// pedometer file named by the settings, looked up again on every request
/// so a changed `step_file` applies without restarting the service
#[derive(Debug, Clone)]
pub struct SettingsPedometer {
    config_path: PathBuf,
}

impl SettingsPedometer {
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }
}

impl StepSource for SettingsPedometer {
    fn request_daily_total(&self, callback: StepCallback) -> Result<(), StepError> {
        let config = Config::load_or_default(&self.config_path);
        PedometerFile::new(config.step_file).request_daily_total(callback)
    }
}
