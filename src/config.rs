use std::{
    ops::Not,
    path::{Path, PathBuf},
    time::Duration,
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MINIMUM_STEPS_TO_DISMISS: u32 = 5;
pub const DEFAULT_SECONDS_TO_WAIT: u64 = 45;
pub const MIN_SECONDS_TO_WAIT: u64 = 15;
pub const MAX_SECONDS_TO_WAIT: u64 = 120;

const APP_NAME: &str = "walking_alarm";

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Not for Theme {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

/// number settings may be written by hand as `"12"` instead of `12`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NumberSetting {
    Number(i64),
    Text(String),
}

impl NumberSetting {
    fn parse(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl From<i64> for NumberSetting {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub steps_to_dismiss: Option<NumberSetting>,
    pub max_seconds_to_wait: Option<NumberSetting>,
    pub vibrate: bool,
    pub theme: Theme,
    pub time_format: String,
    pub poll_interval_ms: u64,
    pub step_poll_interval_ms: u64,
    pub step_fetch_timeout_ms: u64,
    /// pedometer file, no file means there is no step account to read from
    pub step_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steps_to_dismiss: Some(NumberSetting::Number(i64::from(MINIMUM_STEPS_TO_DISMISS))),
            max_seconds_to_wait: Some(NumberSetting::Number(DEFAULT_SECONDS_TO_WAIT as i64)),
            vibrate: false,
            theme: Theme::Dark,
            time_format: "%H:%M".to_string(),
            poll_interval_ms: 3000,
            step_poll_interval_ms: 500,
            step_fetch_timeout_ms: 10_000,
            step_file: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// a missing file is not an error, it just means nothing was configured yet
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(config) => toml::from_str(&config).map_err(|e| Error::parse(path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("{e}, using default settings");
            Self::default()
        })
    }

    /// writes fresh settings without reading the old file, so a broken one can be replaced
    /// an existing file is only overwritten with `force`, returns whether anything was written
    pub fn init(path: &Path, force: bool) -> Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }
        Self {
            step_file: Some(Self::default_step_file()),
            ..Self::default()
        }
        .save(path)?;
        Ok(true)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config = toml::to_string(self)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        std::fs::write(path, config).map_err(|e| Error::io(path, e))
    }

    /// steps needed to stop the alarm, never below the minimum
    #[must_use]
    pub fn steps_to_dismiss(&self) -> u32 {
        let steps = self
            .steps_to_dismiss
            .as_ref()
            .and_then(NumberSetting::parse)
            .unwrap_or(i64::from(MINIMUM_STEPS_TO_DISMISS));
        u32::try_from(steps)
            .unwrap_or(MINIMUM_STEPS_TO_DISMISS)
            .max(MINIMUM_STEPS_TO_DISMISS)
    }

    /// window after the prompt is shown in which at least one step must show up
    /// unset means the default, unreadable input drops to the minimum
    #[must_use]
    pub fn seconds_to_wait(&self) -> u64 {
        let seconds = match &self.max_seconds_to_wait {
            None => DEFAULT_SECONDS_TO_WAIT as i64,
            Some(setting) => setting.parse().unwrap_or(MIN_SECONDS_TO_WAIT as i64),
        };
        u64::try_from(seconds)
            .unwrap_or(MIN_SECONDS_TO_WAIT)
            .clamp(MIN_SECONDS_TO_WAIT, MAX_SECONDS_TO_WAIT)
    }

    #[must_use]
    pub fn no_steps_window(&self) -> Duration {
        Duration::from_secs(self.seconds_to_wait())
    }

    /// window for walking all the steps once some have been seen
    #[must_use]
    pub fn partial_steps_window(&self) -> Duration {
        Duration::from_secs(self.seconds_to_wait() * 2)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn step_poll_interval(&self) -> Duration {
        Duration::from_millis(self.step_poll_interval_ms)
    }

    #[must_use]
    pub const fn step_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.step_fetch_timeout_ms)
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", APP_NAME)
    }

    #[must_use]
    pub fn config_path() -> PathBuf {
        let mut path = Self::project_dirs()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.config_dir().to_path_buf());
        path.push("settings.toml");
        path
    }

    #[must_use]
    pub fn alarms_path() -> PathBuf {
        let mut path = Self::project_dirs()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf());
        path.push("alarms.toml");
        path
    }

    #[must_use]
    pub fn sounds_path() -> PathBuf {
        let mut path = Self::project_dirs()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf());
        path.push("sounds");
        path
    }

    #[must_use]
    pub fn default_step_file() -> PathBuf {
        let mut path = Self::project_dirs()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf());
        path.push("steps.toml");
        path
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().exists()
    }
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}
