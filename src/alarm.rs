use std::{fmt, path::PathBuf};

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::Config;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// represents one alarm in the store
/// only the hour and minute of `time` matter, seconds are always zero
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Alarm {
    #[serde(with = "toml_datetime_compat")]
    pub time: NaiveTime,
    #[serde(default = "crate::config::always_true")]
    pub active: bool,
    pub days: DaysOfWeek,
    /// set by the monitor while the current minute still matches,
    /// cleared once it doesn't so the alarm can fire on its next day
    #[serde(default)]
    pub triggered: bool,
    #[serde(default)]
    pub sound: Sound,
    /// only used for display
    #[serde(default)]
    pub expanded: bool,
}

impl Alarm {
    /// new alarm for `hour:minute`, enabled for the weekday of `today`
    #[must_use]
    pub fn new(hour: u32, minute: u32, today: Weekday) -> Option<Self> {
        Some(Self {
            time: NaiveTime::from_hms_opt(hour, minute, 0)?,
            active: true,
            days: DaysOfWeek::only(today),
            triggered: false,
            sound: Sound::default(),
            expanded: false,
        })
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.time.hour()
    }

    #[must_use]
    pub fn minute(&self) -> u32 {
        self.time.minute()
    }

    /// two alarms are the same alarm if they go off at the same hour and minute
    #[must_use]
    pub fn same_time(&self, other: &Self) -> bool {
        self.hour() == other.hour() && self.minute() == other.minute()
    }

    /// true if the wall clock is inside this alarm's minute on one of its days
    #[must_use]
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        self.hour() == now.hour()
            && self.minute() == now.minute()
            && self.days.contains(now.weekday())
    }

    #[must_use]
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.active && !self.triggered && self.matches(now)
    }

    #[must_use]
    pub fn name(&self, time_format: &str) -> String {
        self.time.format(time_format).to_string()
    }
}

/// set of weekdays, stored on disk as a list of day names
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    #[must_use]
    pub fn only(day: Weekday) -> Self {
        Self(1 << day.num_days_from_monday())
    }

    #[must_use]
    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !(1 << day.num_days_from_monday());
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEK.into_iter().filter(move |day| self.contains(*day))
    }
}

impl From<Vec<Weekday>> for DaysOfWeek {
    fn from(days: Vec<Weekday>) -> Self {
        let mut set = Self::default();
        days.into_iter().for_each(|day| set.insert(day));
        set
    }
}

impl From<DaysOfWeek> for Vec<Weekday> {
    fn from(days: DaysOfWeek) -> Self {
        days.iter().collect()
    }
}

impl fmt::Display for DaysOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "never");
        }
        let days: Vec<String> = self.iter().map(|day| day.to_string()).collect();
        write!(f, "{}", days.join(" "))
    }
}

/// the tone an alarm plays, a display name plus the file it comes from
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Sound {
    pub name: String,
    pub path: PathBuf,
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path.file_name() {
            Some(file) => write!(f, "{}:{}", self.name, file.to_string_lossy()),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Default for Sound {
    fn default() -> Self {
        Self {
            name: "Default Alarm Sound".to_string(),
            path: Config::sounds_path().join("alarm.mp3"),
        }
    }
}

impl Sound {
    #[must_use]
    pub const fn new(name: String, path: PathBuf) -> Self {
        Self { name, path }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }
}
