use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Weekday;
use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::{
    alarm::{Alarm, Sound},
    error::{Error, Result},
};

/// alarms under ordinal keys `"0"`, `"1"`, ... in one TOML document
/// the list model and the alarm service both rewrite the whole store, there is no locking
#[derive(Debug, Clone)]
pub struct AlarmStore {
    path: PathBuf,
}

impl AlarmStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<toml::Table> {
        match fs::read_to_string(&self.path) {
            Ok(document) => toml::from_str(&document).map_err(|e| Error::parse(&self.path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(toml::Table::new()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn write_table(&self, table: &toml::Table) -> Result<()> {
        let document = toml::to_string(table)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        // each writer gets its own temp file, the rename replaces the document in one go
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(document.as_bytes())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::io(&self.path, e.error))?;
        Ok(())
    }

    /// alarms go through a document string so `time` stays a native TOML time
    fn to_entry(&self, alarm: &Alarm) -> Result<toml::Value> {
        let entry = toml::from_str::<toml::Table>(&toml::to_string(alarm)?)
            .map_err(|e| Error::parse(&self.path, e))?;
        Ok(toml::Value::Table(entry))
    }

    fn from_entry(entry: &toml::Value) -> std::result::Result<Alarm, String> {
        let table = entry.as_table().ok_or("not a table")?;
        let document = toml::to_string(table).map_err(|e| e.to_string())?;
        toml::from_str(&document).map_err(|e| e.to_string())
    }

    /// every alarm from key `"0"` up to the first missing or malformed key
    #[must_use]
    pub fn load(&self) -> Vec<Alarm> {
        let table = match self.read_table() {
            Ok(table) => table,
            Err(e) => {
                warn!("{e}, treating alarm store as empty");
                return vec![];
            }
        };
        let mut alarms = vec![];
        for i in 0.. {
            let Some(entry) = table.get(&i.to_string()) else {
                break;
            };
            match Self::from_entry(entry) {
                Ok(alarm) => alarms.push(alarm),
                Err(e) => {
                    warn!("dropping alarm {i} and everything after it: {e}");
                    break;
                }
            }
        }
        alarms
    }

    /// writes `alarms` to keys `0..alarms.len()`, other keys are left as they are
    pub fn put_all(&self, alarms: &[Alarm]) -> Result<()> {
        let mut table = self.read_table().unwrap_or_else(|e| {
            warn!("{e}, overwriting alarm store");
            toml::Table::new()
        });
        for (i, alarm) in alarms.iter().enumerate() {
            table.insert(i.to_string(), self.to_entry(alarm)?);
        }
        debug!("saving {} alarms to {}", alarms.len(), self.path.display());
        self.write_table(&table)
    }

    /// removes every key
    pub fn clear(&self) -> Result<()> {
        self.write_table(&toml::Table::new())
    }
}

/// the user facing list of alarms, an in memory copy of the store
#[derive(Debug)]
pub struct AlarmList {
    store: AlarmStore,
    alarms: Vec<Alarm>,
}

impl AlarmList {
    #[must_use]
    pub fn open(store: AlarmStore) -> Self {
        let alarms = store.load();
        Self { store, alarms }
    }

    #[must_use]
    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Alarm> {
        self.alarms.get_mut(index).ok_or(Error::NoSuchAlarm(index))
    }

    /// adds the alarm unless one already goes off at the same hour and minute
    /// returns false for a duplicate
    pub fn add(&mut self, mut alarm: Alarm) -> Result<bool> {
        if self.alarms.iter().any(|existing| existing.same_time(&alarm)) {
            return Ok(false);
        }
        // opened so the days can be picked right away
        alarm.expanded = true;
        self.alarms.push(alarm);
        self.save()?;
        Ok(true)
    }

    /// empties the store and writes the remaining alarms back so the keys stay contiguous
    pub fn delete(&mut self, index: usize) -> Result<Alarm> {
        if index >= self.alarms.len() {
            return Err(Error::NoSuchAlarm(index));
        }
        self.store.clear()?;
        let removed = self.alarms.remove(index);
        self.save()?;
        Ok(removed)
    }

    /// writes the list, keeping whatever `triggered` flag the service last stored
    pub fn save(&mut self) -> Result<()> {
        let stored = self.store.load();
        for alarm in &mut self.alarms {
            if let Some(current) = stored.iter().find(|current| current.same_time(alarm)) {
                alarm.triggered = current.triggered;
            }
        }
        self.store.put_all(&self.alarms)
    }

    pub fn set_active(&mut self, index: usize, active: bool) -> Result<()> {
        self.get_mut(index)?.active = active;
        self.save()
    }

    pub fn set_day(&mut self, index: usize, day: Weekday, enabled: bool) -> Result<()> {
        let alarm = self.get_mut(index)?;
        if enabled {
            alarm.days.insert(day);
        } else {
            alarm.days.remove(day);
        }
        self.save()
    }

    pub fn update_sound(&mut self, index: usize, sound: Sound) -> Result<()> {
        self.get_mut(index)?.sound = sound;
        self.save()
    }

    pub fn toggle_expanded(&mut self, index: usize) -> Result<()> {
        let alarm = self.get_mut(index)?;
        alarm.expanded = !alarm.expanded;
        self.save()
    }
}
