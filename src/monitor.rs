use chrono::NaiveDateTime;
use log::{debug, info};

use crate::{alarm::Alarm, error::Result, store::AlarmStore};

/// finds the alarm that should go off at `now`, marks it as triggered and
/// re-arms alarms whose minute has passed
/// the scan stops at the first due alarm, later ones are neither fired nor
/// re-armed on this pass
pub fn find_due_alarm(store: &AlarmStore, now: NaiveDateTime) -> Result<Option<Alarm>> {
    let mut alarms = store.load();
    let mut changed = false;
    let mut due = None;

    for (i, alarm) in alarms.iter_mut().enumerate() {
        let matches = alarm.matches(now);
        if matches && alarm.active && !alarm.triggered {
            info!("alarm {i} at {} is due", alarm.time);
            alarm.triggered = true;
            changed = true;
            due = Some(alarm.clone());
            break;
        } else if !matches && alarm.triggered {
            debug!("re-arming alarm {i} at {}", alarm.time);
            alarm.triggered = false;
            changed = true;
        }
    }

    if changed {
        store.put_all(&alarms)?;
    }
    Ok(due)
}
