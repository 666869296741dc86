use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Weekday;
use tracing::{info, warn};

use crate::alarm::model::{
    Alarm, AlarmError, AlarmId, AlarmRecord, check_time, load_alarm_list, parse_weekday,
    save_alarm_list,
};

// Never hold the guard across an `.await`.
pub type SharedStore = Arc<Mutex<AlarmStore>>;

pub fn shared(store: AlarmStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

pub fn lock(store: &SharedStore) -> MutexGuard<'_, AlarmStore> {
    store.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        warn!("alarm store lock was poisoned; continuing with last known list");
        poisoned.into_inner()
    })
}

#[derive(Debug)]
pub struct AlarmStore {
    path: PathBuf,
    alarms: Vec<Alarm>,
    next_id: AlarmId,
}

impl AlarmStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            alarms: Vec::new(),
            next_id: 1,
        };
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&mut self) {
        self.alarms.clear();
        self.next_id = 1;

        let records = match load_alarm_list(&self.path) {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    "no usable alarm file, starting empty: {err:#}"
                );
                return;
            }
        };

        let keep_ids = match records.iter().filter_map(|record| record.id).max() {
            None => true,
            Some(max) => match max.checked_add(1) {
                Some(next) => {
                    self.next_id = next;
                    true
                }
                None => {
                    warn!(path = %self.path.display(), "stored alarm ids exhausted, renumbering");
                    false
                }
            },
        };

        for mut record in records {
            if !keep_ids {
                record.id = None;
            }
            match self.alarm_from_record(record) {
                Ok(alarm) => self.alarms.push(alarm),
                Err(err) => warn!(path = %self.path.display(), "skipping stored alarm: {err}"),
            }
        }
        info!(count = self.alarms.len(), "loaded alarms");
    }

    /// Writes the full list. Returns whether the write succeeded.
    pub fn save(&self) -> bool {
        match save_alarm_list(&self.path, &self.alarms) {
            Ok(()) => true,
            Err(err) => {
                warn!("alarm list not persisted: {err:#}");
                false
            }
        }
    }

    pub fn add(
        &mut self,
        hour: i64,
        minute: i64,
        weekdays: Vec<Weekday>,
    ) -> Result<usize, AlarmError> {
        self.add_with_state(hour, minute, weekdays, true)
    }

    pub fn add_with_state(
        &mut self,
        hour: i64,
        minute: i64,
        weekdays: Vec<Weekday>,
        enabled: bool,
    ) -> Result<usize, AlarmError> {
        check_time(hour, minute)?;
        let alarm = Alarm::new(self.allocate_id()?, hour, minute, weekdays, enabled)?;
        info!(id = alarm.id, "added alarm {}", alarm.summary());
        self.alarms.push(alarm);
        self.save();
        Ok(self.alarms.len() - 1)
    }

    pub fn delete(&mut self, index: usize) -> Option<Alarm> {
        if index >= self.alarms.len() {
            return None;
        }
        let removed = self.alarms.remove(index);
        info!(id = removed.id, index, "deleted alarm {}", removed.summary());
        self.save();
        Some(removed)
    }

    pub fn delete_by_id(&mut self, id: AlarmId) -> Option<Alarm> {
        let index = self.index_of(id)?;
        self.delete(index)
    }

    pub fn get_all(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    pub fn index_of(&self, id: AlarmId) -> Option<usize> {
        self.alarms.iter().position(|alarm| alarm.id == id)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn disable_single_shot(&mut self, index: usize) -> bool {
        let Some(alarm) = self.alarms.get_mut(index) else {
            return false;
        };
        if !alarm.is_single_shot() || !alarm.enabled {
            return false;
        }
        alarm.enabled = false;
        info!(id = alarm.id, "disabled single-shot alarm {}", alarm.summary());
        self.save();
        true
    }

    pub fn disable_single_shot_by_id(&mut self, id: AlarmId) -> bool {
        match self.index_of(id) {
            Some(index) => self.disable_single_shot(index),
            None => false,
        }
    }

    fn allocate_id(&mut self) -> Result<AlarmId, AlarmError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(AlarmError::IdsExhausted)?;
        Ok(id)
    }

    fn alarm_from_record(&mut self, record: AlarmRecord) -> Result<Alarm, AlarmError> {
        let weekdays = record
            .weekdays
            .iter()
            .map(|day| parse_weekday(day))
            .collect::<Result<Vec<_>, _>>()?;
        check_time(record.hour, record.minute)?;
        let id = match record.id {
            Some(id) if self.get(id).is_none() => id,
            _ => self.allocate_id()?,
        };
        Alarm::new(id, record.hour, record.minute, weekdays, record.enabled)
    }
}
