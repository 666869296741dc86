use chrono::{Local, NaiveDateTime};

/// Source of local wall-clock time for the scheduler.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<NaiveDateTime>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().expect("clock lock") = now;
    }
}

#[cfg(test)]
impl WallClock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock lock")
    }
}
