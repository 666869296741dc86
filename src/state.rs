use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::alarm::model::Alarm;
use crate::ring::StopReason;

pub type SharedUiState = Arc<UiState>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LastRing {
    pub alarm: String,
    pub reason: &'static str,
    pub at: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UiSnapshot {
    pub address: String,
    pub cursor: usize,
    pub last_ring: Option<LastRing>,
}

#[derive(Debug, Default)]
pub struct UiState {
    inner: Mutex<UiSnapshot>,
}

impl UiState {
    pub fn new(address: impl Into<String>) -> SharedUiState {
        Arc::new(Self {
            inner: Mutex::new(UiSnapshot {
                address: address.into(),
                ..UiSnapshot::default()
            }),
        })
    }

    pub fn snapshot(&self) -> UiSnapshot {
        self.lock().clone()
    }

    /// Cursor clamped to a list of `len` alarms; `None` when the list is empty.
    pub fn cursor_for(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let mut inner = self.lock();
        if inner.cursor >= len {
            inner.cursor = 0;
        }
        Some(inner.cursor)
    }

    pub fn advance_cursor(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let mut inner = self.lock();
        inner.cursor = (inner.cursor + 1) % len;
        Some(inner.cursor)
    }

    pub fn record_ring(&self, alarm: &Alarm, reason: StopReason, at: NaiveDateTime) {
        self.lock().last_ring = Some(LastRing {
            alarm: alarm.summary(),
            reason: match reason {
                StopReason::Manual => "manual",
                StopReason::Timeout => "timeout",
            },
            at: at.format("%Y-%m-%d %H:%M:%S").to_string(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, UiSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn cursor_wraps_and_clamps() {
        let ui = UiState::new("127.0.0.1");
        assert_eq!(ui.cursor_for(0), None);
        assert_eq!(ui.advance_cursor(0), None);

        assert_eq!(ui.advance_cursor(3), Some(1));
        assert_eq!(ui.advance_cursor(3), Some(2));
        assert_eq!(ui.advance_cursor(3), Some(0));

        ui.advance_cursor(3);
        ui.advance_cursor(3);
        // List shrank under the cursor.
        assert_eq!(ui.cursor_for(2), Some(0));
    }

    #[test]
    fn records_last_ring() {
        let ui = UiState::new("10.0.0.2");
        let alarm = Alarm::new(1, 6, 45, vec![], true).expect("valid");
        let at = NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|d| d.and_hms_opt(6, 45, 30))
            .expect("valid");
        ui.record_ring(&alarm, StopReason::Timeout, at);

        let snapshot = ui.snapshot();
        assert_eq!(snapshot.address, "10.0.0.2");
        assert_eq!(
            snapshot.last_ring,
            Some(LastRing {
                alarm: "06:45 Once".to_string(),
                reason: "timeout",
                at: "2026-10-19 06:45:30".to_string(),
            })
        );
    }
}
