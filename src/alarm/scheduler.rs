use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::alarm::model::AlarmId;
use crate::alarm::store::{self, SharedStore};
use crate::clock::WallClock;
use crate::ring::RingController;
use crate::state::SharedUiState;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub fired: usize,
    pub disabled: usize,
}

#[derive(Debug, Default)]
struct MinuteMarks {
    seen: Option<NaiveDateTime>,
    evaluated: Option<NaiveDateTime>,
}

pub struct AlarmScheduler {
    store: SharedStore,
    ring: Arc<RingController>,
    clock: Arc<dyn WallClock>,
    ui: Option<SharedUiState>,
    marks: Mutex<MinuteMarks>,
}

impl AlarmScheduler {
    pub fn new(store: SharedStore, ring: Arc<RingController>, clock: Arc<dyn WallClock>) -> Self {
        Self {
            store,
            ring,
            clock,
            ui: None,
            marks: Mutex::new(MinuteMarks::default()),
        }
    }

    pub fn with_ui_state(mut self, ui: SharedUiState) -> Self {
        self.ui = Some(ui);
        self
    }

    pub async fn run(self: Arc<Self>) {
        info!("alarm scheduler started");
        let mut ticker = interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let outcome = self.tick().await;
            if outcome.fired > 0 {
                debug!(?outcome, "scheduler tick");
            }
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let now = self.clock.now();
        if !self.should_evaluate(now) {
            return outcome;
        }

        let (hour, min, today) = (now.hour(), now.minute(), now.weekday());
        let due: Vec<AlarmId> = store::lock(&self.store)
            .get_all()
            .iter()
            .filter(|alarm| alarm.matches(hour, min, today))
            .map(|alarm| alarm.id)
            .collect();

        for id in due {
            // Re-read: the alarm may have been deleted or disabled while an
            // earlier one was ringing.
            let Some(alarm) = store::lock(&self.store)
                .get(id)
                .filter(|alarm| alarm.enabled)
                .cloned()
            else {
                continue;
            };

            info!(id, "alarm due: {}", alarm.summary());
            match self.ring.ring(id).await {
                Ok(result) => {
                    outcome.fired += 1;
                    if let Some(ui) = &self.ui {
                        ui.record_ring(&alarm, result.reason, self.clock.now());
                    }
                }
                Err(err) => {
                    error!(id, "could not ring alarm: {err}");
                    continue;
                }
            }

            if alarm.is_single_shot() && store::lock(&self.store).disable_single_shot_by_id(id) {
                outcome.disabled += 1;
            }
        }
        outcome
    }

    // A minute is evaluated on its second zero, or on the first tick after the
    // boundary when second zero was never observed. At most once either way.
    fn should_evaluate(&self, now: NaiveDateTime) -> bool {
        let minute = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        let crossed = marks.seen.is_some_and(|seen| seen < minute);
        marks.seen = Some(minute);
        if !(now.second() == 0 || crossed) || marks.evaluated == Some(minute) {
            return false;
        }
        marks.evaluated = Some(minute);
        true
    }
}
