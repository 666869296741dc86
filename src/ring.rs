use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::alarm::model::AlarmId;
use crate::audio::{AudioOutput, Note};
use crate::input::DebouncedInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingState {
    Idle,
    Ringing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingOutcome {
    pub alarm_id: AlarmId,
    pub reason: StopReason,
    pub elapsed: Duration,
    pub passes: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    #[error("a ring session is already active")]
    Busy,
}

#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    pub max_duration: Duration,
    pub poll_interval: Duration,
    /// Pause after stopping so the same press is not read again.
    pub cooldown: Duration,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            cooldown: Duration::from_secs(2),
        }
    }
}

struct RingSession {
    alarm_id: AlarmId,
    started: Instant,
    stop_requested: bool,
    passes: u32,
}

pub struct RingController {
    audio: Arc<dyn AudioOutput>,
    stop_input: DebouncedInput,
    melody: Vec<Note>,
    config: RingConfig,
    state: Mutex<RingState>,
}

impl RingController {
    pub fn new(
        audio: Arc<dyn AudioOutput>,
        stop_input: DebouncedInput,
        melody: &[Note],
        config: RingConfig,
    ) -> Self {
        Self {
            audio,
            stop_input,
            melody: melody.to_vec(),
            config,
            state: Mutex::new(RingState::Idle),
        }
    }

    pub fn state(&self) -> RingState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ringing(&self) -> bool {
        self.state() != RingState::Idle
    }

    pub async fn ring(&self, alarm_id: AlarmId) -> Result<RingOutcome, RingError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != RingState::Idle {
                return Err(RingError::Busy);
            }
            *state = RingState::Ringing;
        }
        let guard = SessionGuard { controller: self };

        let mut session = RingSession {
            alarm_id,
            started: Instant::now(),
            stop_requested: false,
            passes: 1,
        };
        info!(alarm_id, "ringing");
        self.audio.start(&self.melody);

        let reason = loop {
            if self.stop_input.confirm_pressed().await {
                session.stop_requested = true;
                break StopReason::Manual;
            }
            if session.started.elapsed() >= self.config.max_duration {
                break StopReason::Timeout;
            }
            if !self.audio.is_playing() && !session.stop_requested {
                session.passes += 1;
                self.audio.start(&self.melody);
            }
            sleep(self.config.poll_interval).await;
        };

        let elapsed = session.started.elapsed();
        self.audio.stop();
        self.set_state(RingState::Stopped);
        match reason {
            StopReason::Manual => info!(alarm_id = session.alarm_id, ?elapsed, "stopped by button"),
            StopReason::Timeout => info!(alarm_id = session.alarm_id, ?elapsed, "ring timed out"),
        }

        sleep(self.config.cooldown).await;
        drop(guard);

        Ok(RingOutcome {
            alarm_id: session.alarm_id,
            reason,
            elapsed,
            passes: session.passes,
        })
    }

    fn set_state(&self, next: RingState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

// Silences audio and resets to idle however the session ends.
struct SessionGuard<'a> {
    controller: &'a RingController,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.controller.audio.is_playing() {
            warn!("ring session ended with audio active; silencing");
            self.controller.audio.stop();
        }
        self.controller.set_state(RingState::Idle);
    }
}
