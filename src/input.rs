use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

pub trait DigitalLine: Send + Sync {
    /// Raw level; `true` means the line is pulled low (pressed).
    fn is_low(&self) -> bool;
}

#[derive(Debug)]
pub struct SimulatedLine {
    low: AtomicBool,
}

impl SimulatedLine {
    pub fn new() -> Self {
        Self {
            low: AtomicBool::new(false),
        }
    }

    pub fn press(&self) {
        self.low.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.low.store(false, Ordering::SeqCst);
    }

    pub async fn pulse(&self, hold: Duration) {
        self.press();
        sleep(hold).await;
        self.release();
    }
}

impl Default for SimulatedLine {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalLine for SimulatedLine {
    fn is_low(&self) -> bool {
        self.low.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DebounceConfig {
    pub window: u32,
    pub sample_interval: Duration,
    pub poll_interval: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: 20,
            sample_interval: Duration::from_millis(1),
            poll_interval: Duration::from_millis(30),
        }
    }
}

#[derive(Debug)]
struct DebounceState {
    last_level: bool,
    stable_count: u32,
}

impl DebounceState {
    fn new(level: bool) -> Self {
        Self {
            last_level: level,
            stable_count: 0,
        }
    }

    fn observe(&mut self, level: bool) {
        if level == self.last_level {
            self.stable_count += 1;
        } else {
            self.last_level = level;
            self.stable_count = 0;
        }
    }
}

pub struct DebouncedInput {
    name: &'static str,
    line: Arc<dyn DigitalLine>,
    config: DebounceConfig,
    stable_pressed: AtomicBool,
}

impl DebouncedInput {
    pub fn new(name: &'static str, line: Arc<dyn DigitalLine>, config: DebounceConfig) -> Self {
        Self {
            name,
            line,
            config,
            stable_pressed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_active(&self) -> bool {
        self.line.is_low()
    }

    pub fn last_stable_pressed(&self) -> bool {
        self.stable_pressed.load(Ordering::SeqCst)
    }

    /// Samples the line until `window` consecutive samples agree and returns
    /// that level (`true` = pressed). Worst case when the line is quiet is
    /// `window` sample intervals.
    pub async fn wait_for_stable(&self, window: u32) -> bool {
        let mut state = DebounceState::new(self.line.is_low());
        while state.stable_count < window {
            state.observe(self.line.is_low());
            sleep(self.config.sample_interval).await;
        }
        self.stable_pressed.store(state.last_level, Ordering::SeqCst);
        state.last_level
    }

    pub async fn confirm_pressed(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.wait_for_stable(self.config.window).await
    }

    pub async fn wait_press(&self) {
        loop {
            if self.confirm_pressed().await {
                debug!(input = self.name, "press confirmed");
                return;
            }
            sleep(self.config.poll_interval).await;
        }
    }

    // Release uses the same window as press.
    pub async fn wait_release(&self) {
        loop {
            if !self.is_active() && !self.wait_for_stable(self.config.window).await {
                debug!(input = self.name, "release confirmed");
                return;
            }
            sleep(self.config.poll_interval).await;
        }
    }
}
