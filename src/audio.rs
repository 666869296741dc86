use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub name: &'static str,
    /// Zero is a rest.
    pub freq_hz: u32,
    pub duration_ms: u64,
}

impl Note {
    pub const fn new(name: &'static str, freq_hz: u32, duration_ms: u64) -> Self {
        Self {
            name,
            freq_hz,
            duration_ms,
        }
    }
}

pub const TWINKLE: &[Note] = &[
    Note::new("C4", 262, 500),
    Note::new("C4", 262, 500),
    Note::new("G4", 392, 500),
    Note::new("G4", 392, 500),
    Note::new("A4", 440, 500),
    Note::new("A4", 440, 500),
    Note::new("G4", 392, 1000),
    Note::new("F4", 349, 500),
    Note::new("F4", 349, 500),
    Note::new("E4", 330, 500),
    Note::new("E4", 330, 500),
    Note::new("D4", 294, 500),
    Note::new("D4", 294, 500),
    Note::new("C4", 262, 1000),
];

const NOTE_GAP: Duration = Duration::from_millis(20);

pub trait AudioOutput: Send + Sync {
    /// Starts one pass of `melody`. Does nothing if already playing.
    fn start(&self, melody: &[Note]);
    fn stop(&self);
    fn is_playing(&self) -> bool;
}

#[derive(Debug, Default)]
struct BuzzerState {
    playing: AtomicBool,
    generation: AtomicU64,
}

#[derive(Debug, Clone, Default)]
pub struct Buzzer {
    state: Arc<BuzzerState>,
}

impl Buzzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioOutput for Buzzer {
    fn start(&self, melody: &[Note]) {
        if self.state.playing.swap(true, Ordering::SeqCst) {
            return;
        }
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::clone(&self.state);
        let notes = melody.to_vec();
        info!(notes = notes.len(), "buzzer playing");

        tokio::spawn(async move {
            for note in notes {
                if state.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                debug!(note = note.name, freq_hz = note.freq_hz, "tone");
                sleep(Duration::from_millis(note.duration_ms)).await;
                sleep(NOTE_GAP).await;
            }
            if state.generation.load(Ordering::SeqCst) == generation {
                state.playing.store(false, Ordering::SeqCst);
                debug!("buzzer pass finished");
            }
        });
    }

    fn stop(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
        if self.state.playing.swap(false, Ordering::SeqCst) {
            info!("buzzer silenced");
        }
    }

    fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::SeqCst)
    }
}
