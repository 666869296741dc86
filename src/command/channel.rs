use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use crate::input::SimulatedLine;

const INBOUND_CAPACITY: usize = 32;
const SIMULATED_PRESS: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Vec<u8>,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}

pub struct ChannelLink {
    pub inbound: mpsc::Receiver<InboundMessage>,
    pub connected: watch::Receiver<bool>,
}

pub struct ConsolePublisher {
    out: Mutex<Stdout>,
}

impl ConsolePublisher {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsolePublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for ConsolePublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(format!("{topic} {payload}\n").as_bytes())
            .await
            .with_context(|| format!("failed to publish to {topic}"))?;
        out.flush().await.context("failed to flush stdout")?;
        debug!(topic, "published");
        Ok(())
    }
}

pub struct ConsoleButtons {
    pub stop: Arc<SimulatedLine>,
    pub next: Arc<SimulatedLine>,
}

#[derive(Debug, PartialEq, Eq)]
enum ConsoleLine {
    Blank,
    PressStop,
    PressNext,
    Message(InboundMessage),
}

fn parse_console_line(line: &str) -> ConsoleLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleLine::Blank;
    }
    match trimmed {
        "!stop" => return ConsoleLine::PressStop,
        "!next" => return ConsoleLine::PressNext,
        _ => {}
    }
    let (topic, payload) = match trimmed.split_once(char::is_whitespace) {
        Some((topic, payload)) => (topic, payload.trim_start()),
        None => (trimmed, ""),
    };
    ConsoleLine::Message(InboundMessage::new(topic, payload))
}

pub fn spawn_console(buttons: ConsoleButtons) -> ChannelLink {
    let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
    let (connected_tx, connected) = watch::channel(false);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let _ = connected_tx.send(true);
        info!("console transport connected");
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!("console read failed: {err}");
                    break;
                }
            };
            match parse_console_line(&line) {
                ConsoleLine::Blank => {}
                ConsoleLine::PressStop => {
                    let line = Arc::clone(&buttons.stop);
                    tokio::spawn(async move { line.pulse(SIMULATED_PRESS).await });
                }
                ConsoleLine::PressNext => {
                    let line = Arc::clone(&buttons.next);
                    tokio::spawn(async move { line.pulse(SIMULATED_PRESS).await });
                }
                ConsoleLine::Message(message) => {
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = connected_tx.send(false);
        info!("console transport closed");
    });

    ChannelLink { inbound, connected }
}
