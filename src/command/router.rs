use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::command::channel::{ChannelLink, InboundMessage};
use crate::command::payload::{Payload, decode_payload, decode_text};

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, payload: Payload) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    HandlerFailed,
    Unmatched,
}

#[derive(Default)]
pub struct CommandRouter {
    routes: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, topic: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let topic = topic.into();
        if self.routes.insert(topic.clone(), handler).is_some() {
            warn!(%topic, "replacing existing command handler");
        }
    }

    pub fn topics(&self) -> Vec<&str> {
        let mut topics = self.routes.keys().map(String::as_str).collect::<Vec<_>>();
        topics.sort_unstable();
        topics
    }

    /// Routes one message. Never fails: decode problems fall back to the
    /// raw text and handler errors or panics are logged.
    pub async fn dispatch(&self, topic: &[u8], message: &[u8]) -> DispatchOutcome {
        let topic = decode_text(topic).to_lossy();
        let payload = decode_payload(message);
        debug!(%topic, %payload, "routing message");

        let Some(handler) = self.routes.get(&topic) else {
            warn!(
                %topic,
                known = ?self.topics(),
                "no handler registered for topic"
            );
            return DispatchOutcome::Unmatched;
        };

        match AssertUnwindSafe(handler.handle(payload)).catch_unwind().await {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(err)) => {
                error!(%topic, "command handler failed: {err:#}");
                DispatchOutcome::HandlerFailed
            }
            Err(_) => {
                error!(%topic, "command handler panicked");
                DispatchOutcome::HandlerFailed
            }
        }
    }

    pub async fn run(self, link: ChannelLink) {
        let ChannelLink {
            mut inbound,
            mut connected,
        } = link;
        if !wait_connected(&mut connected).await {
            warn!("command channel closed before connecting");
            return;
        }
        info!(topics = ?self.topics(), "command router listening");
        self.receive_loop(&mut inbound).await;
        info!("command channel closed");
    }

    async fn receive_loop(&self, inbound: &mut mpsc::Receiver<InboundMessage>) {
        while let Some(message) = inbound.recv().await {
            self.dispatch(&message.topic, &message.payload).await;
        }
    }
}

async fn wait_connected(connected: &mut watch::Receiver<bool>) -> bool {
    connected.wait_for(|up| *up).await.is_ok()
}
