//! Pub/sub transport seam.
//!
//! The broadcaster and the client layer talk to [`PubSub`] rather than a
//! provider SDK, so the whole delivery path runs against [`InMemoryPubSub`]
//! in tests. The in-memory implementation keeps one broadcast channel per
//! topic, created on first subscribe.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

/// One event as delivered on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub channel: String,
    pub event: String,
    pub data: serde_json::Value,
}

pub trait PubSub: Send + Sync {
    /// Push an event to everyone currently subscribed to `channel`.
    fn publish(&self, channel: &str, event: &str, data: serde_json::Value)
        -> Result<(), TransportError>;

    /// Open a subscription to `channel`. Events published after this call
    /// are observable on the returned receiver.
    fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<ChannelEvent>, TransportError>;

    /// Tear down the topic bookkeeping for `channel`. Receivers already
    /// handed out simply stop getting events.
    fn unsubscribe(&self, channel: &str);
}

pub struct InMemoryPubSub {
    topics: Mutex<HashMap<String, broadcast::Sender<ChannelEvent>>>,
    buffer: usize,
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self { topics: Mutex::new(HashMap::new()), buffer: 64 }
    }

    /// Number of live topics, for leak assertions in tests.
    pub fn topic_count(&self) -> usize {
        self.topics.lock().unwrap().len()
    }
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub for InMemoryPubSub {
    fn publish(
        &self,
        channel: &str,
        event: &str,
        data: serde_json::Value,
    ) -> Result<(), TransportError> {
        let topics = self.topics.lock().unwrap();
        if let Some(tx) = topics.get(channel) {
            // Nobody listening is not an error.
            let _ = tx.send(ChannelEvent {
                channel: channel.to_owned(),
                event: event.to_owned(),
                data,
            });
        }
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<ChannelEvent>, TransportError> {
        let mut topics = self.topics.lock().unwrap();
        let tx = topics
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(self.buffer).0);
        Ok(tx.subscribe())
    }

    fn unsubscribe(&self, channel: &str) {
        self.topics.lock().unwrap().remove(channel);
    }
}
