//! Message transport used for invalidation signaling.
//!
//! [`MessageBroker`] is the publish-only view the services depend on:
//! fire-and-forget, no delivery acknowledgement. [`EventBus`] is the
//! in-process implementation, a [`tokio::sync::broadcast`] channel that
//! the [`crate::cache::InvalidationListener`] subscribes to.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

/// A message as carried by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    /// Routing topic (e.g. `"cache.invalidate"`).
    pub topic: String,
    /// JSON payload.
    pub payload: serde_json::Value,
}

/// Failure to hand a message to the transport.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The transport could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    /// The transport refused the message.
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Publish side of an at-least-once message transport.
#[async_trait]
pub trait MessageBroker: Send + Sync + fmt::Debug {
    /// Hands `payload` to the transport under `topic`.
    ///
    /// # Errors
    ///
    /// Returns a [`BrokerError`] if the transport did not accept the message.
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), BrokerError>;
}

/// Broadcast bus for [`BrokerMessage`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest messages are
/// dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BrokerMessage>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends a message to all subscribers.
    ///
    /// Returns the number of receivers that received the message.
    /// If there are no active receivers, the message is silently dropped.
    pub fn send(&self, message: BrokerMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BrokerMessage> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl MessageBroker for EventBus {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), BrokerError> {
        let delivered = self.send(BrokerMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
        });
        tracing::trace!(topic, delivered, "message published on in-process bus");
        Ok(())
    }
}
