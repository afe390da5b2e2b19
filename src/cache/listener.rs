//! Consumer side of cache invalidation.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::{CacheError, CacheStore};
use crate::config::InvalidationSettings;
use crate::domain::{BrokerMessage, EventBus, InvalidationEvent};

/// Purges every cache namespace derived from an event when an
/// [`InvalidationEvent`] arrives on the bus.
///
/// For an event `E` and each configured namespace `ns`, every key starting
/// with `ns:E` is removed, in addition to the key named in the message.
#[derive(Debug, Clone)]
pub struct InvalidationListener {
    cache: Arc<dyn CacheStore>,
    topic: String,
    namespaces: Vec<String>,
}

impl InvalidationListener {
    /// Creates a listener for the topic and namespaces in `settings`.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>, settings: &InvalidationSettings) -> Self {
        Self {
            cache,
            topic: settings.topic.clone(),
            namespaces: settings.namespaces.clone(),
        }
    }

    /// Applies one message. Returns the number of keys purged; messages on
    /// other topics or with an unreadable payload purge nothing.
    ///
    /// A failed eviction of the named key is logged and the namespace purge
    /// still runs.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if a namespace purge fails.
    pub async fn handle(&self, message: &BrokerMessage) -> Result<u64, CacheError> {
        if message.topic != self.topic {
            return Ok(0);
        }
        let event = match serde_json::from_value::<InvalidationEvent>(message.payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed invalidation payload");
                return Ok(0);
            }
        };

        if let Err(e) = self.cache.delete(&event.key).await {
            tracing::warn!(key = %event.key, error = %e, "cache key eviction failed");
        }
        let mut purged = 0;
        for namespace in &self.namespaces {
            purged += self
                .cache
                .delete_prefix(&format!("{namespace}:{}", event.event_id))
                .await?;
        }
        tracing::debug!(event_id = %event.event_id, key = %event.key, purged, "cache invalidated");
        Ok(purged)
    }

    /// Subscribes to `bus` and handles messages until `shutdown` flips to
    /// `true` or the bus closes.
    #[must_use]
    pub fn spawn(self, bus: &EventBus, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    message = rx.recv() => {
                        match message {
                            Ok(message) => {
                                if let Err(e) = self.handle(&message).await {
                                    tracing::warn!(error = %e, "cache purge failed");
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!(lagged = n, "invalidation listener lagged behind bus");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
            tracing::debug!("invalidation listener stopped");
        })
    }
}
