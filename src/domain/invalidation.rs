//! Cache invalidation messages exchanged over the message transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::EventId;

/// Published after a mutation so that caches outside this process can purge
/// stale entries derived from the event's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationEvent {
    /// Cache key that was evicted locally (e.g. `event:supplies:<id>`).
    pub key: String,
    /// Event whose derived aggregates are stale.
    pub event_id: EventId,
    /// When the mutation was observed.
    pub timestamp: DateTime<Utc>,
}

impl InvalidationEvent {
    /// Creates an invalidation for `key` stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, event_id: EventId) -> Self {
        Self {
            key: key.into(),
            event_id,
            timestamp: Utc::now(),
        }
    }

    /// Serializes the message into a broker payload.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "key": self.key,
            "eventId": self.event_id,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}
