//! Event lookups and creation.

use std::sync::Arc;

use crate::domain::{Event, EventDraft, EventId, EventSummary, GroupId, UserId, UserProfile};
use crate::error::GatewayError;
use crate::persistence::Store;

/// Resolves events with their owner, type and groups.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    store: Arc<dyn Store>,
}

impl EventRegistry {
    /// Creates a registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Loads an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the event does not exist.
    pub async fn get(&self, id: EventId) -> Result<Event, GatewayError> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| GatewayError::not_found("event", id))
    }

    /// Loads an event and resolves its owner for display.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the event does not exist.
    pub async fn summary(&self, id: EventId) -> Result<EventSummary, GatewayError> {
        let event = self.get(id).await?;
        let mut summaries = self.summarize(vec![event]).await?;
        summaries
            .pop()
            .ok_or_else(|| GatewayError::Internal("summary lost its event".to_string()))
    }

    /// Creates an event owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if the draft is invalid or a
    /// group does not exist.
    pub async fn create_event(
        &self,
        owner: UserId,
        draft: EventDraft,
    ) -> Result<EventSummary, GatewayError> {
        let group_ids = draft.validate()?;
        let groups = self.store.find_groups(&group_ids).await?;
        if groups.len() != group_ids.len() {
            let missing: Vec<String> = group_ids
                .iter()
                .filter(|id| !groups.iter().any(|g| g.id == **id))
                .map(ToString::to_string)
                .collect();
            return Err(GatewayError::Validation(format!(
                "unknown groups: {}",
                missing.join(", ")
            )));
        }

        let event = Event {
            id: EventId::new(),
            title: draft.title.trim().to_string(),
            event_date: draft.event_date,
            owner_id: owner,
            event_type: draft.event_type,
            groups,
        };
        self.store.insert_event(&event).await?;
        tracing::info!(event_id = %event.id, event_type = %event.event_type, %owner, "event created");

        let mut summaries = self.summarize(vec![event]).await?;
        summaries
            .pop()
            .ok_or_else(|| GatewayError::Internal("summary lost its event".to_string()))
    }

    /// Lists the events `owner` created, by date.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    pub async fn list_owned(&self, owner: UserId) -> Result<Vec<EventSummary>, GatewayError> {
        let events = self.store.list_events_by_owner(owner).await?;
        self.summarize(events).await
    }

    /// Lists the events associated with `group`, by date.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    pub async fn list_for_group(&self, group: GroupId) -> Result<Vec<EventSummary>, GatewayError> {
        let events = self.store.list_events_by_group(group).await?;
        self.summarize(events).await
    }

    async fn summarize(&self, events: Vec<Event>) -> Result<Vec<EventSummary>, GatewayError> {
        let mut owners: Vec<UserId> = events.iter().map(|e| e.owner_id).collect();
        owners.sort_unstable();
        owners.dedup();
        let profiles = self.store.find_users(&owners).await?;

        Ok(events
            .into_iter()
            .map(|event| {
                let owner = profiles
                    .iter()
                    .find(|p| p.id == event.owner_id)
                    .cloned()
                    .unwrap_or_else(|| UserProfile {
                        id: event.owner_id,
                        name: String::new(),
                    });
                EventSummary::new(event, owner)
            })
            .collect())
    }
}
