//! Gift suggestions and the per-viewer gift lists built from them.

use std::sync::Arc;

use crate::cache::CacheCoordinator;
use crate::domain::{
    Event, EventId, EventType, Gift, GiftDraft, GiftList, GiftView, UserId, authz,
};
use crate::error::GatewayError;
use crate::persistence::Store;

use super::{EventRegistry, MatchEngine, ParticipantDirectory};

/// Stores gift suggestions and answers "what could I give".
///
/// Lists are cached per event and viewer because a `SECRET_FRIEND` viewer
/// only sees the suggestions of the participant they drew.
#[derive(Debug, Clone)]
pub struct GiftCatalog {
    store: Arc<dyn Store>,
    events: EventRegistry,
    participants: ParticipantDirectory,
    matches: MatchEngine,
    cache: CacheCoordinator,
}

impl GiftCatalog {
    /// Creates a catalog.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        events: EventRegistry,
        participants: ParticipantDirectory,
        matches: MatchEngine,
        cache: CacheCoordinator,
    ) -> Self {
        Self {
            store,
            events,
            participants,
            matches,
            cache,
        }
    }

    /// Suggests a gift on behalf of `actor` for every event in the draft.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for an invalid draft or unknown
    /// events, and [`GatewayError::Forbidden`] if `actor` may not add gifts
    /// to one of the events.
    pub async fn create_gift(&self, actor: UserId, draft: GiftDraft) -> Result<Gift, GatewayError> {
        let event_ids = draft.validate()?;

        let mut events: Vec<Event> = Vec::with_capacity(event_ids.len());
        let mut missing: Vec<String> = Vec::new();
        for id in &event_ids {
            match self.store.find_event(*id).await? {
                Some(event) => events.push(event),
                None => missing.push(id.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(GatewayError::Validation(format!(
                "unknown events: {}",
                missing.join(", ")
            )));
        }

        for event in &events {
            let is_participant = self.participants.exists(event.id, actor).await?;
            authz::can_suggest_gift(actor, event, is_participant).into_result()?;
        }

        let gift = draft.into_gift(actor, event_ids);
        self.store.insert_gift(&gift).await?;
        tracing::info!(gift_id = %gift.id, %actor, events = gift.event_ids.len(), "gift suggested");

        for event_id in &gift.event_ids {
            let _publish = self
                .cache
                .invalidate_prefix(&CacheCoordinator::gifts_prefix(*event_id), *event_id)
                .await;
        }
        Ok(gift)
    }

    /// Lists the gifts of `event_id` visible to `viewer`, through the cache.
    ///
    /// In a `SECRET_FRIEND` event only the suggestions of the viewer's
    /// receiver are listed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing event,
    /// [`GatewayError::Validation`] for a `SECRET_FRIEND` event without a
    /// group, and [`GatewayError::Forbidden`] if the viewer has not been
    /// assigned a receiver.
    pub async fn list_for_event(
        &self,
        event_id: EventId,
        viewer: UserId,
    ) -> Result<GiftList, GatewayError> {
        let key = CacheCoordinator::gifts_key(event_id, viewer);
        self.cache
            .read_through(&key, || self.load(event_id, viewer))
            .await
    }

    async fn load(&self, event_id: EventId, viewer: UserId) -> Result<GiftList, GatewayError> {
        let event = self.events.get(event_id).await?;

        let (receiver, gifts) = if event.event_type == EventType::SecretFriend {
            if event.groups.is_empty() {
                return Err(GatewayError::Validation(
                    "the event has no group, its gifts cannot be listed".to_string(),
                ));
            }
            let assignment = match self.matches.assignment(event_id, viewer).await {
                Ok(assignment) => assignment,
                Err(GatewayError::NotFound { .. }) => {
                    return Err(GatewayError::Forbidden(
                        "no secret friend is assigned to you in this event".to_string(),
                    ));
                }
                Err(e) => return Err(e),
            };
            let gifts = self
                .store
                .list_gifts(event_id, Some(assignment.receiver.id))
                .await?;
            (Some(assignment.receiver), gifts)
        } else {
            (None, self.store.list_gifts(event_id, None).await?)
        };

        let authors: Vec<UserId> = gifts.iter().map(|g| g.user_id).collect();
        let names = self.participants.names(&authors).await?;
        Ok(GiftList {
            event_id,
            event_title: event.title,
            event_type: event.event_type,
            receiver,
            gifts: gifts
                .into_iter()
                .map(|gift| GiftView {
                    user_name: names.get(&gift.user_id).cloned().unwrap_or_default(),
                    id: gift.id,
                    title: gift.title,
                    urls: gift.urls,
                    user_id: gift.user_id,
                    created_at: gift.created_at,
                })
                .collect(),
        })
    }
}
