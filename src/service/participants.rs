//! Participant registrations for events.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::authz;
use crate::domain::participant::roster;
use crate::domain::{EventId, Participant, ParticipantList, ParticipantView, UserId};
use crate::error::GatewayError;
use crate::persistence::Store;

use super::EventRegistry;

/// Manages who is registered for an event.
#[derive(Debug, Clone)]
pub struct ParticipantDirectory {
    store: Arc<dyn Store>,
    events: EventRegistry,
}

impl ParticipantDirectory {
    /// Creates a directory over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, events: EventRegistry) -> Self {
        Self { store, events }
    }

    /// Replaces the participants of `event_id` with `requested` plus the
    /// event owner.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing event,
    /// [`GatewayError::Forbidden`] unless `actor` owns the event, and
    /// [`GatewayError::Validation`] if a requested user is unknown.
    pub async fn replace(
        &self,
        event_id: EventId,
        actor: UserId,
        requested: &[UserId],
    ) -> Result<ParticipantList, GatewayError> {
        let event = self.events.get(event_id).await?;
        authz::can_manage_participants(actor, &event).into_result()?;

        let users = roster(event.owner_id, requested);
        let known = self.names(&users).await?;
        let unknown: Vec<String> = users
            .iter()
            .filter(|u| !known.contains_key(u))
            .map(ToString::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(GatewayError::Validation(format!(
                "unknown users: {}",
                unknown.join(", ")
            )));
        }

        let participants = self.store.replace_participants(event_id, &users).await?;
        tracing::info!(%event_id, count = participants.len(), "participants replaced");
        Ok(Self::to_list(event_id, participants, &known))
    }

    /// Lists the participants of `event_id` with their names.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing event.
    pub async fn list(&self, event_id: EventId) -> Result<ParticipantList, GatewayError> {
        self.events.get(event_id).await?;
        let participants = self.store.list_participants(event_id).await?;
        let users: Vec<UserId> = participants.iter().map(|p| p.user_id).collect();
        let names = self.names(&users).await?;
        Ok(Self::to_list(event_id, participants, &names))
    }

    /// Returns `true` if `user` is registered for `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    pub async fn exists(&self, event_id: EventId, user: UserId) -> Result<bool, GatewayError> {
        self.store.participant_exists(event_id, user).await
    }

    /// Distinct registered user ids, in registration order.
    pub(crate) async fn user_ids(&self, event_id: EventId) -> Result<Vec<UserId>, GatewayError> {
        let mut users: Vec<UserId> = Vec::new();
        for participant in self.store.list_participants(event_id).await? {
            if !users.contains(&participant.user_id) {
                users.push(participant.user_id);
            }
        }
        Ok(users)
    }

    /// Display names of the given users that exist.
    pub(crate) async fn names(
        &self,
        users: &[UserId],
    ) -> Result<HashMap<UserId, String>, GatewayError> {
        Ok(self
            .store
            .find_users(users)
            .await?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect())
    }

    fn to_list(
        event_id: EventId,
        participants: Vec<Participant>,
        names: &HashMap<UserId, String>,
    ) -> ParticipantList {
        ParticipantList {
            event_id,
            participants: participants
                .into_iter()
                .map(|p| ParticipantView {
                    id: p.id,
                    name: names.get(&p.user_id).cloned().unwrap_or_default(),
                    user_id: p.user_id,
                })
                .collect(),
        }
    }
}
