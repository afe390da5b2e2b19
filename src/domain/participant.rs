//! Event participant registrations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{EventId, ParticipantId, UserId};

/// A user registered for an event. `(event_id, user_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Registration row identifier.
    pub id: ParticipantId,
    /// Event the user is registered for.
    pub event_id: EventId,
    /// Registered user.
    pub user_id: UserId,
}

impl Participant {
    /// Creates a new registration with a fresh id.
    #[must_use]
    pub fn new(event_id: EventId, user_id: UserId) -> Self {
        Self {
            id: ParticipantId::new(),
            event_id,
            user_id,
        }
    }
}

/// A participant with the user's display name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    /// Registration identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Registered user.
    pub user_id: UserId,
}

/// Participants of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantList {
    /// Event identifier.
    pub event_id: EventId,
    /// Registered participants.
    pub participants: Vec<ParticipantView>,
}

/// Builds the participant roster for an event: the requested users in order,
/// duplicates dropped, with the owner appended if not already present.
#[must_use]
pub fn roster(owner_id: UserId, requested: &[UserId]) -> Vec<UserId> {
    let mut users: Vec<UserId> = Vec::with_capacity(requested.len().saturating_add(1));
    for user in requested {
        if !users.contains(user) {
            users.push(*user);
        }
    }
    if !users.contains(&owner_id) {
        users.push(owner_id);
    }
    users
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_always_contains_owner_once() {
        let owner = UserId::new();
        let a = UserId::new();
        let users = roster(owner, &[a, owner, a]);
        assert_eq!(users, vec![a, owner]);

        let users = roster(owner, &[a]);
        assert_eq!(users, vec![a, owner]);
    }

    #[test]
    fn roster_of_nobody_is_the_owner() {
        let owner = UserId::new();
        assert_eq!(roster(owner, &[]), vec![owner]);
    }
}
