//! Events, the groups they belong to, and the user profiles they reference.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{EventId, GroupId, UserId};
use crate::error::GatewayError;

/// Kind of social event. Fixed at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Plain gathering with an owner-curated gift list.
    #[default]
    Regular,
    /// Participants are paired at random to exchange gifts.
    SecretFriend,
    /// Gift registry: guests pledge items from a list.
    Registry,
    /// Shared meal: guests pledge dishes and drinks.
    Potluck,
}

impl EventType {
    /// Returns the canonical upper-case name stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "REGULAR",
            Self::SecretFriend => "SECRET_FRIEND",
            Self::Registry => "REGISTRY",
            Self::Potluck => "POTLUCK",
        }
    }

    /// Returns `true` for event types that keep a supply ledger.
    #[must_use]
    pub const fn supports_supplies(self) -> bool {
        matches!(self, Self::Registry | Self::Potluck)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGULAR" => Ok(Self::Regular),
            "SECRET_FRIEND" => Ok(Self::SecretFriend),
            "REGISTRY" => Ok(Self::Registry),
            "POTLUCK" => Ok(Self::Potluck),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// A group of users. Its owner acts as group admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group identifier.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Group administrator.
    pub owner_id: UserId,
}

/// Minimal view of a user as needed by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
}

/// A social event with its associated groups loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Title shown to participants.
    pub title: String,
    /// When the event takes place.
    pub event_date: DateTime<Utc>,
    /// User who created the event.
    pub owner_id: UserId,
    /// Event kind.
    pub event_type: EventType,
    /// Associated groups, primary group first.
    pub groups: Vec<Group>,
}

impl Event {
    /// Returns the group matches are recorded under, if any.
    #[must_use]
    pub fn primary_group(&self) -> Option<&Group> {
        self.groups.first()
    }
}

/// Fields of a new event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    /// Title; must not be blank.
    pub title: String,
    /// When the event takes place.
    pub event_date: DateTime<Utc>,
    /// Event kind, `REGULAR` when omitted.
    #[serde(default)]
    pub event_type: EventType,
    /// Associated groups; the first one is the primary group.
    pub group_ids: Vec<GroupId>,
}

impl EventDraft {
    /// Checks field-level rules and returns the group ids without
    /// duplicates, order preserved.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for a blank title or an empty
    /// group list.
    pub fn validate(&self) -> Result<Vec<GroupId>, GatewayError> {
        if self.title.trim().is_empty() {
            return Err(GatewayError::Validation("title must not be blank".to_string()));
        }
        let mut ids: Vec<GroupId> = Vec::with_capacity(self.group_ids.len());
        for id in &self.group_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            return Err(GatewayError::Validation(
                "an event needs at least one group".to_string(),
            ));
        }
        Ok(ids)
    }
}

/// Event as returned to clients: groups inlined, owner resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Event identifier.
    pub id: EventId,
    /// Title.
    pub title: String,
    /// When the event takes place.
    pub event_date: DateTime<Utc>,
    /// Event kind.
    pub event_type: EventType,
    /// Creator.
    pub owner: UserProfile,
    /// Associated groups, primary first.
    pub groups: Vec<Group>,
}

impl EventSummary {
    /// Builds the summary of `event` with its resolved owner profile.
    #[must_use]
    pub fn new(event: Event, owner: UserProfile) -> Self {
        Self {
            id: event.id,
            title: event.title,
            event_date: event.event_date,
            event_type: event.event_type,
            owner,
            groups: event.groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_str() {
        for ty in [
            EventType::Regular,
            EventType::SecretFriend,
            EventType::Registry,
            EventType::Potluck,
        ] {
            assert_eq!(ty.as_str().parse::<EventType>(), Ok(ty));
        }
        assert!("BIRTHDAY".parse::<EventType>().is_err());
    }

    #[test]
    fn only_registry_and_potluck_keep_supplies() {
        assert!(EventType::Registry.supports_supplies());
        assert!(EventType::Potluck.supports_supplies());
        assert!(!EventType::SecretFriend.supports_supplies());
        assert!(!EventType::Regular.supports_supplies());
    }

    #[test]
    fn draft_dedupes_groups_and_requires_one() {
        let group = GroupId::new();
        let mut draft = EventDraft {
            title: "Holiday swap".to_string(),
            event_date: Utc::now(),
            event_type: EventType::SecretFriend,
            group_ids: vec![group, group],
        };
        assert_eq!(draft.validate().ok(), Some(vec![group]));

        draft.group_ids.clear();
        assert!(draft.validate().is_err());

        draft.group_ids.push(group);
        draft.title = "  ".to_string();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn serde_uses_screaming_case() {
        let json = serde_json::to_string(&EventType::SecretFriend).unwrap_or_default();
        assert_eq!(json, "\"SECRET_FRIEND\"");
    }
}
