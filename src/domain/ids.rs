//! Type-safe identifiers.
//!
//! Every entity id is a newtype wrapper around [`uuid::Uuid`] (v4) so that,
//! say, a supply id cannot be passed where a contribution id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user (owned by the external identity service).
    UserId
);
entity_id!(
    /// Identifier of a group; also the scope under which matches are recorded.
    GroupId
);
entity_id!(
    /// Identifier of a social event.
    EventId
);
entity_id!(
    /// Identifier of a participant registration row.
    ParticipantId
);
entity_id!(
    /// Identifier of a single giver → receiver match.
    MatchId
);
entity_id!(
    /// Identifier of a supply item requested for an event.
    SupplyId
);
entity_id!(
    /// Identifier of a user's pledge toward a supply.
    ContributionId
);
entity_id!(
    /// Identifier of a gift suggestion.
    GiftId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = SupplyId::new().to_string();
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn serializes_transparently() {
        let uuid = uuid::Uuid::new_v4();
        let id = UserId::from_uuid(uuid);
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn from_uuid_round_trip() {
        let uuid = uuid::Uuid::new_v4();
        let id = GroupId::from(uuid);
        assert_eq!(*id.as_uuid(), uuid);
        assert_eq!(uuid::Uuid::from(id), uuid);
    }
}
