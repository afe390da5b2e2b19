//! Authorization rules as pure decision functions.
//!
//! Each rule takes the actor and the facts about the resource that the
//! caller has already loaded and returns a [`Decision`]. Nothing here
//! touches storage.

use super::event::{Event, EventType};
use super::ids::UserId;
use super::supply::Contribution;
use crate::error::GatewayError;

/// Result of an authorization rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The actor may proceed.
    Allow,
    /// The actor may not proceed.
    Deny(&'static str),
}

impl Decision {
    /// Converts a denial into [`GatewayError::Forbidden`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Forbidden`] carrying the denial reason.
    pub fn into_result(self) -> Result<(), GatewayError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(GatewayError::Forbidden(reason.to_string())),
        }
    }

    /// Returns `true` for [`Decision::Allow`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Only the event owner may run the secret-friend draw.
#[must_use]
pub fn can_draw(actor: UserId, event: &Event) -> Decision {
    if event.owner_id == actor {
        Decision::Allow
    } else {
        Decision::Deny("only the event owner can run the draw")
    }
}

/// Only the event owner may replace the participant list.
#[must_use]
pub fn can_manage_participants(actor: UserId, event: &Event) -> Decision {
    if event.owner_id == actor {
        Decision::Allow
    } else {
        Decision::Deny("only the event owner can manage participants")
    }
}

/// Event owner or the admin of any associated group may manage supplies.
#[must_use]
pub fn can_manage_supplies(actor: UserId, event: &Event) -> Decision {
    if event.owner_id == actor || event.groups.iter().any(|g| g.owner_id == actor) {
        Decision::Allow
    } else {
        Decision::Deny("only the event owner or a group admin can manage supplies")
    }
}

/// Event owner or a registered participant may pledge.
#[must_use]
pub fn can_contribute(actor: UserId, event: &Event, is_participant: bool) -> Decision {
    if event.owner_id == actor || is_participant {
        Decision::Allow
    } else {
        Decision::Deny("only event participants can contribute")
    }
}

/// Participants suggest gifts in `SECRET_FRIEND` events; elsewhere only
/// the event owner does.
#[must_use]
pub fn can_suggest_gift(actor: UserId, event: &Event, is_participant: bool) -> Decision {
    match event.event_type {
        EventType::SecretFriend if is_participant => Decision::Allow,
        EventType::SecretFriend => {
            Decision::Deny("only event participants can suggest gifts for a secret friend")
        }
        _ if event.owner_id == actor => Decision::Allow,
        _ => Decision::Deny("only the event owner can add gifts"),
    }
}

/// Only the original contributor may edit or withdraw a pledge.
#[must_use]
pub fn can_modify_contribution(actor: UserId, contribution: &Contribution) -> Decision {
    if contribution.user_id == actor {
        Decision::Allow
    } else {
        Decision::Deny("only the contributor can modify this contribution")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::event::Group;
    use crate::domain::ids::{ContributionId, EventId, GroupId, SupplyId};

    fn event(owner: UserId, group_admin: UserId) -> Event {
        Event {
            id: EventId::new(),
            title: "Potluck".to_string(),
            event_date: Utc::now(),
            owner_id: owner,
            event_type: EventType::Potluck,
            groups: vec![Group {
                id: GroupId::new(),
                name: "Friends".to_string(),
                description: String::new(),
                owner_id: group_admin,
            }],
        }
    }

    #[test]
    fn gift_rules_depend_on_event_type() {
        let owner = UserId::new();
        let guest = UserId::new();
        let potluck = event(owner, UserId::new());
        assert!(can_suggest_gift(owner, &potluck, true).is_allowed());
        assert!(!can_suggest_gift(guest, &potluck, true).is_allowed());

        let secret = Event {
            event_type: EventType::SecretFriend,
            ..potluck
        };
        assert!(can_suggest_gift(guest, &secret, true).is_allowed());
        assert!(!can_suggest_gift(owner, &secret, false).is_allowed());
    }

    #[test]
    fn draw_is_owner_only() {
        let owner = UserId::new();
        let e = event(owner, UserId::new());
        assert!(can_draw(owner, &e).is_allowed());
        assert!(!can_draw(UserId::new(), &e).is_allowed());
    }

    #[test]
    fn group_admin_manages_supplies() {
        let owner = UserId::new();
        let admin = UserId::new();
        let e = event(owner, admin);
        assert!(can_manage_supplies(owner, &e).is_allowed());
        assert!(can_manage_supplies(admin, &e).is_allowed());
        assert!(!can_manage_supplies(UserId::new(), &e).is_allowed());
        assert!(!can_manage_participants(admin, &e).is_allowed());
    }

    #[test]
    fn owner_contributes_without_registration() {
        let owner = UserId::new();
        let e = event(owner, UserId::new());
        assert!(can_contribute(owner, &e, false).is_allowed());
        assert!(can_contribute(UserId::new(), &e, true).is_allowed());
        assert!(!can_contribute(UserId::new(), &e, false).is_allowed());
    }

    #[test]
    fn contribution_owner_only() {
        let author = UserId::new();
        let now = Utc::now();
        let c = Contribution {
            id: ContributionId::new(),
            supply_id: SupplyId::new(),
            user_id: author,
            quantity_committed: 1,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(can_modify_contribution(author, &c), Decision::Allow);
        let denied = can_modify_contribution(UserId::new(), &c).into_result();
        assert!(matches!(denied, Err(GatewayError::Forbidden(_))));
    }
}
