//! Database row types and their conversion into domain entities.
//!
//! Quantities are stored as `INTEGER`; conversion back to `u32` fails loudly
//! rather than wrapping if a row was written by something else.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Contribution, Event, EventType, Gift, Group, Match, Participant, Supply, UserProfile,
};
use crate::error::GatewayError;

/// A row of the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event id.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Event date.
    pub event_date: DateTime<Utc>,
    /// Owner.
    pub owner_id: Uuid,
    /// Canonical event type name.
    pub event_type: String,
}

impl EventRow {
    /// Builds the domain event with the given groups attached.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] if the stored event type is
    /// unknown.
    pub fn into_event(self, groups: Vec<Group>) -> Result<Event, GatewayError> {
        let event_type: EventType = self.event_type.parse().map_err(GatewayError::Persistence)?;
        Ok(Event {
            id: self.id.into(),
            title: self.title,
            event_date: self.event_date,
            owner_id: self.owner_id.into(),
            event_type,
            groups,
        })
    }
}

/// A row of `user_groups`, optionally tagged with the event it was joined on.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupRow {
    /// Event the group was loaded for (only set by event joins).
    #[sqlx(default)]
    pub event_id: Option<Uuid>,
    /// Group id.
    pub id: Uuid,
    /// Name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Group admin.
    pub owner_id: Uuid,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            description: row.description,
            owner_id: row.owner_id.into(),
        }
    }
}

/// A row of `users`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// User id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
        }
    }
}

/// A row of `event_participants`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParticipantRow {
    /// Registration id.
    pub id: Uuid,
    /// Event.
    pub event_id: Uuid,
    /// User.
    pub user_id: Uuid,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: row.id.into(),
            event_id: row.event_id.into(),
            user_id: row.user_id.into(),
        }
    }
}

/// A row of `secret_friend_matches`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MatchRow {
    /// Match id.
    pub id: Uuid,
    /// Draw scope.
    pub group_id: Uuid,
    /// Giver.
    pub giver_id: Uuid,
    /// Receiver.
    pub receiver_id: Uuid,
    /// When the draw was stored.
    pub created_at: DateTime<Utc>,
}

impl From<MatchRow> for Match {
    fn from(row: MatchRow) -> Self {
        Self {
            id: row.id.into(),
            scope: row.group_id.into(),
            giver_id: row.giver_id.into(),
            receiver_id: row.receiver_id.into(),
            created_at: row.created_at,
        }
    }
}

/// A row of `event_supplies`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplyRow {
    /// Supply id.
    pub id: Uuid,
    /// Owning event.
    pub event_id: Uuid,
    /// Item name.
    pub item_name: String,
    /// Description.
    pub description: Option<String>,
    /// Quantity needed.
    pub quantity_needed: i32,
    /// Unit.
    pub unit: String,
    /// Image URL.
    pub image_url: Option<String>,
    /// Shop URL.
    pub url: Option<String>,
    /// Created.
    pub created_at: DateTime<Utc>,
    /// Updated.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SupplyRow> for Supply {
    type Error = GatewayError;

    fn try_from(row: SupplyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            event_id: row.event_id.into(),
            item_name: row.item_name,
            description: row.description,
            quantity_needed: to_quantity(row.quantity_needed)?,
            unit: row.unit,
            image_url: row.image_url,
            url: row.url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of `gifts` with its event links aggregated.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GiftRow {
    /// Gift id.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Shop links.
    pub urls: Vec<String>,
    /// Author.
    pub user_id: Uuid,
    /// Linked events, in link order.
    pub event_ids: Vec<Uuid>,
    /// Created.
    pub created_at: DateTime<Utc>,
}

impl From<GiftRow> for Gift {
    fn from(row: GiftRow) -> Self {
        Self {
            id: row.id.into(),
            title: row.title,
            urls: row.urls,
            user_id: row.user_id.into(),
            event_ids: row.event_ids.into_iter().map(Into::into).collect(),
            created_at: row.created_at,
        }
    }
}

/// A row of `supply_contributions`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContributionRow {
    /// Contribution id.
    pub id: Uuid,
    /// Supply.
    pub supply_id: Uuid,
    /// Contributor.
    pub user_id: Uuid,
    /// Pledged quantity.
    pub quantity_committed: i32,
    /// Note.
    pub notes: Option<String>,
    /// Created.
    pub created_at: DateTime<Utc>,
    /// Updated.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ContributionRow> for Contribution {
    type Error = GatewayError;

    fn try_from(row: ContributionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            supply_id: row.supply_id.into(),
            user_id: row.user_id.into(),
            quantity_committed: to_quantity(row.quantity_committed)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Converts a stored quantity into its domain representation.
///
/// # Errors
///
/// Returns [`GatewayError::Persistence`] for negative values.
pub fn to_quantity(value: i32) -> Result<u32, GatewayError> {
    u32::try_from(value)
        .map_err(|_| GatewayError::Persistence(format!("negative quantity in storage: {value}")))
}

/// Converts a domain quantity into its stored representation.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] if the value does not fit a
/// PostgreSQL `INTEGER`.
pub fn to_column(value: u32) -> Result<i32, GatewayError> {
    i32::try_from(value)
        .map_err(|_| GatewayError::Validation(format!("quantity {value} is too large")))
}
