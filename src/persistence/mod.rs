//! Persistence layer: the authoritative store behind every service.
//!
//! [`Store`] is the create/find/save/remove surface the services depend on.
//! Two implementations exist: [`MemoryStore`] (tests and database-less
//! runs) and [`PostgresStore`] (`sqlx::PgPool`). Both enforce the two
//! invariants that cannot be checked safely in application code:
//!
//! - a draw scope accepts matches only once (`insert_matches` is
//!   all-or-nothing and unique on `(scope, giver)`);
//! - a supply's pledged total is read, checked and written inside one
//!   critical section (`commit_contribution`).

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{
    Commitment, Contribution, ContributionId, Event, EventId, Gift, Group, GroupId, Match,
    Participant, Supply, SupplyId, UserId, UserProfile,
};
use crate::error::GatewayError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Cap check run by [`Store::commit_contribution`] while the supply is
/// locked. Receives the supply and the pledged total of every other
/// contribution to it.
pub type CommitCheck<'a> =
    &'a (dyn Fn(&Supply, u64) -> Result<Commitment, GatewayError> + Send + Sync);

/// Message used when a draw scope already holds matches.
pub const DRAW_ALREADY_PERFORMED: &str = "the secret-friend draw has already been performed";

/// Authoritative storage for events, participants, matches and the ledger.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Loads an event with its groups.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn find_event(&self, id: EventId) -> Result<Option<Event>, GatewayError>;

    /// Inserts a new event and its group associations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn insert_event(&self, event: &Event) -> Result<(), GatewayError>;

    /// Lists events created by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn list_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>, GatewayError>;

    /// Lists events associated with `group`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn list_events_by_group(&self, group: GroupId) -> Result<Vec<Event>, GatewayError>;

    /// Loads the groups among `ids` that exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn find_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>, GatewayError>;

    /// Loads the user profiles among `ids` that exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, GatewayError>;

    /// Atomically replaces the participants of `event` with `users`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn replace_participants(
        &self,
        event: EventId,
        users: &[UserId],
    ) -> Result<Vec<Participant>, GatewayError>;

    /// Lists participants of `event` in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn list_participants(&self, event: EventId) -> Result<Vec<Participant>, GatewayError>;

    /// Returns `true` if `user` is registered for `event`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn participant_exists(&self, event: EventId, user: UserId)
    -> Result<bool, GatewayError>;

    /// Returns `true` if any of `givers` already has a match in `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn matches_exist(&self, scope: GroupId, givers: &[UserId]) -> Result<bool, GatewayError>;

    /// Stores a complete draw. Either every match is stored or none is.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] with [`DRAW_ALREADY_PERFORMED`]
    /// if a giver already has a match in the scope, or
    /// [`GatewayError::Persistence`] on storage failure.
    async fn insert_matches(&self, matches: &[Match]) -> Result<(), GatewayError>;

    /// Lists the matches recorded in `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn list_matches(&self, scope: GroupId) -> Result<Vec<Match>, GatewayError>;

    /// Inserts a new supply.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn insert_supply(&self, supply: &Supply) -> Result<(), GatewayError>;

    /// Overwrites an existing supply.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the supply vanished, or
    /// [`GatewayError::Persistence`] on storage failure.
    async fn update_supply(&self, supply: &Supply) -> Result<(), GatewayError>;

    /// Loads a supply.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn find_supply(&self, id: SupplyId) -> Result<Option<Supply>, GatewayError>;

    /// Deletes a supply and, by cascade, its contributions. Returns the
    /// number of contributions removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn delete_supply(&self, id: SupplyId) -> Result<u64, GatewayError>;

    /// Lists an event's supplies, each with its contributions.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn list_supplies_with_contributions(
        &self,
        event: EventId,
    ) -> Result<Vec<(Supply, Vec<Contribution>)>, GatewayError>;

    /// Loads a contribution.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn find_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<Contribution>, GatewayError>;

    /// Lists contributions to a supply in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn list_contributions(&self, supply: SupplyId)
    -> Result<Vec<Contribution>, GatewayError>;

    /// Inserts or overwrites `contribution` after `check` approved the new
    /// total. The supply stays locked from the sum to the write.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the supply does not exist, the
    /// error produced by `check`, or [`GatewayError::Persistence`] on
    /// storage failure.
    async fn commit_contribution(
        &self,
        contribution: &Contribution,
        check: CommitCheck<'_>,
    ) -> Result<Commitment, GatewayError>;

    /// Deletes a contribution. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn delete_contribution(&self, id: ContributionId) -> Result<bool, GatewayError>;

    /// Stores a gift and its event links.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn insert_gift(&self, gift: &Gift) -> Result<(), GatewayError>;

    /// Lists the gifts linked to `event`, oldest first, optionally only
    /// those suggested by `author`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn list_gifts(
        &self,
        event: EventId,
        author: Option<UserId>,
    ) -> Result<Vec<Gift>, GatewayError>;
}
