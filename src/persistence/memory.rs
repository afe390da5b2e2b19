//! In-memory [`Store`] used by tests and when no database is configured.
//!
//! All tables live behind a single [`tokio::sync::RwLock`]. Reads share the
//! lock; every mutation, including the read-check-write of
//! [`Store::commit_contribution`], runs under the write lock, which gives
//! the same atomicity the PostgreSQL store gets from row locks.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CommitCheck, DRAW_ALREADY_PERFORMED, Store};
use crate::domain::supply::total_committed;
use crate::domain::{
    Commitment, Contribution, ContributionId, Event, EventId, Gift, Group, GroupId, Match,
    Participant, Supply, SupplyId, UserId, UserProfile,
};
use crate::error::GatewayError;

/// Stored event row: groups are kept by id and resolved on read.
#[derive(Debug, Clone)]
struct EventRow {
    event: Event,
    group_ids: Vec<GroupId>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, UserProfile>,
    groups: HashMap<GroupId, Group>,
    events: HashMap<EventId, EventRow>,
    participants: Vec<Participant>,
    matches: Vec<Match>,
    supplies: HashMap<SupplyId, Supply>,
    contributions: Vec<Contribution>,
    gifts: Vec<Gift>,
}

impl Tables {
    fn hydrate(&self, row: &EventRow) -> Event {
        let mut event = row.event.clone();
        event.groups = row
            .group_ids
            .iter()
            .filter_map(|id| self.groups.get(id).cloned())
            .collect();
        event
    }

    fn contributions_of(&self, supply: SupplyId) -> Vec<Contribution> {
        self.contributions
            .iter()
            .filter(|c| c.supply_id == supply)
            .cloned()
            .collect()
    }
}

/// Process-local store. Cloning is not supported; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user profile. Users are owned by the identity service;
    /// this stands in for its sync.
    pub async fn insert_user(&self, user: UserProfile) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Registers a group.
    pub async fn insert_group(&self, group: Group) {
        self.tables.write().await.groups.insert(group.id, group);
    }

    /// Number of stored matches.
    pub async fn match_count(&self) -> usize {
        self.tables.read().await.matches.len()
    }

    /// Number of stored contributions across all supplies.
    pub async fn contribution_count(&self) -> usize {
        self.tables.read().await.contributions.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_event(&self, id: EventId) -> Result<Option<Event>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables.events.get(&id).map(|row| tables.hydrate(row)))
    }

    async fn insert_event(&self, event: &Event) -> Result<(), GatewayError> {
        let mut tables = self.tables.write().await;
        if tables.events.contains_key(&event.id) {
            return Err(GatewayError::Persistence(format!(
                "event {} already exists",
                event.id
            )));
        }
        let row = EventRow {
            group_ids: event.groups.iter().map(|g| g.id).collect(),
            event: Event {
                groups: Vec::new(),
                ..event.clone()
            },
        };
        tables.events.insert(event.id, row);
        Ok(())
    }

    async fn list_events_by_owner(&self, owner: UserId) -> Result<Vec<Event>, GatewayError> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|row| row.event.owner_id == owner)
            .map(|row| tables.hydrate(row))
            .collect();
        events.sort_by_key(|e| e.event_date);
        Ok(events)
    }

    async fn list_events_by_group(&self, group: GroupId) -> Result<Vec<Event>, GatewayError> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|row| row.group_ids.contains(&group))
            .map(|row| tables.hydrate(row))
            .collect();
        events.sort_by_key(|e| e.event_date);
        Ok(events)
    }

    async fn find_groups(&self, ids: &[GroupId]) -> Result<Vec<Group>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.groups.get(id).cloned())
            .collect())
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn replace_participants(
        &self,
        event: EventId,
        users: &[UserId],
    ) -> Result<Vec<Participant>, GatewayError> {
        let mut tables = self.tables.write().await;
        tables.participants.retain(|p| p.event_id != event);
        let mut added = Vec::with_capacity(users.len());
        for user in users {
            if added.iter().any(|p: &Participant| p.user_id == *user) {
                continue;
            }
            added.push(Participant::new(event, *user));
        }
        tables.participants.extend(added.iter().cloned());
        Ok(added)
    }

    async fn list_participants(&self, event: EventId) -> Result<Vec<Participant>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .iter()
            .filter(|p| p.event_id == event)
            .cloned()
            .collect())
    }

    async fn participant_exists(
        &self,
        event: EventId,
        user: UserId,
    ) -> Result<bool, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .iter()
            .any(|p| p.event_id == event && p.user_id == user))
    }

    async fn matches_exist(&self, scope: GroupId, givers: &[UserId]) -> Result<bool, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .matches
            .iter()
            .any(|m| m.scope == scope && givers.contains(&m.giver_id)))
    }

    async fn insert_matches(&self, matches: &[Match]) -> Result<(), GatewayError> {
        let mut tables = self.tables.write().await;
        let clash = matches.iter().enumerate().any(|(i, new)| {
            let stored = tables
                .matches
                .iter()
                .any(|m| m.scope == new.scope && m.giver_id == new.giver_id);
            let repeated = matches
                .iter()
                .take(i)
                .any(|m| m.scope == new.scope && m.giver_id == new.giver_id);
            stored || repeated
        });
        if clash {
            return Err(GatewayError::Validation(DRAW_ALREADY_PERFORMED.to_string()));
        }
        tables.matches.extend(matches.iter().cloned());
        Ok(())
    }

    async fn list_matches(&self, scope: GroupId) -> Result<Vec<Match>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .matches
            .iter()
            .filter(|m| m.scope == scope)
            .cloned()
            .collect())
    }

    async fn insert_supply(&self, supply: &Supply) -> Result<(), GatewayError> {
        let mut tables = self.tables.write().await;
        if !tables.events.contains_key(&supply.event_id) {
            return Err(GatewayError::not_found("event", supply.event_id));
        }
        tables.supplies.insert(supply.id, supply.clone());
        Ok(())
    }

    async fn update_supply(&self, supply: &Supply) -> Result<(), GatewayError> {
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.supplies.get_mut(&supply.id) else {
            return Err(GatewayError::not_found("supply", supply.id));
        };
        *slot = supply.clone();
        Ok(())
    }

    async fn find_supply(&self, id: SupplyId) -> Result<Option<Supply>, GatewayError> {
        Ok(self.tables.read().await.supplies.get(&id).cloned())
    }

    async fn delete_supply(&self, id: SupplyId) -> Result<u64, GatewayError> {
        let mut tables = self.tables.write().await;
        if tables.supplies.remove(&id).is_none() {
            return Ok(0);
        }
        let before = tables.contributions.len();
        tables.contributions.retain(|c| c.supply_id != id);
        Ok(u64::try_from(before.saturating_sub(tables.contributions.len())).unwrap_or(u64::MAX))
    }

    async fn list_supplies_with_contributions(
        &self,
        event: EventId,
    ) -> Result<Vec<(Supply, Vec<Contribution>)>, GatewayError> {
        let tables = self.tables.read().await;
        let mut supplies: Vec<&Supply> = tables
            .supplies
            .values()
            .filter(|s| s.event_id == event)
            .collect();
        supplies.sort_by_key(|s| s.created_at);
        Ok(supplies
            .into_iter()
            .map(|s| (s.clone(), tables.contributions_of(s.id)))
            .collect())
    }

    async fn find_contribution(
        &self,
        id: ContributionId,
    ) -> Result<Option<Contribution>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables.contributions.iter().find(|c| c.id == id).cloned())
    }

    async fn list_contributions(
        &self,
        supply: SupplyId,
    ) -> Result<Vec<Contribution>, GatewayError> {
        Ok(self.tables.read().await.contributions_of(supply))
    }

    async fn commit_contribution(
        &self,
        contribution: &Contribution,
        check: CommitCheck<'_>,
    ) -> Result<Commitment, GatewayError> {
        let mut tables = self.tables.write().await;
        let Some(supply) = tables.supplies.get(&contribution.supply_id) else {
            return Err(GatewayError::not_found("supply", contribution.supply_id));
        };
        let others = total_committed(
            &tables.contributions_of(contribution.supply_id),
            Some(contribution.id),
        );
        let commitment = check(supply, others)?;

        match tables
            .contributions
            .iter_mut()
            .find(|c| c.id == contribution.id)
        {
            Some(slot) => *slot = contribution.clone(),
            None => tables.contributions.push(contribution.clone()),
        }
        Ok(commitment)
    }

    async fn delete_contribution(&self, id: ContributionId) -> Result<bool, GatewayError> {
        let mut tables = self.tables.write().await;
        let before = tables.contributions.len();
        tables.contributions.retain(|c| c.id != id);
        Ok(tables.contributions.len() < before)
    }

    async fn insert_gift(&self, gift: &Gift) -> Result<(), GatewayError> {
        let mut tables = self.tables.write().await;
        if let Some(missing) = gift.event_ids.iter().find(|id| !tables.events.contains_key(id)) {
            return Err(GatewayError::not_found("event", *missing));
        }
        tables.gifts.push(gift.clone());
        Ok(())
    }

    async fn list_gifts(
        &self,
        event: EventId,
        author: Option<UserId>,
    ) -> Result<Vec<Gift>, GatewayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .gifts
            .iter()
            .filter(|g| g.event_ids.contains(&event))
            .filter(|g| author.is_none_or(|a| g.user_id == a))
            .cloned()
            .collect())
    }
}
