//! Supply items and contributions toward them.
//!
//! Every mutation ends with [`CacheCoordinator::invalidate`] on the event's
//! supply key. The publish runs in the background; its outcome never
//! changes the result of the mutation.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cache::CacheCoordinator;
use crate::domain::supply::assess_commitment;
use crate::domain::{
    Commitment, Contribution, ContributionDraft, ContributionId, ContributionPatch, Event, EventId,
    Supply, SupplyDraft, SupplyId, SupplyPatch, SupplyProgress, UserId, authz,
};
use crate::error::GatewayError;
use crate::persistence::Store;

use super::{EventRegistry, ParticipantDirectory};

/// A contribution with the contributor's name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContributionEntry {
    /// The pledge.
    #[serde(flatten)]
    pub contribution: Contribution,
    /// Contributor display name.
    pub user_name: String,
}

/// Owns supplies and contributions and enforces the overcommit cap.
#[derive(Debug, Clone)]
pub struct SupplyLedger {
    store: Arc<dyn Store>,
    events: EventRegistry,
    participants: ParticipantDirectory,
    cache: CacheCoordinator,
}

impl SupplyLedger {
    /// Creates a ledger.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        events: EventRegistry,
        participants: ParticipantDirectory,
        cache: CacheCoordinator,
    ) -> Self {
        Self {
            store,
            events,
            participants,
            cache,
        }
    }

    /// Adds a supply to a `REGISTRY` or `POTLUCK` event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for an invalid draft or an event
    /// type without supplies, [`GatewayError::NotFound`] for a missing
    /// event and [`GatewayError::Forbidden`] unless `actor` owns the event
    /// or one of its groups.
    pub async fn create_supply(
        &self,
        event_id: EventId,
        actor: UserId,
        draft: SupplyDraft,
    ) -> Result<Supply, GatewayError> {
        draft.validate()?;
        let event = self.events.get(event_id).await?;
        if !event.event_type.supports_supplies() {
            return Err(GatewayError::Validation(format!(
                "supplies are only available for REGISTRY and POTLUCK events, this one is {}",
                event.event_type
            )));
        }
        authz::can_manage_supplies(actor, &event).into_result()?;

        let supply = draft.into_supply(event_id);
        self.store.insert_supply(&supply).await?;
        tracing::info!(%event_id, supply_id = %supply.id, item = %supply.item_name, "supply created");
        self.invalidate(event_id).await;
        Ok(supply)
    }

    /// Applies `patch` to a supply.
    ///
    /// # Errors
    ///
    /// Same gate as [`SupplyLedger::create_supply`], plus
    /// [`GatewayError::NotFound`] for a missing supply.
    pub async fn update_supply(
        &self,
        supply_id: SupplyId,
        actor: UserId,
        patch: SupplyPatch,
    ) -> Result<Supply, GatewayError> {
        patch.validate()?;
        let (mut supply, event) = self.managed_supply(supply_id, actor).await?;
        patch.apply(&mut supply);
        self.store.update_supply(&supply).await?;
        tracing::info!(event_id = %event.id, %supply_id, "supply updated");
        self.invalidate(event.id).await;
        Ok(supply)
    }

    /// Deletes a supply and its contributions.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing supply and
    /// [`GatewayError::Forbidden`] unless `actor` may manage supplies.
    pub async fn delete_supply(&self, supply_id: SupplyId, actor: UserId) -> Result<(), GatewayError> {
        let (_, event) = self.managed_supply(supply_id, actor).await?;
        let removed = self.store.delete_supply(supply_id).await?;
        tracing::info!(event_id = %event.id, %supply_id, contributions = removed, "supply deleted");
        self.invalidate(event.id).await;
        Ok(())
    }

    /// Pledges toward a supply. Returns the stored contribution and, when
    /// the new total exceeds the quantity needed, an advisory warning.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for a zero quantity or a total
    /// above the cap, [`GatewayError::NotFound`] for a missing supply and
    /// [`GatewayError::Forbidden`] unless `actor` owns the event or is a
    /// participant.
    pub async fn create_contribution(
        &self,
        supply_id: SupplyId,
        actor: UserId,
        draft: ContributionDraft,
    ) -> Result<(Contribution, Option<String>), GatewayError> {
        draft.validate()?;
        let supply = self.supply(supply_id).await?;
        let event = self.events.get(supply.event_id).await?;
        let is_participant = self.participants.exists(event.id, actor).await?;
        authz::can_contribute(actor, &event, is_participant).into_result()?;

        let now = Utc::now();
        let contribution = Contribution {
            id: ContributionId::new(),
            supply_id,
            user_id: actor,
            quantity_committed: draft.quantity_committed,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        let quantity = contribution.quantity_committed;
        let check = move |s: &Supply, total: u64| assess_commitment(s, total, quantity);
        let commitment = self.store.commit_contribution(&contribution, &check).await?;

        tracing::info!(
            event_id = %event.id,
            %supply_id,
            contribution_id = %contribution.id,
            quantity,
            over_needed = matches!(commitment, Commitment::OverNeeded { .. }),
            "contribution created"
        );
        self.invalidate(event.id).await;
        Ok((contribution, commitment.into_warning()))
    }

    /// Edits a contribution. A new quantity is re-checked against the cap
    /// with the edited contribution's old quantity left out of the total.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing contribution,
    /// [`GatewayError::Forbidden`] unless `actor` made it, and
    /// [`GatewayError::Validation`] for a zero quantity or a total above the
    /// cap.
    pub async fn update_contribution(
        &self,
        contribution_id: ContributionId,
        actor: UserId,
        patch: ContributionPatch,
    ) -> Result<(Contribution, Option<String>), GatewayError> {
        patch.validate()?;
        let mut contribution = self.contribution(contribution_id).await?;
        authz::can_modify_contribution(actor, &contribution).into_result()?;
        let supply = self.supply(contribution.supply_id).await?;

        let requested = patch.quantity_committed;
        if let Some(quantity) = requested {
            contribution.quantity_committed = quantity;
        }
        if let Some(notes) = patch.notes {
            contribution.notes = Some(notes);
        }
        contribution.updated_at = Utc::now();

        let check = move |s: &Supply, total: u64| match requested {
            Some(quantity) => assess_commitment(s, total, quantity),
            None => Ok(Commitment::Within),
        };
        let commitment = self.store.commit_contribution(&contribution, &check).await?;

        tracing::info!(event_id = %supply.event_id, %contribution_id, "contribution updated");
        self.invalidate(supply.event_id).await;
        Ok((contribution, commitment.into_warning()))
    }

    /// Withdraws a contribution.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing contribution and
    /// [`GatewayError::Forbidden`] unless `actor` made it.
    pub async fn delete_contribution(
        &self,
        contribution_id: ContributionId,
        actor: UserId,
    ) -> Result<(), GatewayError> {
        let contribution = self.contribution(contribution_id).await?;
        authz::can_modify_contribution(actor, &contribution).into_result()?;
        let supply = self.supply(contribution.supply_id).await?;

        if !self.store.delete_contribution(contribution_id).await? {
            return Err(GatewayError::not_found("contribution", contribution_id));
        }
        tracing::info!(event_id = %supply.event_id, %contribution_id, "contribution deleted");
        self.invalidate(supply.event_id).await;
        Ok(())
    }

    /// Lists an event's supplies with pledge progress, through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing event.
    pub async fn event_supplies(&self, event_id: EventId) -> Result<Vec<SupplyProgress>, GatewayError> {
        let key = CacheCoordinator::supplies_key(event_id);
        self.cache
            .read_through(&key, || async {
                self.events.get(event_id).await?;
                let rows = self.store.list_supplies_with_contributions(event_id).await?;
                Ok::<_, GatewayError>(
                    rows.into_iter()
                        .map(|(supply, contributions)| {
                            SupplyProgress::from_parts(supply, &contributions)
                        })
                        .collect::<Vec<_>>(),
                )
            })
            .await
    }

    /// Lists the contributions to a supply with contributor names.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for a missing supply.
    pub async fn list_contributions(
        &self,
        supply_id: SupplyId,
    ) -> Result<Vec<ContributionEntry>, GatewayError> {
        self.supply(supply_id).await?;
        let contributions = self.store.list_contributions(supply_id).await?;
        let users: Vec<UserId> = contributions.iter().map(|c| c.user_id).collect();
        let names = self.participants.names(&users).await?;
        Ok(contributions
            .into_iter()
            .map(|contribution| ContributionEntry {
                user_name: names.get(&contribution.user_id).cloned().unwrap_or_default(),
                contribution,
            })
            .collect())
    }

    async fn supply(&self, id: SupplyId) -> Result<Supply, GatewayError> {
        self.store
            .find_supply(id)
            .await?
            .ok_or_else(|| GatewayError::not_found("supply", id))
    }

    async fn contribution(&self, id: ContributionId) -> Result<Contribution, GatewayError> {
        self.store
            .find_contribution(id)
            .await?
            .ok_or_else(|| GatewayError::not_found("contribution", id))
    }

    /// Loads a supply and its event, checking that `actor` may manage it.
    async fn managed_supply(
        &self,
        supply_id: SupplyId,
        actor: UserId,
    ) -> Result<(Supply, Event), GatewayError> {
        let supply = self.supply(supply_id).await?;
        let event = self.events.get(supply.event_id).await?;
        authz::can_manage_supplies(actor, &event).into_result()?;
        Ok((supply, event))
    }

    async fn invalidate(&self, event_id: EventId) {
        // Fire and forget: the handle is dropped, the publish keeps running.
        let _publish = self
            .cache
            .invalidate(&CacheCoordinator::supplies_key(event_id), event_id)
            .await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::CacheStore;
    use crate::domain::{BrokerError, EventType, MessageBroker};
    use crate::service::fixtures::World;

    #[derive(Debug, Default)]
    struct DownBroker {
        calls: AtomicU32,
    }

    #[async_trait]
    impl MessageBroker for DownBroker {
        async fn publish(&self, _: &str, _: &serde_json::Value) -> Result<(), BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::Unavailable("connection refused".to_string()))
        }
    }

    fn chairs(needed: u32) -> SupplyDraft {
        SupplyDraft {
            item_name: "Folding chairs".to_string(),
            description: None,
            quantity_needed: needed,
            unit: "chairs".to_string(),
            image_url: None,
            url: None,
        }
    }

    fn pledge(quantity: u32) -> ContributionDraft {
        ContributionDraft {
            quantity_committed: quantity,
            notes: None,
        }
    }

    async fn potluck_with_supply(world: &World, ledger: &SupplyLedger, needed: u32) -> Supply {
        let event = world.event(EventType::Potluck).await;
        let Ok(_) = world
            .participants()
            .replace(event.id, world.owner, &world.guests)
            .await
        else {
            panic!("registration failed");
        };
        let Ok(supply) = ledger.create_supply(event.id, world.owner, chairs(needed)).await else {
            panic!("supply creation failed");
        };
        supply
    }

    #[tokio::test]
    async fn supplies_need_registry_or_potluck() {
        let world = World::new(0).await;
        let ledger = world.ledger();
        let event = world.event(EventType::SecretFriend).await;
        assert!(matches!(
            ledger.create_supply(event.id, world.owner, chairs(3)).await,
            Err(GatewayError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn group_admin_may_manage_but_guests_may_not() {
        let world = World::new(1).await;
        let ledger = world.ledger();
        let event = world.event(EventType::Registry).await;
        assert!(ledger.create_supply(event.id, world.admin, chairs(3)).await.is_ok());

        let Some(guest) = world.guests.first().copied() else {
            panic!("one guest expected");
        };
        assert!(matches!(
            ledger.create_supply(event.id, guest, chairs(3)).await,
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn over_need_warns_and_over_cap_fails() {
        let world = World::new(2).await;
        let ledger = world.ledger();
        let supply = potluck_with_supply(&world, &ledger, 10).await;
        let [a, b] = world.guests.as_slice() else {
            panic!("two guests expected");
        };

        let Ok((_, warning)) = ledger.create_contribution(supply.id, *a, pledge(12)).await else {
            panic!("12 of 10 should be accepted");
        };
        assert!(warning.is_some());

        let Err(GatewayError::Validation(_)) = ledger.create_contribution(supply.id, *b, pledge(1)).await
        else {
            panic!("13 of 10 should be rejected");
        };
        assert_eq!(world.store.contribution_count().await, 1);
    }

    #[tokio::test]
    async fn exact_need_has_no_warning() {
        let world = World::new(1).await;
        let ledger = world.ledger();
        let supply = potluck_with_supply(&world, &ledger, 10).await;
        let Ok((_, warning)) = ledger.create_contribution(supply.id, world.owner, pledge(10)).await
        else {
            panic!("exact pledge should be accepted");
        };
        assert_eq!(warning, None);
    }

    #[tokio::test]
    async fn outsiders_cannot_contribute() {
        let world = World::new(0).await;
        let ledger = world.ledger();
        let supply = potluck_with_supply(&world, &ledger, 5).await;
        assert!(matches!(
            ledger.create_contribution(supply.id, UserId::new(), pledge(1)).await,
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn update_rechecks_without_double_counting() {
        let world = World::new(1).await;
        let ledger = world.ledger();
        let supply = potluck_with_supply(&world, &ledger, 10).await;
        let Some(guest) = world.guests.first().copied() else {
            panic!("one guest expected");
        };
        let Ok((pledged, _)) = ledger.create_contribution(supply.id, guest, pledge(10)).await else {
            panic!("pledge failed");
        };

        let raise = |quantity| ContributionPatch {
            quantity_committed: Some(quantity),
            notes: None,
        };
        let Ok((updated, warning)) = ledger.update_contribution(pledged.id, guest, raise(12)).await
        else {
            panic!("raising to 12 of 10 should be accepted");
        };
        assert_eq!(updated.quantity_committed, 12);
        assert!(warning.is_some());
        assert!(matches!(
            ledger.update_contribution(pledged.id, guest, raise(13)).await,
            Err(GatewayError::Validation(_))
        ));
        assert!(matches!(
            ledger.update_contribution(pledged.id, world.owner, raise(1)).await,
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn progress_is_cached_and_refreshed_after_mutation() {
        let world = World::new(1).await;
        let ledger = world.ledger();
        let supply = potluck_with_supply(&world, &ledger, 4).await;
        let key = CacheCoordinator::supplies_key(supply.event_id);

        let Ok(before) = ledger.event_supplies(supply.event_id).await else {
            panic!("listing failed");
        };
        assert_eq!(before.first().map(|s| s.fulfillment_percentage), Some(0));
        assert!(world.cache.get(&key).await.ok().flatten().is_some());

        let _ = ledger.create_contribution(supply.id, world.owner, pledge(2)).await;
        assert_eq!(world.cache.get(&key).await.ok().flatten(), None);

        let Ok(after) = ledger.event_supplies(supply.event_id).await else {
            panic!("listing failed");
        };
        let Some(progress) = after.first() else {
            panic!("one supply expected");
        };
        assert_eq!(progress.quantity_committed, 2);
        assert_eq!(progress.fulfillment_percentage, 50);
    }

    #[tokio::test]
    async fn deleting_a_supply_cascades_and_invalidates() {
        let world = World::new(0).await;
        let ledger = world.ledger();
        let mut rx = world.bus.subscribe();
        let supply = potluck_with_supply(&world, &ledger, 4).await;
        let _ = ledger.create_contribution(supply.id, world.owner, pledge(1)).await;

        assert!(ledger.delete_supply(supply.id, world.owner).await.is_ok());
        assert_eq!(world.store.contribution_count().await, 0);

        let key = CacheCoordinator::supplies_key(supply.event_id);
        let mut seen = 0;
        while let Ok(Ok(message)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await
        {
            assert_eq!(message.payload.get("key").and_then(|v| v.as_str()), Some(key.as_str()));
            seen += 1;
            if seen == 3 {
                break;
            }
        }
        // create supply, create contribution, delete supply
        assert_eq!(seen, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn broker_outage_does_not_fail_the_write() {
        let world = World::new(0).await;
        let broker = Arc::new(DownBroker::default());
        let ledger = world.ledger_with(Arc::clone(&broker) as Arc<dyn MessageBroker>);
        let supply = potluck_with_supply(&world, &ledger, 4).await;
        let key = CacheCoordinator::supplies_key(supply.event_id);
        let _ = ledger.event_supplies(supply.event_id).await;

        let Ok((_, None)) = ledger.create_contribution(supply.id, world.owner, pledge(1)).await else {
            panic!("write must succeed while the broker is down");
        };
        assert_eq!(world.cache.get(&key).await.ok().flatten(), None);

        // Let the background publishes run through their backoff.
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert_eq!(broker.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn contribution_listing_resolves_names_and_deletes_are_owner_only() {
        let world = World::new(1).await;
        let ledger = world.ledger();
        let supply = potluck_with_supply(&world, &ledger, 4).await;
        let Some(guest) = world.guests.first().copied() else {
            panic!("one guest expected");
        };
        let Ok((pledged, _)) = ledger.create_contribution(supply.id, guest, pledge(1)).await else {
            panic!("pledge failed");
        };

        let Ok(entries) = ledger.list_contributions(supply.id).await else {
            panic!("listing failed");
        };
        assert_eq!(entries.first().map(|e| e.user_name.as_str()), Some("Guest 0"));

        assert!(matches!(
            ledger.delete_contribution(pledged.id, world.owner).await,
            Err(GatewayError::Forbidden(_))
        ));
        assert!(ledger.delete_contribution(pledged.id, guest).await.is_ok());
        assert!(matches!(
            ledger.delete_contribution(pledged.id, guest).await,
            Err(GatewayError::NotFound { .. })
        ));
    }
}
