//! Secret-friend draw orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::CacheCoordinator;
use crate::config::DrawSettings;
use crate::domain::matching::derangement;
use crate::domain::{
    Assignment, DrawPair, DrawResult, EventId, EventType, Match, RandomSource, UserId, UserProfile,
    authz,
};
use crate::error::GatewayError;
use crate::persistence::{DRAW_ALREADY_PERFORMED, Store};

use super::{EventRegistry, ParticipantDirectory};

/// Runs secret-friend draws and answers "who do I give to".
///
/// A draw is recorded under the event's primary group. Preconditions are
/// checked in a fixed order so the first failing one is reported:
///
/// 1. the event exists;
/// 2. it is a `SECRET_FRIEND` event;
/// 3. the requester owns it;
/// 4. it has a group;
/// 5. there are at least [`DrawSettings::min_participants`] participants;
/// 6. their number is even;
/// 7. none of them already has a match in the scope.
///
/// Check 7 is repeated by the store when the matches are written, so two
/// concurrent draws cannot both succeed.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    store: Arc<dyn Store>,
    events: EventRegistry,
    participants: ParticipantDirectory,
    cache: CacheCoordinator,
    rng: Arc<dyn RandomSource>,
    settings: DrawSettings,
}

impl MatchEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        events: EventRegistry,
        participants: ParticipantDirectory,
        cache: CacheCoordinator,
        rng: Arc<dyn RandomSource>,
        settings: DrawSettings,
    ) -> Self {
        Self {
            store,
            events,
            participants,
            cache,
            rng,
            settings,
        }
    }

    /// Performs the draw for `event_id` on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NotFound`] if the event does not exist.
    /// - [`GatewayError::Validation`] for a wrong event type, a missing
    ///   group, too few or an odd number of participants, or a repeated draw.
    /// - [`GatewayError::Forbidden`] if `requester` is not the owner.
    /// - [`GatewayError::DrawExhausted`] if no valid arrangement was found
    ///   within the shuffle budget; retrying may succeed.
    pub async fn draw(
        &self,
        event_id: EventId,
        requester: UserId,
    ) -> Result<DrawResult, GatewayError> {
        let event = self.events.get(event_id).await?;
        if event.event_type != EventType::SecretFriend {
            return Err(GatewayError::Validation(format!(
                "draws are only available for SECRET_FRIEND events, this one is {}",
                event.event_type
            )));
        }
        authz::can_draw(requester, &event).into_result()?;
        let Some(scope) = event.primary_group().map(|g| g.id) else {
            return Err(GatewayError::Validation(
                "the event has no group to record the draw under".to_string(),
            ));
        };

        let givers = self.participants.user_ids(event_id).await?;
        if givers.len() < self.settings.min_participants {
            return Err(GatewayError::Validation(format!(
                "at least {} participants are required, found {}",
                self.settings.min_participants,
                givers.len()
            )));
        }
        if givers.len() % 2 != 0 {
            return Err(GatewayError::Validation(format!(
                "an even number of participants is required, found {}",
                givers.len()
            )));
        }
        if self.store.matches_exist(scope, &givers).await? {
            return Err(GatewayError::Validation(DRAW_ALREADY_PERFORMED.to_string()));
        }

        let attempts = self.settings.max_shuffle_attempts;
        let Some(receivers) = derangement(&givers, self.rng.as_ref(), attempts) else {
            tracing::warn!(%event_id, attempts, "draw exhausted its shuffle budget");
            return Err(GatewayError::DrawExhausted { attempts });
        };

        let matches: Vec<Match> = givers
            .iter()
            .zip(&receivers)
            .map(|(giver, receiver)| Match::new(scope, *giver, *receiver))
            .collect();
        self.store.insert_matches(&matches).await?;
        tracing::info!(%event_id, %scope, pairs = matches.len(), "secret-friend draw recorded");

        // Secret-friend gift lists depend on who gives to whom.
        let _publish = self
            .cache
            .invalidate_prefix(&CacheCoordinator::gifts_prefix(event_id), event_id)
            .await;

        let names = self.participants.names(&givers).await?;
        let profile = |id: UserId| UserProfile {
            id,
            name: names.get(&id).cloned().unwrap_or_default(),
        };
        Ok(DrawResult {
            event_id,
            event_title: event.title,
            matches: matches
                .iter()
                .map(|m| DrawPair {
                    giver: profile(m.giver_id),
                    receiver: profile(m.receiver_id),
                })
                .collect(),
        })
    }

    /// Returns who `user` gives to in the draw of `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the event does not exist or
    /// `user` has no match in it.
    pub async fn assignment(
        &self,
        event_id: EventId,
        user: UserId,
    ) -> Result<Assignment, GatewayError> {
        let event = self.events.get(event_id).await?;
        let Some(scope) = event.primary_group().map(|g| g.id) else {
            return Err(GatewayError::not_found("assignment", user));
        };
        let Some(found) = self
            .store
            .list_matches(scope)
            .await?
            .into_iter()
            .find(|m| m.giver_id == user)
        else {
            return Err(GatewayError::not_found("assignment", user));
        };

        let names: HashMap<UserId, String> = self.participants.names(&[found.receiver_id]).await?;
        Ok(Assignment {
            event_id,
            receiver: UserProfile {
                id: found.receiver_id,
                name: names.get(&found.receiver_id).cloned().unwrap_or_default(),
            },
            drawn_at: found.created_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::cache::CacheStore;
    use crate::domain::{Event, ThreadRandom};
    use crate::service::fixtures::World;

    /// Never moves anything, so every shuffle is the identity.
    #[derive(Debug)]
    struct Stuck;

    impl RandomSource for Stuck {
        fn index_below(&self, bound: usize) -> usize {
            bound.saturating_sub(1)
        }
    }

    fn engine(world: &World, rng: Arc<dyn RandomSource>) -> MatchEngine {
        world.match_engine(rng)
    }

    async fn registered(world: &World, guests: usize) -> EventId {
        let event = world.event(EventType::SecretFriend).await;
        let invited: Vec<UserId> = world.guests.iter().take(guests).copied().collect();
        let Ok(_) = world
            .participants()
            .replace(event.id, world.owner, &invited)
            .await
        else {
            panic!("registration failed");
        };
        event.id
    }

    #[tokio::test]
    async fn draw_is_a_derangement_over_all_participants() {
        let world = World::new(5).await;
        let event_id = registered(&world, 5).await;
        let engine = engine(&world, Arc::new(ThreadRandom));

        let Ok(result) = engine.draw(event_id, world.owner).await else {
            panic!("draw should succeed for 6 participants");
        };
        assert_eq!(result.matches.len(), 6);
        assert!(result.matches.iter().all(|p| p.giver.id != p.receiver.id));
        let givers: HashSet<UserId> = result.matches.iter().map(|p| p.giver.id).collect();
        let receivers: HashSet<UserId> = result.matches.iter().map(|p| p.receiver.id).collect();
        assert_eq!(givers.len(), 6);
        assert_eq!(givers, receivers);
        assert!(result.matches.iter().all(|p| !p.giver.name.is_empty()));
    }

    #[tokio::test]
    async fn second_draw_fails_without_new_rows() {
        let world = World::new(3).await;
        let event_id = registered(&world, 3).await;
        let engine = engine(&world, Arc::new(ThreadRandom));

        assert!(engine.draw(event_id, world.owner).await.is_ok());
        let Err(GatewayError::Validation(message)) = engine.draw(event_id, world.owner).await else {
            panic!("second draw must be rejected");
        };
        assert_eq!(message, DRAW_ALREADY_PERFORMED);
        assert_eq!(world.store.match_count().await, 4);
    }

    #[tokio::test]
    async fn odd_and_small_rosters_fail_before_writing() {
        let world = World::new(4).await;
        let engine = engine(&world, Arc::new(ThreadRandom));

        let odd = registered(&world, 4).await;
        let Err(GatewayError::Validation(message)) = engine.draw(odd, world.owner).await else {
            panic!("five participants must be rejected");
        };
        assert!(message.contains("even"));

        let small = registered(&world, 1).await;
        let Err(GatewayError::Validation(message)) = engine.draw(small, world.owner).await else {
            panic!("two participants must be rejected");
        };
        assert!(message.contains("at least 4"));
        assert_eq!(world.store.match_count().await, 0);
    }

    #[tokio::test]
    async fn preconditions_are_checked_in_order() {
        let world = World::new(3).await;
        let engine = engine(&world, Arc::new(ThreadRandom));

        assert!(matches!(
            engine.draw(EventId::new(), world.owner).await,
            Err(GatewayError::NotFound { .. })
        ));

        let potluck = world.event(EventType::Potluck).await;
        assert!(matches!(
            engine.draw(potluck.id, world.admin).await,
            Err(GatewayError::Validation(_))
        ));

        let event_id = registered(&world, 3).await;
        assert!(matches!(
            engine.draw(event_id, world.admin).await,
            Err(GatewayError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn event_without_group_is_rejected_before_counting() {
        let world = World::new(3).await;
        let event = Event {
            id: EventId::new(),
            title: "Loose ends".to_string(),
            event_date: chrono::Utc::now(),
            owner_id: world.owner,
            event_type: EventType::SecretFriend,
            groups: Vec::new(),
        };
        let Ok(()) = world.store.insert_event(&event).await else {
            panic!("insert event failed");
        };
        let Ok(list) = world
            .participants()
            .replace(event.id, world.owner, &world.guests)
            .await
        else {
            panic!("registration failed");
        };
        assert_eq!(list.participants.len(), 4);

        let engine = engine(&world, Arc::new(ThreadRandom));
        let Err(GatewayError::Validation(message)) = engine.draw(event.id, world.owner).await
        else {
            panic!("an event without a group cannot be drawn");
        };
        assert!(message.contains("no group"));
        assert_eq!(world.store.match_count().await, 0);
    }

    #[tokio::test]
    async fn draw_evicts_cached_gift_lists_of_the_event() {
        let world = World::new(3).await;
        let event_id = registered(&world, 3).await;
        let key = CacheCoordinator::gifts_key(event_id, world.owner);
        let _ = world
            .cache
            .set(&key, "{}".to_string(), std::time::Duration::from_secs(60))
            .await;

        assert!(engine(&world, Arc::new(ThreadRandom)).draw(event_id, world.owner).await.is_ok());
        assert_eq!(world.cache.get(&key).await.ok().flatten(), None);
    }

    #[tokio::test]
    async fn exhausted_shuffles_are_retryable() {
        let world = World::new(3).await;
        let event_id = registered(&world, 3).await;
        let engine = engine(&world, Arc::new(Stuck));

        let Err(err) = engine.draw(event_id, world.owner).await else {
            panic!("identity shuffles can never succeed");
        };
        assert!(matches!(err, GatewayError::DrawExhausted { attempts: 100 }));
        assert!(err.is_retryable());
        assert_eq!(world.store.match_count().await, 0);
    }

    #[tokio::test]
    async fn assignment_returns_own_receiver() {
        let world = World::new(3).await;
        let event_id = registered(&world, 3).await;
        let engine = engine(&world, Arc::new(ThreadRandom));
        let Ok(result) = engine.draw(event_id, world.owner).await else {
            panic!("draw failed");
        };
        let Some(own) = result.matches.iter().find(|p| p.giver.id == world.owner) else {
            panic!("owner must be a giver");
        };

        let Ok(assignment) = engine.assignment(event_id, world.owner).await else {
            panic!("owner should have an assignment");
        };
        assert_eq!(assignment.receiver, own.receiver);

        assert!(matches!(
            engine.assignment(event_id, world.admin).await,
            Err(GatewayError::NotFound { resource: "assignment", .. })
        ));
    }
}
