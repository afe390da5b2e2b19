//! Service layer: business logic orchestration.
//!
//! Each service loads facts through [`crate::persistence::Store`], asks the
//! pure rules in [`crate::domain`] what to do, writes the outcome back, and
//! on ledger mutations hands the affected key to the
//! [`crate::cache::CacheCoordinator`].
//!
//! ```text
//! EventRegistry ◄── ParticipantDirectory
//!       ▲                  ▲
//!       ├──── MatchEngine ─┤──► CacheCoordinator
//!       ├──── SupplyLedger ┤──► CacheCoordinator
//!       └──── GiftCatalog ─┘──► CacheCoordinator (reads MatchEngine)
//! ```

pub mod event_registry;
pub mod gift_catalog;
pub mod match_engine;
pub mod participants;
pub mod supply_ledger;

pub use event_registry::EventRegistry;
pub use gift_catalog::GiftCatalog;
pub use match_engine::MatchEngine;
pub use participants::ParticipantDirectory;
pub use supply_ledger::{ContributionEntry, SupplyLedger};

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod fixtures {
    //! Seeded in-memory world shared by the service tests.

    use std::sync::Arc;

    use chrono::Utc;

    use crate::cache::{CacheCoordinator, CacheStore, MemoryCache};
    use crate::config::{DrawSettings, InvalidationSettings};
    use crate::domain::{
        Event, EventBus, EventId, EventType, Group, GroupId, MessageBroker, RandomSource, UserId,
        UserProfile,
    };
    use crate::persistence::{MemoryStore, Store};

    use super::{EventRegistry, GiftCatalog, MatchEngine, ParticipantDirectory, SupplyLedger};

    /// Owner, a separate group admin, and `guests` further users.
    #[derive(Debug)]
    pub(crate) struct World {
        pub store: Arc<MemoryStore>,
        pub cache: Arc<MemoryCache>,
        pub bus: EventBus,
        pub owner: UserId,
        pub admin: UserId,
        pub guests: Vec<UserId>,
        pub group: Group,
    }

    impl World {
        pub async fn new(guests: usize) -> Self {
            let store = Arc::new(MemoryStore::new());
            let owner = UserId::new();
            let admin = UserId::new();
            let mut named = vec![(owner, "Olivia".to_string()), (admin, "Adam".to_string())];
            let guests: Vec<UserId> = (0..guests).map(|_| UserId::new()).collect();
            named.extend(
                guests
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (*id, format!("Guest {i}"))),
            );
            for (id, name) in named {
                store.insert_user(UserProfile { id, name }).await;
            }
            let group = Group {
                id: GroupId::new(),
                name: "Friends".to_string(),
                description: "Weekend crew".to_string(),
                owner_id: admin,
            };
            store.insert_group(group.clone()).await;
            Self {
                store,
                cache: Arc::new(MemoryCache::new()),
                bus: EventBus::new(64),
                owner,
                admin,
                guests,
                group,
            }
        }

        pub fn store(&self) -> Arc<dyn Store> {
            Arc::clone(&self.store) as Arc<dyn Store>
        }

        pub fn coordinator_with(&self, broker: Arc<dyn MessageBroker>) -> CacheCoordinator {
            CacheCoordinator::new(
                Arc::clone(&self.cache) as Arc<dyn CacheStore>,
                broker,
                InvalidationSettings::default(),
            )
        }

        pub fn registry(&self) -> EventRegistry {
            EventRegistry::new(self.store())
        }

        pub fn participants(&self) -> ParticipantDirectory {
            ParticipantDirectory::new(self.store(), self.registry())
        }

        pub fn ledger(&self) -> SupplyLedger {
            self.ledger_with(Arc::new(self.bus.clone()))
        }

        pub fn ledger_with(&self, broker: Arc<dyn MessageBroker>) -> SupplyLedger {
            SupplyLedger::new(
                self.store(),
                self.registry(),
                self.participants(),
                self.coordinator_with(broker),
            )
        }

        pub fn match_engine(&self, rng: Arc<dyn RandomSource>) -> MatchEngine {
            MatchEngine::new(
                self.store(),
                self.registry(),
                self.participants(),
                self.coordinator_with(Arc::new(self.bus.clone())),
                rng,
                DrawSettings::default(),
            )
        }

        pub fn gifts(&self, engine: MatchEngine) -> GiftCatalog {
            GiftCatalog::new(
                self.store(),
                self.registry(),
                self.participants(),
                engine,
                self.coordinator_with(Arc::new(self.bus.clone())),
            )
        }

        /// Stores an event of `event_type` owned by `owner` in `group`.
        pub async fn event(&self, event_type: EventType) -> Event {
            let event = Event {
                id: EventId::new(),
                title: format!("{event_type} night"),
                event_date: Utc::now(),
                owner_id: self.owner,
                event_type,
                groups: vec![self.group.clone()],
            };
            let Ok(()) = self.store.insert_event(&event).await else {
                panic!("seeding event failed");
            };
            event
        }
    }
}
