//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::cache::{CacheCoordinator, CacheStore};
use crate::config::GatewayConfig;
use crate::domain::{MessageBroker, RandomSource};
use crate::persistence::Store;
use crate::service::{
    EventRegistry, GiftCatalog, MatchEngine, ParticipantDirectory, SupplyLedger,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor. Cloning is cheap: every service holds `Arc`s.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event lookups and creation.
    pub events: EventRegistry,
    /// Participant registrations.
    pub participants: ParticipantDirectory,
    /// Secret-friend draws.
    pub matches: MatchEngine,
    /// Supplies and contributions.
    pub ledger: SupplyLedger,
    /// Gift suggestions.
    pub gifts: GiftCatalog,
}

impl AppState {
    /// Wires the service layer over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheStore>,
        broker: Arc<dyn MessageBroker>,
        rng: Arc<dyn RandomSource>,
        config: &GatewayConfig,
    ) -> Self {
        let coordinator = CacheCoordinator::new(cache, broker, config.invalidation.clone());
        let events = EventRegistry::new(Arc::clone(&store));
        let participants = ParticipantDirectory::new(Arc::clone(&store), events.clone());
        let matches = MatchEngine::new(
            Arc::clone(&store),
            events.clone(),
            participants.clone(),
            coordinator.clone(),
            rng,
            config.draw,
        );
        let ledger = SupplyLedger::new(
            Arc::clone(&store),
            events.clone(),
            participants.clone(),
            coordinator.clone(),
        );
        let gifts = GiftCatalog::new(
            store,
            events.clone(),
            participants.clone(),
            matches.clone(),
            coordinator,
        );
        Self {
            events,
            participants,
            matches,
            ledger,
            gifts,
        }
    }
}
