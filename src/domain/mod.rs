//! Domain layer: entities, pure rules, and the message transport.
//!
//! Everything in here is free of storage concerns. Services in
//! [`crate::service`] load data through [`crate::persistence::Store`] and
//! hand it to these types and functions to decide what happens.

pub mod authz;
pub mod event;
pub mod event_bus;
pub mod gift;
pub mod ids;
pub mod invalidation;
pub mod matching;
pub mod participant;
pub mod supply;

pub use event::{Event, EventDraft, EventSummary, EventType, Group, UserProfile};
pub use event_bus::{BrokerError, BrokerMessage, EventBus, MessageBroker};
pub use gift::{Gift, GiftDraft, GiftList, GiftView};
pub use ids::{
    ContributionId, EventId, GiftId, GroupId, MatchId, ParticipantId, SupplyId, UserId,
};
pub use invalidation::InvalidationEvent;
pub use matching::{Assignment, DrawPair, DrawResult, Match, RandomSource, ThreadRandom};
pub use participant::{Participant, ParticipantList, ParticipantView};
pub use supply::{
    Commitment, Contribution, ContributionDraft, ContributionPatch, Supply, SupplyDraft,
    SupplyPatch, SupplyProgress,
};
