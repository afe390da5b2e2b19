//! Secret-friend matches and the derangement search behind them.
//!
//! The shuffle draws its randomness from a [`RandomSource`] so the search
//! can be driven deterministically. [`derangement`] applies Fisher–Yates to
//! the receiver list up to a fixed number of times and accepts the first
//! arrangement in which nobody receives from themselves.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::event::UserProfile;
use super::ids::{EventId, GroupId, MatchId, UserId};

/// One giver → receiver assignment. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Match identifier.
    pub id: MatchId,
    /// Draw scope: the event's primary group.
    pub scope: GroupId,
    /// Participant who gives.
    pub giver_id: UserId,
    /// Participant who receives.
    pub receiver_id: UserId,
    /// When the draw was recorded.
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// Creates a new match row stamped with the current time.
    #[must_use]
    pub fn new(scope: GroupId, giver_id: UserId, receiver_id: UserId) -> Self {
        Self {
            id: MatchId::new(),
            scope,
            giver_id,
            receiver_id,
            created_at: Utc::now(),
        }
    }
}

/// One drawn pair as shown to the event owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DrawPair {
    /// Participant who gives.
    pub giver: UserProfile,
    /// Participant who receives.
    pub receiver: UserProfile,
}

/// Outcome of a successful draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DrawResult {
    /// Event the draw ran for.
    pub event_id: EventId,
    /// Event title.
    pub event_title: String,
    /// Every giver exactly once.
    pub matches: Vec<DrawPair>,
}

/// A participant's own assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Event the draw ran for.
    pub event_id: EventId,
    /// Who the caller gives to.
    pub receiver: UserProfile,
    /// When the draw was recorded.
    pub drawn_at: DateTime<Utc>,
}

/// Source of uniform random indices.
pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Returns an index in `0..bound`. `bound` is always at least 1.
    fn index_below(&self, bound: usize) -> usize;
}

/// [`RandomSource`] backed by the thread-local generator from `rand`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn index_below(&self, bound: usize) -> usize {
        rand::rng().random_range(0..bound.max(1))
    }
}

/// Shuffles `items` in place with Fisher–Yates.
pub fn shuffle<T>(items: &mut [T], rng: &dyn RandomSource) {
    for i in (1..items.len()).rev() {
        let j = rng.index_below(i.saturating_add(1)).min(i);
        items.swap(i, j);
    }
}

/// Returns `true` if no position maps a giver to themselves.
#[must_use]
pub fn is_derangement(givers: &[UserId], receivers: &[UserId]) -> bool {
    givers.len() == receivers.len() && givers.iter().zip(receivers).all(|(g, r)| g != r)
}

/// Searches for a receiver ordering with no fixed point.
///
/// Returns the receivers aligned index-by-index with `givers`, or `None`
/// when `max_attempts` shuffles all produced a self-assignment.
#[must_use]
pub fn derangement(
    givers: &[UserId],
    rng: &dyn RandomSource,
    max_attempts: u32,
) -> Option<Vec<UserId>> {
    let mut receivers = givers.to_vec();
    for attempt in 1..=max_attempts {
        shuffle(&mut receivers, rng);
        if is_derangement(givers, &receivers) {
            tracing::debug!(attempt, participants = givers.len(), "derangement found");
            return Some(receivers);
        }
    }
    None
}
