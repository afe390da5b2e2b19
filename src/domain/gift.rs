//! Gift suggestions attached to events.
//!
//! A gift is written by one user and may be linked to several events. In a
//! `SECRET_FRIEND` event a viewer only sees the gifts suggested by the
//! participant they give to; in every other event all gifts are visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::event::{EventType, UserProfile};
use super::ids::{EventId, GiftId, UserId};
use super::supply::validate_url;
use crate::error::GatewayError;

/// A stored gift suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    /// Gift identifier.
    pub id: GiftId,
    /// What the gift is.
    pub title: String,
    /// Where it can be bought.
    pub urls: Vec<String>,
    /// Who suggested it.
    pub user_id: UserId,
    /// Events the suggestion applies to.
    pub event_ids: Vec<EventId>,
    /// When it was suggested.
    pub created_at: DateTime<Utc>,
}

/// Fields of a new gift suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GiftDraft {
    /// Title; must not be blank.
    pub title: String,
    /// Shop links; each must be a valid URL.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Events to attach the gift to; at least one.
    pub event_ids: Vec<EventId>,
}

impl GiftDraft {
    /// Checks field-level rules and returns the event ids without
    /// duplicates, order preserved.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for a blank title, an invalid
    /// URL or an empty event list.
    pub fn validate(&self) -> Result<Vec<EventId>, GatewayError> {
        if self.title.trim().is_empty() {
            return Err(GatewayError::Validation("title must not be blank".to_string()));
        }
        for url in &self.urls {
            validate_url("urls", Some(url))?;
        }
        let mut ids: Vec<EventId> = Vec::with_capacity(self.event_ids.len());
        for id in &self.event_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            return Err(GatewayError::Validation(
                "a gift needs at least one event".to_string(),
            ));
        }
        Ok(ids)
    }

    /// Builds the gift authored by `user` for the validated `event_ids`.
    #[must_use]
    pub fn into_gift(self, user: UserId, event_ids: Vec<EventId>) -> Gift {
        Gift {
            id: GiftId::new(),
            title: self.title.trim().to_string(),
            urls: self.urls,
            user_id: user,
            event_ids,
            created_at: Utc::now(),
        }
    }
}

/// A gift as listed for an event, author resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GiftView {
    /// Gift identifier.
    pub id: GiftId,
    /// Title.
    pub title: String,
    /// Shop links.
    pub urls: Vec<String>,
    /// Author.
    pub user_id: UserId,
    /// Author display name.
    pub user_name: String,
    /// When it was suggested.
    pub created_at: DateTime<Utc>,
}

/// Gifts visible to one viewer of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GiftList {
    /// Event the list belongs to.
    pub event_id: EventId,
    /// Event title.
    pub event_title: String,
    /// Event kind.
    pub event_type: EventType,
    /// The viewer's secret friend, for `SECRET_FRIEND` events only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<UserProfile>,
    /// Visible gifts, oldest first.
    pub gifts: Vec<GiftView>,
}
