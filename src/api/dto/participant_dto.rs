//! Participant DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::UserId;

/// Request body for `POST /events/{id}/participants`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceParticipantsRequest {
    /// Users to register. The owner is always added.
    pub participant_ids: Vec<UserId>,
}
