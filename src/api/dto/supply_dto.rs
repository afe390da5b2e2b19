//! Supply and contribution DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::Contribution;

/// Response body for contribution writes.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContributionResponse {
    /// The stored contribution.
    #[serde(flatten)]
    pub contribution: Contribution,
    /// Present when the supply's pledged total now exceeds what is needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<(Contribution, Option<String>)> for ContributionResponse {
    fn from((contribution, warning): (Contribution, Option<String>)) -> Self {
        Self {
            contribution,
            warning,
        }
    }
}
