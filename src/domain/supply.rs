//! Supply items, contributions toward them, and the overcommit rules.
//!
//! A supply may be pledged up to 120 % of what is needed. Totals above the
//! needed quantity but within the cap are accepted with an advisory warning;
//! totals above the cap are rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{ContributionId, EventId, SupplyId, UserId};
use crate::error::GatewayError;

/// Cap on pledged quantity, as a percentage of the quantity needed.
pub const OVERCOMMIT_CAP_PERCENT: u64 = 120;

/// An item an event needs guests to bring or buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Supply {
    /// Supply identifier.
    pub id: SupplyId,
    /// Owning event.
    pub event_id: EventId,
    /// Item name (e.g. `"Paper plates"`).
    pub item_name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Quantity required.
    pub quantity_needed: u32,
    /// Unit the quantity is expressed in (e.g. `"packs"`).
    pub unit: String,
    /// Optional picture of the item.
    pub image_url: Option<String>,
    /// Optional link to buy the item.
    pub url: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A user's pledge toward a supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    /// Contribution identifier.
    pub id: ContributionId,
    /// Supply being contributed to.
    pub supply_id: SupplyId,
    /// Contributor.
    pub user_id: UserId,
    /// Pledged quantity, always at least 1.
    pub quantity_committed: u32,
    /// Optional note from the contributor.
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Fields of a new supply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupplyDraft {
    /// Item name; must not be blank.
    pub item_name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Quantity required; at least 1.
    pub quantity_needed: u32,
    /// Unit; must not be blank.
    pub unit: String,
    /// Optional image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Optional shop URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl SupplyDraft {
    /// Checks field-level rules.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), GatewayError> {
        require_text("itemName", &self.item_name)?;
        require_text("unit", &self.unit)?;
        require_positive("quantityNeeded", self.quantity_needed)?;
        validate_url("imageUrl", self.image_url.as_deref())?;
        validate_url("url", self.url.as_deref())
    }

    /// Materializes the draft as a supply of `event_id`.
    #[must_use]
    pub fn into_supply(self, event_id: EventId) -> Supply {
        let now = Utc::now();
        Supply {
            id: SupplyId::new(),
            event_id,
            item_name: self.item_name,
            description: self.description,
            quantity_needed: self.quantity_needed,
            unit: self.unit,
            image_url: self.image_url,
            url: self.url,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a supply. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupplyPatch {
    /// New item name.
    #[serde(default)]
    pub item_name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New quantity needed.
    #[serde(default)]
    pub quantity_needed: Option<u32>,
    /// New unit.
    #[serde(default)]
    pub unit: Option<String>,
    /// New image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// New shop URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl SupplyPatch {
    /// Checks the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if let Some(name) = &self.item_name {
            require_text("itemName", name)?;
        }
        if let Some(unit) = &self.unit {
            require_text("unit", unit)?;
        }
        if let Some(quantity) = self.quantity_needed {
            require_positive("quantityNeeded", quantity)?;
        }
        validate_url("imageUrl", self.image_url.as_deref())?;
        validate_url("url", self.url.as_deref())
    }

    /// Applies the present fields to `supply` and bumps `updated_at`.
    pub fn apply(self, supply: &mut Supply) {
        if let Some(name) = self.item_name {
            supply.item_name = name;
        }
        if let Some(description) = self.description {
            supply.description = Some(description);
        }
        if let Some(quantity) = self.quantity_needed {
            supply.quantity_needed = quantity;
        }
        if let Some(unit) = self.unit {
            supply.unit = unit;
        }
        if let Some(image_url) = self.image_url {
            supply.image_url = Some(image_url);
        }
        if let Some(url) = self.url {
            supply.url = Some(url);
        }
        supply.updated_at = Utc::now();
    }
}

/// Fields of a new contribution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContributionDraft {
    /// Pledged quantity; at least 1.
    pub quantity_committed: u32,
    /// Optional note.
    #[serde(default)]
    pub notes: Option<String>,
}

impl ContributionDraft {
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if the quantity is zero.
    pub fn validate(&self) -> Result<(), GatewayError> {
        require_positive("quantityCommitted", self.quantity_committed)
    }
}

/// Partial update of a contribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContributionPatch {
    /// New pledged quantity; re-checked against the cap.
    #[serde(default)]
    pub quantity_committed: Option<u32>,
    /// New note.
    #[serde(default)]
    pub notes: Option<String>,
}

impl ContributionPatch {
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if a zero quantity is supplied.
    pub fn validate(&self) -> Result<(), GatewayError> {
        match self.quantity_committed {
            Some(quantity) => require_positive("quantityCommitted", quantity),
            None => Ok(()),
        }
    }
}

/// Outcome of a cap check that did not reject the pledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commitment {
    /// New total is at most the quantity needed.
    Within,
    /// New total exceeds the need but stays within the cap.
    OverNeeded {
        /// Advisory message returned to the caller.
        warning: String,
    },
}

impl Commitment {
    /// Returns the advisory warning, if any.
    #[must_use]
    pub fn into_warning(self) -> Option<String> {
        match self {
            Self::Within => None,
            Self::OverNeeded { warning } => Some(warning),
        }
    }
}

/// Largest total that may be pledged: `floor(needed × 1.2)`.
#[must_use]
pub fn max_allowed(quantity_needed: u32) -> u64 {
    u64::from(quantity_needed) * OVERCOMMIT_CAP_PERCENT / 100
}

/// Decides whether adding `quantity` to `current_total` is acceptable.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] when the new total exceeds
/// [`max_allowed`].
pub fn assess_commitment(
    supply: &Supply,
    current_total: u64,
    quantity: u32,
) -> Result<Commitment, GatewayError> {
    let new_total = current_total.saturating_add(u64::from(quantity));
    let cap = max_allowed(supply.quantity_needed);
    if new_total > cap {
        return Err(GatewayError::Validation(format!(
            "cannot commit {quantity} {unit}: {needed} needed, {current_total} already committed, at most {cap} allowed",
            unit = supply.unit,
            needed = supply.quantity_needed,
        )));
    }
    if new_total > u64::from(supply.quantity_needed) {
        return Ok(Commitment::OverNeeded {
            warning: format!(
                "commitment exceeds the quantity needed: {new_total} of {needed} {unit} committed",
                needed = supply.quantity_needed,
                unit = supply.unit,
            ),
        });
    }
    Ok(Commitment::Within)
}

/// Sums pledged quantities, optionally skipping one contribution.
#[must_use]
pub fn total_committed(contributions: &[Contribution], exclude: Option<ContributionId>) -> u64 {
    contributions
        .iter()
        .filter(|c| Some(c.id) != exclude)
        .map(|c| u64::from(c.quantity_committed))
        .sum()
}

/// `round(committed / needed × 100)`, rounding halves up; 0 when nothing
/// is needed.
#[must_use]
pub fn fulfillment_percentage(committed: u64, needed: u32) -> u64 {
    if needed == 0 {
        return 0;
    }
    let needed = u64::from(needed);
    (committed.saturating_mul(200).saturating_add(needed)) / (needed * 2)
}

/// Read aggregate of a supply with its pledge progress. This is what the
/// supply cache stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupplyProgress {
    /// Supply identifier.
    pub id: SupplyId,
    /// Owning event.
    pub event_id: EventId,
    /// Item name.
    pub item_name: String,
    /// Description.
    pub description: Option<String>,
    /// Quantity required.
    pub quantity_needed: u32,
    /// Unit.
    pub unit: String,
    /// Image URL.
    pub image_url: Option<String>,
    /// Shop URL.
    pub url: Option<String>,
    /// Sum of all pledges.
    pub quantity_committed: u64,
    /// Rounded pledge percentage.
    pub fulfillment_percentage: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SupplyProgress {
    /// Builds the aggregate of `supply` from its contributions.
    #[must_use]
    pub fn from_parts(supply: Supply, contributions: &[Contribution]) -> Self {
        let quantity_committed = total_committed(contributions, None);
        Self {
            fulfillment_percentage: fulfillment_percentage(quantity_committed, supply.quantity_needed),
            quantity_committed,
            id: supply.id,
            event_id: supply.event_id,
            item_name: supply.item_name,
            description: supply.description,
            quantity_needed: supply.quantity_needed,
            unit: supply.unit,
            image_url: supply.image_url,
            url: supply.url,
            created_at: supply.created_at,
            updated_at: supply.updated_at,
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

fn require_positive(field: &str, value: u32) -> Result<(), GatewayError> {
    if value == 0 {
        return Err(GatewayError::Validation(format!("{field} must be at least 1")));
    }
    Ok(())
}

pub(crate) fn validate_url(field: &str, value: Option<&str>) -> Result<(), GatewayError> {
    match value {
        Some(raw) => url::Url::parse(raw)
            .map(|_| ())
            .map_err(|e| GatewayError::Validation(format!("{field} is not a valid URL: {e}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn supply(needed: u32) -> Supply {
        SupplyDraft {
            item_name: "Soda".to_string(),
            description: None,
            quantity_needed: needed,
            unit: "bottles".to_string(),
            image_url: None,
            url: None,
        }
        .into_supply(EventId::new())
    }

    fn contribution(supply_id: SupplyId, quantity: u32) -> Contribution {
        let now = Utc::now();
        Contribution {
            id: ContributionId::new(),
            supply_id,
            user_id: UserId::new(),
            quantity_committed: quantity,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cap_is_floor_of_120_percent() {
        assert_eq!(max_allowed(10), 12);
        assert_eq!(max_allowed(4), 4);
        assert_eq!(max_allowed(7), 8);
        assert_eq!(max_allowed(0), 0);
    }

    #[test]
    fn twelve_of_ten_warns_and_thirteen_is_rejected() {
        let s = supply(10);
        let Ok(Commitment::OverNeeded { warning }) = assess_commitment(&s, 0, 12) else {
            panic!("12 of 10 should be accepted with a warning");
        };
        assert!(warning.contains("12 of 10"));

        let Err(err) = assess_commitment(&s, 0, 13) else {
            panic!("13 of 10 should be rejected");
        };
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn exact_need_has_no_warning() {
        let s = supply(10);
        assert_eq!(assess_commitment(&s, 6, 4).ok(), Some(Commitment::Within));
    }

    #[test]
    fn total_skips_excluded_contribution() {
        let s = supply(10);
        let a = contribution(s.id, 3);
        let b = contribution(s.id, 5);
        let all = vec![a.clone(), b];
        assert_eq!(total_committed(&all, None), 8);
        assert_eq!(total_committed(&all, Some(a.id)), 5);
    }

    #[test]
    fn fulfillment_handles_zero_and_rounding() {
        assert_eq!(fulfillment_percentage(5, 0), 0);
        assert_eq!(fulfillment_percentage(10, 10), 100);
        assert_eq!(fulfillment_percentage(1, 3), 33);
        assert_eq!(fulfillment_percentage(2, 3), 67);
        assert_eq!(fulfillment_percentage(1, 8), 13);
        assert_eq!(fulfillment_percentage(12, 10), 120);
    }

    #[test]
    fn progress_sums_contributions() {
        let s = supply(4);
        let contributions = vec![contribution(s.id, 1), contribution(s.id, 1)];
        let progress = SupplyProgress::from_parts(s, &contributions);
        assert_eq!(progress.quantity_committed, 2);
        assert_eq!(progress.fulfillment_percentage, 50);
    }

    #[test]
    fn draft_validation_rejects_bad_fields() {
        let mut draft = SupplyDraft {
            item_name: " ".to_string(),
            description: None,
            quantity_needed: 1,
            unit: "kg".to_string(),
            image_url: None,
            url: None,
        };
        assert!(draft.validate().is_err());
        draft.item_name = "Rice".to_string();
        assert!(draft.validate().is_ok());
        draft.quantity_needed = 0;
        assert!(draft.validate().is_err());
        draft.quantity_needed = 2;
        draft.url = Some("not a url".to_string());
        assert!(draft.validate().is_err());
        draft.url = Some("https://shop.example/rice".to_string());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut s = supply(10);
        let before = s.clone();
        SupplyPatch {
            quantity_needed: Some(20),
            ..SupplyPatch::default()
        }
        .apply(&mut s);
        assert_eq!(s.quantity_needed, 20);
        assert_eq!(s.item_name, before.item_name);
        assert_eq!(s.unit, before.unit);
    }

    #[test]
    fn zero_quantity_pledges_are_invalid() {
        let draft = ContributionDraft {
            quantity_committed: 0,
            notes: None,
        };
        assert!(draft.validate().is_err());
        let patch = ContributionPatch {
            quantity_committed: Some(0),
            notes: None,
        };
        assert!(patch.validate().is_err());
        assert!(ContributionPatch::default().validate().is_ok());
    }
}
