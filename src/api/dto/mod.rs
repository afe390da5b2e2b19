//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies that map one-to-one onto a domain draft (`EventDraft`,
//! `SupplyDraft`, `ContributionDraft` and the patches) are used directly;
//! only shapes that exist purely on the wire live here.

pub mod participant_dto;
pub mod supply_dto;

pub use participant_dto::*;
pub use supply_dto::*;
