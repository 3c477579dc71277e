//! Read-only stores the triage queue fans out to besides the document repositories.

use serde::{Deserialize, Serialize};

use crate::workflows::documents::domain::ResidentId;
use crate::workflows::documents::repository::RepositoryError;

/// Emergency call raised by a resident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SosRecord {
    pub id: String,
    pub requester_id: ResidentId,
    pub status: String,
    pub emergency_type: String,
    pub description: String,
    pub created_at: String,
    #[serde(default)]
    pub responded_at: Option<String>,
}

/// Request to transfer residency between barangays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRecord {
    pub id: String,
    pub requester_id: ResidentId,
    pub status: String,
    pub from_barangay_id: String,
    pub to_barangay_id: String,
    pub created_at: String,
    #[serde(default)]
    pub processed_at: Option<String>,
}

/// Request to borrow an item from the barangay marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLoanRecord {
    pub id: String,
    pub requester_id: ResidentId,
    pub status: String,
    pub item_id: String,
    pub created_at: String,
    #[serde(default)]
    pub processed_at: Option<String>,
}

/// `status` is compared case-insensitively; `None` returns every record.
pub trait SosStore: Send + Sync {
    fn list(&self, status: Option<&str>) -> Result<Vec<SosRecord>, RepositoryError>;
}

pub trait RelocationStore: Send + Sync {
    fn list(&self, status: Option<&str>) -> Result<Vec<RelocationRecord>, RepositoryError>;
    fn barangay_name(&self, barangay_id: &str) -> Result<Option<String>, RepositoryError>;
}

pub trait ItemLoanStore: Send + Sync {
    fn list(&self, status: Option<&str>) -> Result<Vec<ItemLoanRecord>, RepositoryError>;
    fn item_title(&self, item_id: &str) -> Result<Option<String>, RepositoryError>;
}

/// Shared helper for store implementations filtering on a raw status string.
pub fn status_matches(filter: Option<&str>, status: &str) -> bool {
    filter.map_or(true, |wanted| wanted.trim().eq_ignore_ascii_case(status.trim()))
}
