use serde::{Deserialize, Serialize};

use super::domain::{
    DocumentRequest, DocumentRequestId, DocumentStatus, DocumentType, DocumentTypeId,
    ResidentContact, ResidentId, StaffId,
};

/// Predicate pushed down to the request store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub status: Option<DocumentStatus>,
    pub document_type_id: Option<DocumentTypeId>,
    pub requester_id: Option<ResidentId>,
}

impl RequestFilter {
    pub fn with_status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn for_type(document_type_id: DocumentTypeId) -> Self {
        Self {
            document_type_id: Some(document_type_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &DocumentRequest) -> bool {
        self.status.map_or(true, |status| request.status == status)
            && self
                .document_type_id
                .as_ref()
                .map_or(true, |id| &request.document_type_id == id)
            && self
                .requester_id
                .as_ref()
                .map_or(true, |id| &request.requester_id == id)
    }
}

/// Storage abstraction for document requests.
pub trait DocumentRequestRepository: Send + Sync {
    fn insert(&self, request: DocumentRequest) -> Result<DocumentRequest, RepositoryError>;
    fn update(&self, request: DocumentRequest) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &DocumentRequestId) -> Result<Option<DocumentRequest>, RepositoryError>;
    /// Matching requests ordered by `created_at`, newest first.
    fn find(&self, filter: &RequestFilter) -> Result<Vec<DocumentRequest>, RepositoryError>;
}

/// Storage abstraction for document type reference data.
pub trait DocumentTypeRepository: Send + Sync {
    fn fetch(&self, id: &DocumentTypeId) -> Result<Option<DocumentType>, RepositoryError>;
    fn delete(&self, id: &DocumentTypeId) -> Result<(), RepositoryError>;
}

/// Read-only view of the people registry owned by the accounts subsystem.
pub trait PeopleDirectory: Send + Sync {
    fn resident(&self, id: &ResidentId) -> Result<Option<ResidentContact>, RepositoryError>;
    fn staff_name(&self, id: &StaffId) -> Result<Option<String>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
