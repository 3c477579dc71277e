//! Civic document issuance: submission, approval with verification, and expiry.
//!
//! Requests move through a guarded state machine. Issuance mints a verification record,
//! renders and stores the certificate, and optionally e-mails it. Every mutation of a
//! single request is serialized through a per-id lock.

pub mod collaborators;
pub mod domain;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweeper;
pub mod verification;

#[cfg(test)]
pub(crate) mod tests;

pub use collaborators::{
    ArtifactRenderer, CollaboratorError, DocumentDelivery, FileStore, Notifier, RenderedArtifact,
};
pub use domain::{
    DeliveryInfo, DeliveryMethod, DocumentRequest, DocumentRequestId, DocumentRequestView,
    DocumentStatus, DocumentSubmission, DocumentType, DocumentTypeId, FileId, FileRef,
    RequirementUpload, ResidentContact, ResidentId, StaffId, StorageRef,
};
pub use lifecycle::{can_transition, TransitionError};
pub use repository::{
    DocumentRequestRepository, DocumentTypeRepository, PeopleDirectory, RepositoryError,
    RequestFilter,
};
pub use router::document_router;
pub use service::{
    CascadeFailure, CascadeReport, DocumentIssuanceService, DocumentPorts, DocumentServiceError,
    IssuanceOutcome, NotificationStatus, TypeDeletionReport,
};
pub use sweeper::{SweepFailure, SweepReport, SweepScope};
pub use verification::{
    IssuanceSnapshot, VerificationCode, VerificationOutcome, VerificationRecord,
    VerificationRegistry, VerificationStore,
};
