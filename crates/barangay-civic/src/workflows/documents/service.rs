use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{IssuanceConfig, TenantConfig};

use super::collaborators::{
    ArtifactRenderer, CollaboratorError, DocumentDelivery, FileStore, Notifier,
};
use super::domain::{
    DeliveryMethod, DocumentRequest, DocumentRequestId, DocumentStatus, DocumentSubmission,
    DocumentType, DocumentTypeId, FileId, FileRef, RequirementUpload, ResidentContact,
    ResidentId, StaffId, StorageRef,
};
use super::lifecycle::{ensure_transition, RequestLocks, TransitionError};
use super::repository::{
    DocumentRequestRepository, DocumentTypeRepository, PeopleDirectory, RepositoryError,
    RequestFilter,
};
use super::sweeper::{is_sweepable, ExpirationSweeper, SweepReport, SweepScope};
use super::verification::{
    IssuanceSnapshot, VerificationCode, VerificationError, VerificationOutcome,
    VerificationRecord, VerificationRegistry, VerificationStore,
};

/// Storage and collaborator handles the issuance service is built from.
#[derive(Clone)]
pub struct DocumentPorts {
    pub requests: Arc<dyn DocumentRequestRepository>,
    pub types: Arc<dyn DocumentTypeRepository>,
    pub people: Arc<dyn PeopleDirectory>,
    pub verifications: Arc<dyn VerificationStore>,
    pub renderer: Arc<dyn ArtifactRenderer>,
    pub notifier: Arc<dyn Notifier>,
    pub files: Arc<dyn FileStore>,
}

/// Owns the document request lifecycle from submission to expiry.
pub struct DocumentIssuanceService {
    ports: DocumentPorts,
    tenant: TenantConfig,
    config: IssuanceConfig,
    locks: Arc<RequestLocks>,
    registry: VerificationRegistry,
    sweeper: ExpirationSweeper,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static FILE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> DocumentRequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentRequestId(format!("docreq-{id:06}"))
}

fn next_file_id() -> FileId {
    let id = FILE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    FileId(format!("file-{id:06}"))
}

/// Outcome of a successful issuance.
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceOutcome {
    pub request: DocumentRequest,
    pub verification: VerificationRecord,
    pub notification: NotificationStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NotificationStatus {
    NotRequested,
    Sent,
    Failed { reason: String },
}

/// Requests cancelled because their document type was force-deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub cancelled: Vec<DocumentRequestId>,
    pub deleted_artifacts: Vec<StorageRef>,
    pub failures: Vec<CascadeFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeFailure {
    pub request_id: DocumentRequestId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDeletionReport {
    pub document_type_id: DocumentTypeId,
    pub cascade: CascadeReport,
}

impl DocumentIssuanceService {
    pub fn new(ports: DocumentPorts, tenant: TenantConfig, config: IssuanceConfig) -> Self {
        let registry = VerificationRegistry::new(
            ports.verifications.clone(),
            ports.requests.clone(),
            config.code_mint_attempts,
        );
        Self::with_registry(ports, tenant, config, registry)
    }

    pub fn with_registry(
        ports: DocumentPorts,
        tenant: TenantConfig,
        config: IssuanceConfig,
        registry: VerificationRegistry,
    ) -> Self {
        let locks = Arc::new(RequestLocks::default());
        let sweeper = ExpirationSweeper::new(
            ports.requests.clone(),
            ports.types.clone(),
            ports.files.clone(),
            locks.clone(),
            config.sweep_by_type_honors_auto_delete,
        );

        Self {
            ports,
            tenant,
            config,
            locks,
            registry,
            sweeper,
        }
    }

    pub fn tenant(&self) -> &TenantConfig {
        &self.tenant
    }

    /// Create a pending request, saving its requirement files as one batch.
    pub fn submit(
        &self,
        submission: DocumentSubmission,
        now: DateTime<Utc>,
    ) -> Result<DocumentRequest, DocumentServiceError> {
        let DocumentSubmission {
            requester_id,
            document_type_id,
            purpose,
            quantity,
            delivery,
            files,
        } = submission;

        if document_type_id.0.trim().is_empty() {
            return Err(DocumentServiceError::Validation(
                "document type is required".to_string(),
            ));
        }
        if quantity == 0 {
            return Err(DocumentServiceError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        for upload in &files {
            validate_upload(upload)?;
        }

        let document_type = self.document_type(&document_type_id)?;
        if !document_type.is_active {
            return Err(DocumentServiceError::Validation(format!(
                "document type {} is not accepting requests",
                document_type.name
            )));
        }

        let requester = self.resident(&requester_id)?;
        match delivery.method {
            DeliveryMethod::Email if requester.email.is_none() => {
                return Err(DocumentServiceError::Validation(
                    "e-mail delivery requires an e-mail address on file".to_string(),
                ));
            }
            DeliveryMethod::Mail if blank(delivery.address.as_deref()) => {
                return Err(DocumentServiceError::Validation(
                    "mail delivery requires a delivery address".to_string(),
                ));
            }
            _ => {}
        }

        let id = next_request_id();
        let saved = self.save_uploads(&id, files)?;

        let request = DocumentRequest {
            id: id.clone(),
            barangay_id: self.tenant.barangay_id.clone(),
            document_type_id,
            requester_id,
            status: DocumentStatus::Pending,
            purpose: purpose.filter(|value| !value.trim().is_empty()),
            quantity,
            delivery,
            requirement_files: saved.clone(),
            verification_code: None,
            expires_at: None,
            is_expired: false,
            processed_by: None,
            processed_at: None,
            processing_notes: None,
            rejection_reason: None,
            artifact_ref: None,
            created_at: now,
            updated_at: now,
        };

        match self.ports.requests.insert(request) {
            Ok(stored) => {
                info!(
                    request_id = %stored.id.0,
                    document_type = %document_type.name,
                    files = stored.requirement_files.len(),
                    "document request submitted"
                );
                Ok(stored)
            }
            Err(err) => {
                self.discard_files(&saved);
                Err(err.into())
            }
        }
    }

    /// Approve a pending request and issue its document in one step.
    ///
    /// Rendering or storage failure leaves the request `Pending` with no verification
    /// record and no artifact. Notification failure only produces a warning.
    pub fn approve_and_issue(
        &self,
        request_id: &DocumentRequestId,
        admin_id: &StaffId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<IssuanceOutcome, DocumentServiceError> {
        let slot = self.locks.lease(request_id);
        let _guard = slot.hold();

        let mut request = self.load(request_id)?;
        if request.status != DocumentStatus::Pending {
            return Err(DocumentServiceError::StateConflict(format!(
                "document request {} is {}; only pending requests can be approved",
                request.id.0,
                request.status.label()
            )));
        }
        ensure_transition(request.status, DocumentStatus::Ready)?;

        let document_type = self.document_type(&request.document_type_id)?;
        let requester = self.resident(&request.requester_id)?;
        let issuer_name = self
            .ports
            .people
            .staff_name(admin_id)?
            .ok_or_else(|| DocumentServiceError::not_found("staff member", &admin_id.0))?;

        let snapshot = IssuanceSnapshot {
            request_id: request.id.clone(),
            requester_name: requester.full_name(),
            document_type_name: document_type.name.clone(),
            issuer_name,
            barangay_name: self.tenant.barangay_name.clone(),
            purpose: request.purpose.clone(),
            quantity: request.quantity,
            issued_at: now,
            expires_at: document_type.expiry_from(now),
        };

        let record = self.registry.issue(snapshot.clone())?;

        let artifact = match self.store_artifact(&snapshot, now) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(request_id = %request.id.0, error = %err, "issuance rolled back: artifact not stored");
                self.revoke(&record.code);
                return Err(err);
            }
        };

        request.status = DocumentStatus::Ready;
        request.verification_code = Some(record.code.clone());
        request.expires_at = snapshot.expires_at;
        request.artifact_ref = Some(artifact.clone());
        request.processed_by = Some(admin_id.clone());
        request.processed_at = Some(now);
        request.processing_notes = notes.filter(|value| !value.trim().is_empty());
        request.updated_at = now;

        if let Err(err) = self.ports.requests.update(request.clone()) {
            warn!(request_id = %request.id.0, error = %err, "issuance rolled back: request not persisted");
            self.discard_artifact(&artifact);
            self.revoke(&record.code);
            return Err(err.into());
        }

        info!(
            request_id = %request.id.0,
            admin_id = %admin_id.0,
            expires_at = ?request.expires_at,
            "document issued"
        );

        let notification = self.notify(&request, &requester, &artifact, &snapshot);
        let warnings = match &notification {
            NotificationStatus::Failed { reason } => {
                vec![format!("document issued but e-mail delivery failed: {reason}")]
            }
            _ => Vec::new(),
        };

        Ok(IssuanceOutcome {
            request,
            verification: record,
            notification,
            warnings,
        })
    }

    pub fn reject(
        &self,
        request_id: &DocumentRequestId,
        admin_id: &StaffId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<DocumentRequest, DocumentServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DocumentServiceError::Validation(
                "rejection reason is required".to_string(),
            ));
        }

        let slot = self.locks.lease(request_id);
        let _guard = slot.hold();

        let mut request = self.load(request_id)?;
        if request.status != DocumentStatus::Pending {
            return Err(DocumentServiceError::StateConflict(format!(
                "document request {} is {}; only pending requests can be rejected",
                request.id.0,
                request.status.label()
            )));
        }
        ensure_transition(request.status, DocumentStatus::Rejected)?;

        request.status = DocumentStatus::Rejected;
        request.rejection_reason = Some(reason.to_string());
        request.processed_by = Some(admin_id.clone());
        request.processed_at = Some(now);
        request.updated_at = now;
        self.ports.requests.update(request.clone())?;

        info!(request_id = %request.id.0, admin_id = %admin_id.0, "document request rejected");
        Ok(request)
    }

    /// Record that an issued document was released to the resident.
    pub fn mark_completed(
        &self,
        request_id: &DocumentRequestId,
        admin_id: &StaffId,
        now: DateTime<Utc>,
    ) -> Result<DocumentRequest, DocumentServiceError> {
        let slot = self.locks.lease(request_id);
        let _guard = slot.hold();

        let mut request = self.load(request_id)?;
        ensure_transition(request.status, DocumentStatus::Completed)?;
        if request.is_document_expired(now) {
            return Err(DocumentServiceError::StateConflict(format!(
                "document request {} has expired and cannot be released",
                request.id.0
            )));
        }

        request.status = DocumentStatus::Completed;
        request.updated_at = now;
        self.ports.requests.update(request.clone())?;

        info!(request_id = %request.id.0, admin_id = %admin_id.0, "document released");
        Ok(request)
    }

    /// Resident-initiated cancellation of their own open request.
    pub fn cancel_request(
        &self,
        request_id: &DocumentRequestId,
        requester_id: &ResidentId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DocumentRequest, DocumentServiceError> {
        let slot = self.locks.lease(request_id);
        let _guard = slot.hold();

        let mut request = self.load(request_id)?;
        if &request.requester_id != requester_id {
            return Err(DocumentServiceError::AccessDenied(format!(
                "document request {} belongs to another resident",
                request.id.0
            )));
        }
        ensure_transition(request.status, DocumentStatus::Cancelled)?;

        let artifact = request.artifact_ref.take();
        request.status = DocumentStatus::Cancelled;
        request.rejection_reason = Some(
            reason
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "Cancelled by requester".to_string()),
        );
        request.updated_at = now;
        self.ports.requests.update(request.clone())?;
        if let Some(artifact) = artifact {
            self.discard_artifact(&artifact);
        }

        info!(request_id = %request.id.0, "document request cancelled by requester");
        Ok(request)
    }

    pub fn attach_requirement_file(
        &self,
        request_id: &DocumentRequestId,
        upload: RequirementUpload,
        now: DateTime<Utc>,
    ) -> Result<Vec<FileRef>, DocumentServiceError> {
        validate_upload(&upload)?;

        let slot = self.locks.lease(request_id);
        let _guard = slot.hold();

        let mut request = self.load(request_id)?;
        ensure_files_mutable(&request)?;

        let mut saved = self.save_uploads(&request.id, vec![upload])?;
        let Some(file) = saved.pop() else {
            return Ok(request.requirement_files);
        };
        request.add_requirement_file(file.clone());
        request.updated_at = now;

        if let Err(err) = self.ports.requests.update(request.clone()) {
            self.discard_files(std::slice::from_ref(&file));
            return Err(err.into());
        }

        info!(request_id = %request.id.0, file_id = %file.id.0, "requirement file attached");
        Ok(request.requirement_files)
    }

    pub fn remove_requirement_file(
        &self,
        request_id: &DocumentRequestId,
        file_id: &FileId,
        now: DateTime<Utc>,
    ) -> Result<Vec<FileRef>, DocumentServiceError> {
        let slot = self.locks.lease(request_id);
        let _guard = slot.hold();

        let mut request = self.load(request_id)?;
        ensure_files_mutable(&request)?;

        let removed = request
            .remove_requirement_file(file_id)
            .ok_or_else(|| DocumentServiceError::not_found("requirement file", &file_id.0))?;
        request.updated_at = now;
        self.ports.requests.update(request.clone())?;

        self.discard_files(std::slice::from_ref(&removed));
        info!(request_id = %request.id.0, file_id = %file_id.0, "requirement file removed");
        Ok(request.requirement_files)
    }

    /// Cancel every open request of a deleted document type, collecting failures.
    pub fn cancel_for_deleted_type(
        &self,
        document_type_id: &DocumentTypeId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<CascadeReport, DocumentServiceError> {
        let reason = reason.trim();
        let cancellation_reason = if reason.is_empty() {
            "Document type was deleted by admin".to_string()
        } else {
            format!("Document type deleted: {reason}")
        };

        let mut report = CascadeReport::default();
        let candidates = self
            .ports
            .requests
            .find(&RequestFilter::for_type(document_type_id.clone()))?;

        for candidate in candidates {
            if candidate.status.is_terminal() {
                continue;
            }
            match self.cancel_one(&candidate.id, &cancellation_reason, now, &mut report) {
                Ok(true) => report.cancelled.push(candidate.id.clone()),
                Ok(false) => {}
                Err(err) => {
                    warn!(request_id = %candidate.id.0, error = %err, "cascade cancellation failed");
                    report.failures.push(CascadeFailure {
                        request_id: candidate.id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        info!(
            document_type_id = %document_type_id.0,
            cancelled = report.cancelled.len(),
            failures = report.failures.len(),
            "document type cascade finished"
        );
        Ok(report)
    }

    /// Remove a document type. Without `force`, types that still have requests are kept.
    pub fn delete_document_type(
        &self,
        document_type_id: &DocumentTypeId,
        force: bool,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<TypeDeletionReport, DocumentServiceError> {
        let document_type = self.document_type(document_type_id)?;
        let existing = self
            .ports
            .requests
            .find(&RequestFilter::for_type(document_type_id.clone()))?;

        if !existing.is_empty() && !force {
            return Err(DocumentServiceError::StateConflict(format!(
                "cannot delete document type {}: {} existing requests",
                document_type.name,
                existing.len()
            )));
        }

        let cascade = if existing.is_empty() {
            CascadeReport::default()
        } else {
            self.cancel_for_deleted_type(document_type_id, reason, now)?
        };

        self.ports.types.delete(document_type_id)?;
        info!(document_type = %document_type.name, forced = force, "document type deleted");

        Ok(TypeDeletionReport {
            document_type_id: document_type_id.clone(),
            cascade,
        })
    }

    pub fn verify(
        &self,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, DocumentServiceError> {
        Ok(self.registry.verify(code, now)?)
    }

    /// Retire expired issued documents, optionally for one document type.
    pub fn sweep_expired(
        &self,
        document_type_id: Option<&DocumentTypeId>,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, DocumentServiceError> {
        let scope = match document_type_id {
            Some(type_id) => {
                self.document_type(type_id)?;
                SweepScope::DocumentType(type_id.clone())
            }
            None => SweepScope::All,
        };
        Ok(self.sweeper.sweep(&scope, now)?)
    }

    /// Issued documents past expiry that no sweep has retired yet.
    pub fn expired_awaiting_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentRequest>, DocumentServiceError> {
        let ready = self
            .ports
            .requests
            .find(&RequestFilter::with_status(DocumentStatus::Ready))?;
        Ok(ready
            .into_iter()
            .filter(|request| is_sweepable(request, now))
            .collect())
    }

    pub fn get(
        &self,
        request_id: &DocumentRequestId,
    ) -> Result<DocumentRequest, DocumentServiceError> {
        self.load(request_id)
    }

    pub fn list_for_requester(
        &self,
        requester_id: &ResidentId,
    ) -> Result<Vec<DocumentRequest>, DocumentServiceError> {
        let filter = RequestFilter {
            requester_id: Some(requester_id.clone()),
            ..RequestFilter::default()
        };
        Ok(self.ports.requests.find(&filter)?)
    }

    pub fn verification_record(
        &self,
        request_id: &DocumentRequestId,
    ) -> Result<Option<VerificationRecord>, DocumentServiceError> {
        Ok(self.registry.record_for(request_id)?)
    }

    #[cfg(test)]
    pub(crate) fn held_lock_slots(&self) -> usize {
        self.locks.len()
    }

    fn cancel_one(
        &self,
        request_id: &DocumentRequestId,
        reason: &str,
        now: DateTime<Utc>,
        report: &mut CascadeReport,
    ) -> Result<bool, DocumentServiceError> {
        let slot = self.locks.lease(request_id);
        let _guard = slot.hold();

        let mut request = self.load(request_id)?;
        if request.status.is_terminal() {
            return Ok(false);
        }
        ensure_transition(request.status, DocumentStatus::Cancelled)?;

        let artifact = request.artifact_ref.take();
        request.status = DocumentStatus::Cancelled;
        request.rejection_reason = Some(reason.to_string());
        request.updated_at = now;
        self.ports.requests.update(request)?;

        if let Some(artifact) = artifact {
            match self.ports.files.delete(&artifact) {
                Ok(true) => report.deleted_artifacts.push(artifact),
                Ok(false) => {}
                Err(err) => report.failures.push(CascadeFailure {
                    request_id: request_id.clone(),
                    reason: format!("artifact {} not deleted: {err}", artifact.0),
                }),
            }
        }
        Ok(true)
    }

    fn load(&self, request_id: &DocumentRequestId) -> Result<DocumentRequest, DocumentServiceError> {
        self.ports
            .requests
            .fetch(request_id)?
            .ok_or_else(|| DocumentServiceError::not_found("document request", &request_id.0))
    }

    fn document_type(
        &self,
        document_type_id: &DocumentTypeId,
    ) -> Result<DocumentType, DocumentServiceError> {
        self.ports
            .types
            .fetch(document_type_id)?
            .ok_or_else(|| DocumentServiceError::not_found("document type", &document_type_id.0))
    }

    fn resident(&self, resident_id: &ResidentId) -> Result<ResidentContact, DocumentServiceError> {
        self.ports
            .people
            .resident(resident_id)?
            .ok_or_else(|| DocumentServiceError::not_found("resident", &resident_id.0))
    }

    fn save_uploads(
        &self,
        request_id: &DocumentRequestId,
        uploads: Vec<RequirementUpload>,
    ) -> Result<Vec<FileRef>, DocumentServiceError> {
        let mut saved: Vec<FileRef> = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let file_id = next_file_id();
            let path = format!(
                "{}/{}/{}-{}",
                self.config.requirement_prefix,
                request_id.0,
                file_id.0,
                sanitize_file_name(&upload.file_name)
            );
            match self.ports.files.save(&upload.bytes, &path) {
                Ok(storage_ref) => saved.push(FileRef {
                    id: file_id,
                    file_name: upload.file_name,
                    content_type: upload.content_type,
                    storage_ref,
                }),
                Err(err) => {
                    warn!(request_id = %request_id.0, file = %upload.file_name, error = %err, "requirement upload failed, discarding batch");
                    self.discard_files(&saved);
                    return Err(err.into());
                }
            }
        }
        Ok(saved)
    }

    fn store_artifact(
        &self,
        snapshot: &IssuanceSnapshot,
        now: DateTime<Utc>,
    ) -> Result<StorageRef, DocumentServiceError> {
        let artifact = self.ports.renderer.render(snapshot)?;
        let path = format!(
            "{}/document_{}_{}.{}",
            self.config.artifact_prefix,
            snapshot.request_id.0,
            now.format("%Y%m%d_%H%M%S"),
            artifact.extension()
        );
        Ok(self.ports.files.save(&artifact.bytes, &path)?)
    }

    fn notify(
        &self,
        request: &DocumentRequest,
        requester: &ResidentContact,
        artifact: &StorageRef,
        snapshot: &IssuanceSnapshot,
    ) -> NotificationStatus {
        if request.delivery.method != DeliveryMethod::Email {
            return NotificationStatus::NotRequested;
        }
        let Some(email) = requester.email.clone() else {
            warn!(request_id = %request.id.0, "e-mail delivery requested but no address on file");
            return NotificationStatus::Failed {
                reason: "requester has no e-mail address".to_string(),
            };
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("request_id".to_string(), request.id.0.clone());
        metadata.insert(
            "document_type".to_string(),
            snapshot.document_type_name.clone(),
        );
        metadata.insert("barangay".to_string(), snapshot.barangay_name.clone());
        if let Some(code) = &request.verification_code {
            metadata.insert("verification_code".to_string(), code.0.clone());
        }
        if let Some(expires_at) = request.expires_at {
            metadata.insert("expires_at".to_string(), expires_at.to_rfc3339());
        }

        let delivery = DocumentDelivery {
            email,
            recipient_name: snapshot.requester_name.clone(),
            artifact_ref: artifact.clone(),
            metadata,
        };

        match self.ports.notifier.deliver(delivery) {
            Ok(true) => {
                info!(request_id = %request.id.0, "document e-mail sent");
                NotificationStatus::Sent
            }
            Ok(false) => {
                warn!(request_id = %request.id.0, "document e-mail declined by transport");
                NotificationStatus::Failed {
                    reason: "notifier declined the delivery".to_string(),
                }
            }
            Err(err) => {
                warn!(request_id = %request.id.0, error = %err, "document e-mail failed");
                NotificationStatus::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn revoke(&self, code: &VerificationCode) {
        if let Err(err) = self.registry.revoke(code) {
            warn!(code = %code.0, error = %err, "failed to revoke verification record during rollback");
        }
    }

    fn discard_artifact(&self, artifact: &StorageRef) {
        if let Err(err) = self.ports.files.delete(artifact) {
            warn!(artifact = %artifact.0, error = %err, "failed to delete artifact");
        }
    }

    fn discard_files(&self, files: &[FileRef]) {
        for file in files {
            if let Err(err) = self.ports.files.delete(&file.storage_ref) {
                warn!(file_id = %file.id.0, error = %err, "failed to delete requirement file");
            }
        }
    }
}

impl std::fmt::Debug for DocumentIssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIssuanceService")
            .field("tenant", &self.tenant)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn validate_upload(upload: &RequirementUpload) -> Result<(), DocumentServiceError> {
    if upload.file_name.trim().is_empty() {
        return Err(DocumentServiceError::Validation(
            "requirement file name is required".to_string(),
        ));
    }
    if upload.bytes.is_empty() {
        return Err(DocumentServiceError::Validation(format!(
            "requirement file {} is empty",
            upload.file_name
        )));
    }
    Ok(())
}

fn ensure_files_mutable(request: &DocumentRequest) -> Result<(), DocumentServiceError> {
    if request.status.allows_file_changes() {
        Ok(())
    } else {
        Err(DocumentServiceError::StateConflict(format!(
            "requirement files of document request {} are locked while {}",
            request.id.0,
            request.status.label()
        )))
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |value| value.trim().is_empty())
}

fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Error raised by the document issuance service.
#[derive(Debug, thiserror::Error)]
pub enum DocumentServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("dependency failure: {0}")]
    Dependency(#[from] CollaboratorError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl DocumentServiceError {
    fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable error kind for API payloads.
    pub const fn kind(&self) -> &'static str {
        match self {
            DocumentServiceError::Validation(_) => "validation_error",
            DocumentServiceError::NotFound { .. } => "not_found",
            DocumentServiceError::StateConflict(_) => "state_conflict",
            DocumentServiceError::AccessDenied(_) => "access_denied",
            DocumentServiceError::Dependency(_) => "dependency_failure",
            DocumentServiceError::Repository(_) => "storage_unavailable",
        }
    }
}

impl From<RepositoryError> for DocumentServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict => {
                DocumentServiceError::StateConflict("record was modified concurrently".to_string())
            }
            RepositoryError::NotFound => DocumentServiceError::NotFound {
                entity: "record",
                id: String::new(),
            },
            other => DocumentServiceError::Repository(other),
        }
    }
}

impl From<TransitionError> for DocumentServiceError {
    fn from(err: TransitionError) -> Self {
        DocumentServiceError::StateConflict(err.to_string())
    }
}

impl From<VerificationError> for DocumentServiceError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::AlreadyIssued(_) => {
                DocumentServiceError::StateConflict(err.to_string())
            }
            VerificationError::CodeSpaceExhausted(_) => DocumentServiceError::Dependency(
                CollaboratorError::unavailable("verification registry", err.to_string()),
            ),
            VerificationError::Repository(inner) => inner.into(),
        }
    }
}
