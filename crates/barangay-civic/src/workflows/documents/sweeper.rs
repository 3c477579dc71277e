use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::collaborators::FileStore;
use super::domain::{DocumentRequest, DocumentRequestId, DocumentStatus, DocumentTypeId, StorageRef};
use super::lifecycle::{ensure_transition, RequestLocks};
use super::repository::{
    DocumentRequestRepository, DocumentTypeRepository, RepositoryError, RequestFilter,
};

/// Which issued documents a sweep considers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepScope {
    /// Every type whose `auto_delete_expired` flag is set.
    All,
    DocumentType(DocumentTypeId),
}

/// Result of a sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub count: usize,
    pub expired_request_ids: Vec<DocumentRequestId>,
    pub removed_artifact_refs: Vec<StorageRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub request_id: DocumentRequestId,
    pub reason: String,
}

/// Base selection predicate shared by both sweep modes.
pub fn is_sweepable(request: &DocumentRequest, now: DateTime<Utc>) -> bool {
    request.status == DocumentStatus::Ready
        && !request.is_expired
        && request.expires_at.is_some_and(|expires_at| expires_at < now)
}

/// Retires issued documents whose validity window has closed.
pub struct ExpirationSweeper {
    requests: Arc<dyn DocumentRequestRepository>,
    types: Arc<dyn DocumentTypeRepository>,
    files: Arc<dyn FileStore>,
    locks: Arc<RequestLocks>,
    by_type_honors_auto_delete: bool,
}

impl ExpirationSweeper {
    pub fn new(
        requests: Arc<dyn DocumentRequestRepository>,
        types: Arc<dyn DocumentTypeRepository>,
        files: Arc<dyn FileStore>,
        locks: Arc<RequestLocks>,
        by_type_honors_auto_delete: bool,
    ) -> Self {
        Self {
            requests,
            types,
            files,
            locks,
            by_type_honors_auto_delete,
        }
    }

    /// Ready requests past expiry that the given scope would retire.
    pub fn candidates(
        &self,
        scope: &SweepScope,
        now: DateTime<Utc>,
    ) -> Result<Vec<DocumentRequest>, RepositoryError> {
        let mut filter = RequestFilter::with_status(DocumentStatus::Ready);
        if let SweepScope::DocumentType(type_id) = scope {
            filter.document_type_id = Some(type_id.clone());
        }

        let honor_flag = match scope {
            SweepScope::All => true,
            SweepScope::DocumentType(_) => self.by_type_honors_auto_delete,
        };

        let mut auto_delete: HashMap<DocumentTypeId, bool> = HashMap::new();
        let mut selected = Vec::new();
        for request in self.requests.find(&filter)? {
            if !is_sweepable(&request, now) {
                continue;
            }
            if honor_flag && !self.auto_delete_enabled(&request.document_type_id, &mut auto_delete)? {
                continue;
            }
            selected.push(request);
        }
        Ok(selected)
    }

    pub fn sweep(
        &self,
        scope: &SweepScope,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, RepositoryError> {
        let mut report = SweepReport::default();

        for candidate in self.candidates(scope, now)? {
            let slot = self.locks.lease(&candidate.id);
            let _guard = slot.hold();

            // Re-read under the lock; a concurrent transition may have moved it.
            let mut request = match self.requests.fetch(&candidate.id)? {
                Some(request) if is_sweepable(&request, now) => request,
                _ => continue,
            };
            if ensure_transition(request.status, DocumentStatus::Expired).is_err() {
                continue;
            }

            let artifact = request.artifact_ref.take();
            request.is_expired = true;
            request.status = DocumentStatus::Expired;
            request.updated_at = now;
            if let Err(err) = self.requests.update(request) {
                warn!(request_id = %candidate.id.0, error = %err, "failed to retire expired document");
                report.failures.push(SweepFailure {
                    request_id: candidate.id.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
            report.count += 1;
            report.expired_request_ids.push(candidate.id.clone());

            if let Some(artifact) = artifact {
                match self.files.delete(&artifact) {
                    Ok(true) => report.removed_artifact_refs.push(artifact),
                    Ok(false) => {
                        warn!(request_id = %candidate.id.0, artifact = %artifact.0, "expired artifact already missing")
                    }
                    Err(err) => {
                        warn!(request_id = %candidate.id.0, error = %err, "failed to delete expired artifact")
                    }
                }
            }
        }
        info!(
            scope = ?scope,
            count = report.count,
            removed_artifacts = report.removed_artifact_refs.len(),
            failures = report.failures.len(),
            "expired document sweep finished"
        );
        Ok(report)
    }

    fn auto_delete_enabled(
        &self,
        type_id: &DocumentTypeId,
        cache: &mut HashMap<DocumentTypeId, bool>,
    ) -> Result<bool, RepositoryError> {
        if let Some(enabled) = cache.get(type_id) {
            return Ok(*enabled);
        }
        // Requests whose type vanished are left for the deletion cascade.
        let enabled = self
            .types
            .fetch(type_id)?
            .is_some_and(|document_type| document_type.auto_delete_expired);
        cache.insert(type_id.clone(), enabled);
        Ok(enabled)
    }
}

impl std::fmt::Debug for ExpirationSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirationSweeper")
            .field("by_type_honors_auto_delete", &self.by_type_honors_auto_delete)
            .finish_non_exhaustive()
    }
}
