use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{DocumentRequest, DocumentRequestId};
use super::repository::{DocumentRequestRepository, RepositoryError};

/// Random token printed on an issued certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerificationCode(pub String);

impl VerificationCode {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Names frozen at issuance time. Later renames never alter a verification answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceSnapshot {
    pub request_id: DocumentRequestId,
    pub requester_name: String,
    pub document_type_name: String,
    pub issuer_name: String,
    pub barangay_name: String,
    pub purpose: Option<String>,
    pub quantity: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Immutable proof-of-issuance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub code: VerificationCode,
    pub request_id: DocumentRequestId,
    pub issued_at: DateTime<Utc>,
    pub snapshot: IssuanceSnapshot,
}

/// Unique-index storage for verification records.
///
/// `insert` must fail with [`RepositoryError::Conflict`] when the code is taken.
pub trait VerificationStore: Send + Sync {
    fn insert(&self, record: VerificationRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, code: &VerificationCode) -> Result<Option<VerificationRecord>, RepositoryError>;
    fn fetch_for_request(
        &self,
        request_id: &DocumentRequestId,
    ) -> Result<Option<VerificationRecord>, RepositoryError>;
    /// Only used to undo a record whose issuance failed before commit.
    fn remove(&self, code: &VerificationCode) -> Result<(), RepositoryError>;
}

/// Answer to a public verification lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VerificationOutcome {
    NotFound,
    Expired {
        snapshot: IssuanceSnapshot,
        expires_at: Option<DateTime<Utc>>,
    },
    Valid {
        snapshot: IssuanceSnapshot,
        status: &'static str,
        expires_at: Option<DateTime<Utc>>,
        days_until_expiry: Option<i64>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("document request {0:?} already has a verification record")]
    AlreadyIssued(DocumentRequestId),
    #[error("could not mint a unique verification code after {0} attempts")]
    CodeSpaceExhausted(u8),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

type CodeGenerator = dyn Fn() -> VerificationCode + Send + Sync;

/// Issues and checks verification codes.
pub struct VerificationRegistry {
    store: Arc<dyn VerificationStore>,
    requests: Arc<dyn DocumentRequestRepository>,
    generate: Arc<CodeGenerator>,
    attempts: u8,
}

impl VerificationRegistry {
    pub fn new(
        store: Arc<dyn VerificationStore>,
        requests: Arc<dyn DocumentRequestRepository>,
        attempts: u8,
    ) -> Self {
        Self::with_generator(store, requests, attempts, VerificationCode::random)
    }

    pub fn with_generator<G>(
        store: Arc<dyn VerificationStore>,
        requests: Arc<dyn DocumentRequestRepository>,
        attempts: u8,
        generate: G,
    ) -> Self
    where
        G: Fn() -> VerificationCode + Send + Sync + 'static,
    {
        Self {
            store,
            requests,
            generate: Arc::new(generate),
            attempts: attempts.max(1),
        }
    }

    /// Mint the single verification record for `snapshot.request_id`.
    pub fn issue(&self, snapshot: IssuanceSnapshot) -> Result<VerificationRecord, VerificationError> {
        if self.store.fetch_for_request(&snapshot.request_id)?.is_some() {
            return Err(VerificationError::AlreadyIssued(snapshot.request_id));
        }

        for attempt in 1..=self.attempts {
            let record = VerificationRecord {
                code: (self.generate)(),
                request_id: snapshot.request_id.clone(),
                issued_at: snapshot.issued_at,
                snapshot: snapshot.clone(),
            };
            match self.store.insert(record.clone()) {
                Ok(()) => return Ok(record),
                Err(RepositoryError::Conflict) => {
                    debug!(attempt, request_id = %snapshot.request_id.0, "verification code collision");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(VerificationError::CodeSpaceExhausted(self.attempts))
    }

    pub fn revoke(&self, code: &VerificationCode) -> Result<(), RepositoryError> {
        self.store.remove(code)
    }

    pub fn record_for(
        &self,
        request_id: &DocumentRequestId,
    ) -> Result<Option<VerificationRecord>, RepositoryError> {
        self.store.fetch_for_request(request_id)
    }

    /// Resolve a code against the live request. Expiry is checked before validity.
    pub fn verify(
        &self,
        code: &VerificationCode,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome, RepositoryError> {
        let Some(record) = self.store.fetch(code)? else {
            return Ok(VerificationOutcome::NotFound);
        };

        let Some(request) = self.requests.fetch(&record.request_id)? else {
            warn!(request_id = %record.request_id.0, "verification record without request");
            return Ok(VerificationOutcome::NotFound);
        };

        Ok(outcome_for(record, &request, now))
    }
}

impl std::fmt::Debug for VerificationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationRegistry")
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

fn outcome_for(
    record: VerificationRecord,
    request: &DocumentRequest,
    now: DateTime<Utc>,
) -> VerificationOutcome {
    if request.is_document_expired(now) {
        return VerificationOutcome::Expired {
            snapshot: record.snapshot,
            expires_at: request.expires_at,
        };
    }

    VerificationOutcome::Valid {
        snapshot: record.snapshot,
        status: request.status.label(),
        expires_at: request.expires_at,
        days_until_expiry: request.days_until_expiry(now),
    }
}
