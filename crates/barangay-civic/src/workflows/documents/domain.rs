use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::verification::VerificationCode;

/// Identifier wrapper for resident document requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRequestId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentTypeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResidentId(pub String);

/// Barangay staff member acting on a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub String);

/// Reference returned by the file store for a saved object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRef(pub String);

/// Reference data describing a certificate the barangay issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentType {
    pub id: DocumentTypeId,
    pub name: String,
    /// Days an issued document stays valid; `None` means it never expires.
    pub validity_days: Option<u32>,
    pub processing_days: u32,
    pub auto_delete_expired: bool,
    pub fee: f64,
    pub is_active: bool,
}

impl DocumentType {
    pub fn expiry_from(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.validity_days
            .filter(|days| *days > 0)
            .map(|days| issued_at + Duration::days(i64::from(days)))
    }
}

/// Lifecycle states of a document request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
    Ready,
    Completed,
    Expired,
    Cancelled,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Expired => "expired",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "ready" => Some(Self::Ready),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentStatus::Rejected
                | DocumentStatus::Cancelled
                | DocumentStatus::Completed
                | DocumentStatus::Expired
        )
    }

    /// Requirement files are frozen once a document has been issued or closed.
    pub const fn allows_file_changes(self) -> bool {
        !matches!(
            self,
            DocumentStatus::Ready
                | DocumentStatus::Completed
                | DocumentStatus::Expired
                | DocumentStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    #[default]
    Pickup,
    Email,
    Mail,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryInfo {
    #[serde(default)]
    pub method: DeliveryMethod,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A requirement file already persisted in the file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: FileId,
    pub file_name: String,
    pub content_type: String,
    pub storage_ref: StorageRef,
}

/// Raw upload supplied by a resident before it reaches the file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementUpload {
    pub file_name: String,
    #[serde(default = "default_upload_content_type")]
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn default_upload_content_type() -> String {
    mime::APPLICATION_OCTET_STREAM.to_string()
}

/// Resident input for a new document request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSubmission {
    pub requester_id: ResidentId,
    pub document_type_id: DocumentTypeId,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub delivery: DeliveryInfo,
    #[serde(default)]
    pub files: Vec<RequirementUpload>,
}

fn default_quantity() -> u32 {
    1
}

/// Stored document request, the unit the issuance state machine operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub id: DocumentRequestId,
    pub barangay_id: String,
    pub document_type_id: DocumentTypeId,
    pub requester_id: ResidentId,
    pub status: DocumentStatus,
    pub purpose: Option<String>,
    pub quantity: u32,
    pub delivery: DeliveryInfo,
    pub requirement_files: Vec<FileRef>,
    pub verification_code: Option<VerificationCode>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub processed_by: Option<StaffId>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub artifact_ref: Option<StorageRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRequest {
    /// True when the flag is set or the validity window has already closed.
    pub fn is_document_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_expired || self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Whole days left before expiry, floored at zero.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at
            .map(|expires_at| (expires_at - now).num_days().max(0))
    }

    /// Adds a file unless one with the same id is already attached.
    pub fn add_requirement_file(&mut self, file: FileRef) -> bool {
        if self.requirement_files.iter().any(|existing| existing.id == file.id) {
            return false;
        }
        self.requirement_files.push(file);
        true
    }

    pub fn remove_requirement_file(&mut self, file_id: &FileId) -> Option<FileRef> {
        let index = self
            .requirement_files
            .iter()
            .position(|file| &file.id == file_id)?;
        Some(self.requirement_files.remove(index))
    }

    pub fn status_view(&self, now: DateTime<Utc>) -> DocumentRequestView {
        DocumentRequestView {
            id: self.id.clone(),
            document_type_id: self.document_type_id.clone(),
            requester_id: self.requester_id.clone(),
            status: self.status.label(),
            purpose: self.purpose.clone(),
            quantity: self.quantity,
            delivery_method: self.delivery.method,
            requirement_files: self.requirement_files.clone(),
            verification_code: self.verification_code.clone(),
            expires_at: self.expires_at,
            is_expired: self.is_document_expired(now),
            days_until_expiry: self.days_until_expiry(now),
            processed_by: self.processed_by.clone(),
            processed_at: self.processed_at,
            rejection_reason: self.rejection_reason.clone(),
            artifact_ref: self.artifact_ref.clone(),
            created_at: self.created_at,
        }
    }
}

/// Sanitized representation of a request for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRequestView {
    pub id: DocumentRequestId,
    pub document_type_id: DocumentTypeId,
    pub requester_id: ResidentId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub quantity: u32,
    pub delivery_method: DeliveryMethod,
    pub requirement_files: Vec<FileRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<VerificationCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<StaffId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<StorageRef>,
    pub created_at: DateTime<Utc>,
}

/// Contact details looked up from the resident directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentContact {
    pub id: ResidentId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl ResidentContact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
