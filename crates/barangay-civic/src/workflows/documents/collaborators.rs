//! Outbound ports for rendering, delivery, and file storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::StorageRef;
use super::verification::IssuanceSnapshot;

/// Rendered certificate bytes ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl RenderedArtifact {
    /// File extension derived from the content type, `bin` when it is unrecognised.
    pub fn extension(&self) -> String {
        match self.content_type.parse::<mime::Mime>() {
            Ok(parsed) if parsed.subtype() == mime::PDF => "pdf".to_string(),
            Ok(parsed) if parsed.type_() == mime::TEXT && parsed.subtype() == mime::PLAIN => {
                "txt".to_string()
            }
            Ok(parsed) if parsed.type_() == mime::IMAGE => parsed.subtype().as_str().to_string(),
            _ => "bin".to_string(),
        }
    }
}

/// Produces the printable certificate for an issued request.
pub trait ArtifactRenderer: Send + Sync {
    fn render(&self, snapshot: &IssuanceSnapshot) -> Result<RenderedArtifact, CollaboratorError>;
}

/// Payload handed to the notifier when a document is delivered by e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDelivery {
    pub email: String,
    pub recipient_name: String,
    pub artifact_ref: StorageRef,
    pub metadata: BTreeMap<String, String>,
}

/// Delivers issued documents. `Ok(false)` means the transport declined the message.
pub trait Notifier: Send + Sync {
    fn deliver(&self, delivery: DocumentDelivery) -> Result<bool, CollaboratorError>;
}

/// Byte storage for requirement uploads and rendered artifacts.
pub trait FileStore: Send + Sync {
    fn save(&self, bytes: &[u8], path: &str) -> Result<StorageRef, CollaboratorError>;
    /// Returns `Ok(false)` when nothing was stored under the reference.
    fn delete(&self, reference: &StorageRef) -> Result<bool, CollaboratorError>;
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },
    #[error("{collaborator} rejected the request: {reason}")]
    Rejected {
        collaborator: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            reason: reason.into(),
        }
    }

    pub fn rejected(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            collaborator,
            reason: reason.into(),
        }
    }
}
