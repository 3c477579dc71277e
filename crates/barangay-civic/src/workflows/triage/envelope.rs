use serde::{Deserialize, Serialize};

use crate::workflows::documents::domain::DocumentRequest;

use super::sources::{ItemLoanRecord, RelocationRecord, SosRecord};

/// Label used whenever a related entity cannot be resolved.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// The four request families an admin triages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Document,
    Sos,
    Relocation,
    Item,
}

impl RequestKind {
    pub const ALL: [RequestKind; 4] = [
        RequestKind::Document,
        RequestKind::Sos,
        RequestKind::Relocation,
        RequestKind::Item,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            RequestKind::Document => "document",
            RequestKind::Sos => "sos",
            RequestKind::Relocation => "relocation",
            RequestKind::Item => "item",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "document" => Some(Self::Document),
            "sos" => Some(Self::Sos),
            "relocation" => Some(Self::Relocation),
            "item" => Some(Self::Item),
            _ => None,
        }
    }
}

/// Enough to route back to the detail view of the originating record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestRef {
    pub kind: RequestKind,
    pub id: String,
}

/// Per-kind inputs the priority scorer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EnvelopeDetail {
    Document {
        document_type_name: String,
        purpose: Option<String>,
        quantity: u32,
    },
    Sos {
        emergency_type: String,
    },
    Relocation {
        from_barangay: String,
        to_barangay: String,
    },
    Item {
        item_title: String,
    },
}

/// Uniform projection of a request for the triage queue. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestEnvelope {
    pub id: String,
    pub kind: RequestKind,
    pub requester_name: String,
    pub status: String,
    /// Raw timestamp as reported by the source store; it may not parse.
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    pub description: String,
    pub raw_ref: RequestRef,
    pub detail: EnvelopeDetail,
}

/// A source record plus the optional lookups resolved for it.
#[derive(Debug, Clone)]
pub enum TriageSource {
    Document {
        request: DocumentRequest,
        document_type_name: Option<String>,
        requester_name: Option<String>,
    },
    Sos {
        record: SosRecord,
        requester_name: Option<String>,
    },
    Relocation {
        record: RelocationRecord,
        from_barangay: Option<String>,
        to_barangay: Option<String>,
        requester_name: Option<String>,
    },
    Item {
        record: ItemLoanRecord,
        item_title: Option<String>,
        requester_name: Option<String>,
    },
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

impl TriageSource {
    pub fn kind(&self) -> RequestKind {
        match self {
            TriageSource::Document { .. } => RequestKind::Document,
            TriageSource::Sos { .. } => RequestKind::Sos,
            TriageSource::Relocation { .. } => RequestKind::Relocation,
            TriageSource::Item { .. } => RequestKind::Item,
        }
    }

    pub fn to_envelope(self) -> RequestEnvelope {
        let kind = self.kind();
        match self {
            TriageSource::Document {
                request,
                document_type_name,
                requester_name,
            } => {
                let document_type_name = or_unknown(document_type_name);
                RequestEnvelope {
                    id: request.id.0.clone(),
                    kind,
                    requester_name: or_unknown(requester_name),
                    status: request.status.label().to_string(),
                    created_at: request.created_at.to_rfc3339(),
                    processed_at: request.processed_at.map(|at| at.to_rfc3339()),
                    description: format!("Document request: {document_type_name}"),
                    raw_ref: RequestRef {
                        kind,
                        id: request.id.0,
                    },
                    detail: EnvelopeDetail::Document {
                        document_type_name,
                        purpose: request.purpose,
                        quantity: request.quantity,
                    },
                }
            }
            TriageSource::Sos {
                record,
                requester_name,
            } => RequestEnvelope {
                id: record.id.clone(),
                kind,
                requester_name: or_unknown(requester_name),
                status: record.status,
                created_at: record.created_at,
                processed_at: record.responded_at,
                description: format!(
                    "SOS Request: {} - {}",
                    record.emergency_type, record.description
                ),
                raw_ref: RequestRef {
                    kind,
                    id: record.id,
                },
                detail: EnvelopeDetail::Sos {
                    emergency_type: record.emergency_type,
                },
            },
            TriageSource::Relocation {
                record,
                from_barangay,
                to_barangay,
                requester_name,
            } => {
                let from_barangay = or_unknown(from_barangay);
                let to_barangay = or_unknown(to_barangay);
                RequestEnvelope {
                    id: record.id.clone(),
                    kind,
                    requester_name: or_unknown(requester_name),
                    status: record.status,
                    created_at: record.created_at,
                    processed_at: record.processed_at,
                    description: format!("Relocation Request: {from_barangay} to {to_barangay}"),
                    raw_ref: RequestRef {
                        kind,
                        id: record.id,
                    },
                    detail: EnvelopeDetail::Relocation {
                        from_barangay,
                        to_barangay,
                    },
                }
            }
            TriageSource::Item {
                record,
                item_title,
                requester_name,
            } => {
                let item_title = or_unknown(item_title);
                RequestEnvelope {
                    id: record.id.clone(),
                    kind,
                    requester_name: or_unknown(requester_name),
                    status: record.status,
                    created_at: record.created_at,
                    processed_at: record.processed_at,
                    description: format!("Item Request: {item_title}"),
                    raw_ref: RequestRef {
                        kind,
                        id: record.id,
                    },
                    detail: EnvelopeDetail::Item { item_title },
                }
            }
        }
    }
}
