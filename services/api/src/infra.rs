use barangay_civic::workflows::documents::{
    ArtifactRenderer, CollaboratorError, DocumentDelivery, DocumentRequest, DocumentRequestId,
    DocumentRequestRepository, DocumentType, DocumentTypeId, DocumentTypeRepository, FileStore,
    IssuanceSnapshot, Notifier, PeopleDirectory, RenderedArtifact, RepositoryError,
    RequestFilter, ResidentContact, ResidentId, StaffId, StorageRef, VerificationCode,
    VerificationRecord, VerificationStore,
};
use barangay_civic::workflows::triage::{
    status_matches, ItemLoanRecord, ItemLoanStore, RelocationRecord, RelocationStore, SosRecord,
    SosStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn guard<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{name} mutex poisoned")))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentRequests {
    records: Arc<Mutex<HashMap<DocumentRequestId, DocumentRequest>>>,
}

impl DocumentRequestRepository for InMemoryDocumentRequests {
    fn insert(&self, request: DocumentRequest) -> Result<DocumentRequest, RepositoryError> {
        let mut records = guard(&self.records, "request")?;
        if records.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: DocumentRequest) -> Result<(), RepositoryError> {
        let mut records = guard(&self.records, "request")?;
        match records.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &DocumentRequestId) -> Result<Option<DocumentRequest>, RepositoryError> {
        Ok(guard(&self.records, "request")?.get(id).cloned())
    }

    fn find(&self, filter: &RequestFilter) -> Result<Vec<DocumentRequest>, RepositoryError> {
        let mut matches: Vec<DocumentRequest> = guard(&self.records, "request")?
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }
}

#[derive(Clone)]
pub(crate) struct InMemoryDocumentTypes {
    types: Arc<Mutex<HashMap<DocumentTypeId, DocumentType>>>,
}

impl InMemoryDocumentTypes {
    pub(crate) fn seeded() -> Self {
        let types = default_document_types()
            .into_iter()
            .map(|document_type| (document_type.id.clone(), document_type))
            .collect();
        Self {
            types: Arc::new(Mutex::new(types)),
        }
    }
}

impl DocumentTypeRepository for InMemoryDocumentTypes {
    fn fetch(&self, id: &DocumentTypeId) -> Result<Option<DocumentType>, RepositoryError> {
        Ok(guard(&self.types, "document type")?.get(id).cloned())
    }

    fn delete(&self, id: &DocumentTypeId) -> Result<(), RepositoryError> {
        guard(&self.types, "document type")?
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

/// Certificates every barangay offers out of the box.
pub(crate) fn default_document_types() -> Vec<DocumentType> {
    vec![
        DocumentType {
            id: DocumentTypeId("doctype-clearance".to_string()),
            name: "Barangay Clearance".to_string(),
            validity_days: Some(30),
            processing_days: 1,
            auto_delete_expired: true,
            fee: 50.0,
            is_active: true,
        },
        DocumentType {
            id: DocumentTypeId("doctype-indigency".to_string()),
            name: "Certificate of Indigency".to_string(),
            validity_days: Some(180),
            processing_days: 2,
            auto_delete_expired: false,
            fee: 0.0,
            is_active: true,
        },
        DocumentType {
            id: DocumentTypeId("doctype-residency".to_string()),
            name: "Certificate of Residency".to_string(),
            validity_days: None,
            processing_days: 3,
            auto_delete_expired: false,
            fee: 30.0,
            is_active: true,
        },
    ]
}

#[derive(Clone)]
pub(crate) struct InMemoryPeople {
    residents: Arc<HashMap<ResidentId, ResidentContact>>,
    staff: Arc<HashMap<StaffId, String>>,
}

impl InMemoryPeople {
    pub(crate) fn seeded() -> Self {
        let residents = [
            ("resident-0001", "Juan", "Dela Cruz", Some("juan.delacruz@example.ph")),
            ("resident-0002", "Maria", "Santos", None),
        ]
        .into_iter()
        .map(|(id, first, last, email)| {
            let id = ResidentId(id.to_string());
            let contact = ResidentContact {
                id: id.clone(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.map(str::to_string),
            };
            (id, contact)
        })
        .collect();

        let staff = [("staff-0001", "Kapitan Andres Bonifacio")]
            .into_iter()
            .map(|(id, name)| (StaffId(id.to_string()), name.to_string()))
            .collect();

        Self {
            residents: Arc::new(residents),
            staff: Arc::new(staff),
        }
    }
}

impl PeopleDirectory for InMemoryPeople {
    fn resident(&self, id: &ResidentId) -> Result<Option<ResidentContact>, RepositoryError> {
        Ok(self.residents.get(id).cloned())
    }

    fn staff_name(&self, id: &StaffId) -> Result<Option<String>, RepositoryError> {
        Ok(self.staff.get(id).cloned())
    }
}

/// Verification records keyed by code, which doubles as the unique index.
#[derive(Default, Clone)]
pub(crate) struct InMemoryVerifications {
    records: Arc<Mutex<HashMap<VerificationCode, VerificationRecord>>>,
}

impl VerificationStore for InMemoryVerifications {
    fn insert(&self, record: VerificationRecord) -> Result<(), RepositoryError> {
        let mut records = guard(&self.records, "verification")?;
        if records.contains_key(&record.code) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(record.code.clone(), record);
        Ok(())
    }

    fn fetch(&self, code: &VerificationCode) -> Result<Option<VerificationRecord>, RepositoryError> {
        Ok(guard(&self.records, "verification")?.get(code).cloned())
    }

    fn fetch_for_request(
        &self,
        request_id: &DocumentRequestId,
    ) -> Result<Option<VerificationRecord>, RepositoryError> {
        Ok(guard(&self.records, "verification")?
            .values()
            .find(|record| &record.request_id == request_id)
            .cloned())
    }

    fn remove(&self, code: &VerificationCode) -> Result<(), RepositoryError> {
        guard(&self.records, "verification")?.remove(code);
        Ok(())
    }
}

/// File store rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub(crate) struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, CollaboratorError> {
        let path = Path::new(relative);
        let clean = path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if relative.is_empty() || !clean {
            return Err(CollaboratorError::rejected(
                "file store",
                format!("refusing storage path '{relative}'"),
            ));
        }
        Ok(self.root.join(path))
    }
}

impl FileStore for DiskFileStore {
    fn save(&self, bytes: &[u8], path: &str) -> Result<StorageRef, CollaboratorError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| CollaboratorError::unavailable("file store", err.to_string()))?;
        }
        fs::write(&target, bytes)
            .map_err(|err| CollaboratorError::unavailable("file store", err.to_string()))?;
        debug!(path, size = bytes.len(), "stored file");
        Ok(StorageRef(path.to_string()))
    }

    fn delete(&self, reference: &StorageRef) -> Result<bool, CollaboratorError> {
        let target = self.resolve(&reference.0)?;
        match fs::remove_file(&target) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(CollaboratorError::unavailable("file store", err.to_string())),
        }
    }
}

/// Renders certificates as plain text until a PDF template engine is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PlainTextRenderer;

impl ArtifactRenderer for PlainTextRenderer {
    fn render(&self, snapshot: &IssuanceSnapshot) -> Result<RenderedArtifact, CollaboratorError> {
        let mut body = String::new();
        body.push_str(&format!("{}\n", snapshot.barangay_name.to_uppercase()));
        body.push_str(&format!("{}\n\n", snapshot.document_type_name.to_uppercase()));
        body.push_str(&format!(
            "This certifies that {} is a bona fide resident of {}.\n",
            snapshot.requester_name, snapshot.barangay_name
        ));
        if let Some(purpose) = &snapshot.purpose {
            body.push_str(&format!("Issued for the purpose of: {purpose}\n"));
        }
        body.push_str(&format!("Copies: {}\n", snapshot.quantity));
        body.push_str(&format!(
            "Issued: {}\n",
            snapshot.issued_at.format("%B %d, %Y")
        ));
        match snapshot.expires_at {
            Some(expires_at) => {
                body.push_str(&format!("Valid until: {}\n", expires_at.format("%B %d, %Y")))
            }
            None => body.push_str("Valid until: no expiry\n"),
        }
        body.push_str(&format!("\n{}\nPunong Barangay\n", snapshot.issuer_name));

        Ok(RenderedArtifact {
            bytes: body.into_bytes(),
            content_type: "text/plain".to_string(),
        })
    }
}

/// Logs deliveries instead of sending mail.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn deliver(&self, delivery: DocumentDelivery) -> Result<bool, CollaboratorError> {
        info!(
            email = %delivery.email,
            recipient = %delivery.recipient_name,
            artifact = %delivery.artifact_ref.0,
            "document delivery queued"
        );
        Ok(true)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySos {
    records: Arc<Mutex<Vec<SosRecord>>>,
}

impl InMemorySos {
    pub(crate) fn push(&self, record: SosRecord) -> Result<(), RepositoryError> {
        guard(&self.records, "sos")?.push(record);
        Ok(())
    }
}

impl SosStore for InMemorySos {
    fn list(&self, status: Option<&str>) -> Result<Vec<SosRecord>, RepositoryError> {
        Ok(guard(&self.records, "sos")?
            .iter()
            .filter(|record| status_matches(status, &record.status))
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
pub(crate) struct InMemoryRelocations {
    records: Arc<Mutex<Vec<RelocationRecord>>>,
    barangays: Arc<HashMap<String, String>>,
}

impl InMemoryRelocations {
    pub(crate) fn new(barangays: HashMap<String, String>) -> Self {
        Self {
            records: Arc::default(),
            barangays: Arc::new(barangays),
        }
    }

    pub(crate) fn push(&self, record: RelocationRecord) -> Result<(), RepositoryError> {
        guard(&self.records, "relocation")?.push(record);
        Ok(())
    }
}

impl RelocationStore for InMemoryRelocations {
    fn list(&self, status: Option<&str>) -> Result<Vec<RelocationRecord>, RepositoryError> {
        Ok(guard(&self.records, "relocation")?
            .iter()
            .filter(|record| status_matches(status, &record.status))
            .cloned()
            .collect())
    }

    fn barangay_name(&self, barangay_id: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.barangays.get(barangay_id).cloned())
    }
}

#[derive(Clone)]
pub(crate) struct InMemoryItemLoans {
    records: Arc<Mutex<Vec<ItemLoanRecord>>>,
    titles: Arc<HashMap<String, String>>,
}

impl InMemoryItemLoans {
    pub(crate) fn new(titles: HashMap<String, String>) -> Self {
        Self {
            records: Arc::default(),
            titles: Arc::new(titles),
        }
    }

    pub(crate) fn push(&self, record: ItemLoanRecord) -> Result<(), RepositoryError> {
        guard(&self.records, "item loan")?.push(record);
        Ok(())
    }
}

impl ItemLoanStore for InMemoryItemLoans {
    fn list(&self, status: Option<&str>) -> Result<Vec<ItemLoanRecord>, RepositoryError> {
        Ok(guard(&self.records, "item loan")?
            .iter()
            .filter(|record| status_matches(status, &record.status))
            .cloned()
            .collect())
    }

    fn item_title(&self, item_id: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.titles.get(item_id).cloned())
    }
}

/// Every in-memory adapter the service and demo are wired from.
#[derive(Clone)]
pub(crate) struct InMemoryBackends {
    pub(crate) requests: Arc<InMemoryDocumentRequests>,
    pub(crate) types: Arc<InMemoryDocumentTypes>,
    pub(crate) people: Arc<InMemoryPeople>,
    pub(crate) verifications: Arc<InMemoryVerifications>,
    pub(crate) files: Arc<DiskFileStore>,
    pub(crate) sos: Arc<InMemorySos>,
    pub(crate) relocations: Arc<InMemoryRelocations>,
    pub(crate) items: Arc<InMemoryItemLoans>,
}

impl InMemoryBackends {
    pub(crate) fn new(upload_dir: impl Into<PathBuf>, barangay_id: &str, barangay_name: &str) -> Self {
        let barangays = [
            (barangay_id.to_string(), barangay_name.to_string()),
            ("brgy-002".to_string(), "San Isidro".to_string()),
        ]
        .into_iter()
        .collect();
        let titles = [
            ("item-tent".to_string(), "Folding tent".to_string()),
            ("item-chairs".to_string(), "Monobloc chairs".to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            requests: Arc::new(InMemoryDocumentRequests::default()),
            types: Arc::new(InMemoryDocumentTypes::seeded()),
            people: Arc::new(InMemoryPeople::seeded()),
            verifications: Arc::new(InMemoryVerifications::default()),
            files: Arc::new(DiskFileStore::new(upload_dir)),
            sos: Arc::new(InMemorySos::default()),
            relocations: Arc::new(InMemoryRelocations::new(barangays)),
            items: Arc::new(InMemoryItemLoans::new(titles)),
        }
    }
}
