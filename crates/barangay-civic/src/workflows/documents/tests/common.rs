use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration as StdDuration;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::{IssuanceConfig, TenantConfig};
use crate::workflows::documents::collaborators::{
    ArtifactRenderer, CollaboratorError, DocumentDelivery, FileStore, Notifier, RenderedArtifact,
};
use crate::workflows::documents::domain::{
    DeliveryInfo, DeliveryMethod, DocumentRequest, DocumentRequestId, DocumentStatus,
    DocumentSubmission, DocumentType, DocumentTypeId, RequirementUpload, ResidentContact,
    ResidentId, StaffId, StorageRef,
};
use crate::workflows::documents::repository::{
    DocumentRequestRepository, DocumentTypeRepository, PeopleDirectory, RepositoryError,
    RequestFilter,
};
use crate::workflows::documents::service::{DocumentIssuanceService, DocumentPorts};
use crate::workflows::documents::verification::{
    IssuanceSnapshot, VerificationCode, VerificationRecord, VerificationRegistry,
    VerificationStore,
};

pub(crate) const CLEARANCE: &str = "doctype-clearance";
pub(crate) const INDIGENCY: &str = "doctype-indigency";
pub(crate) const PERMANENT: &str = "doctype-residency";
pub(crate) const RESIDENT: &str = "resident-juan";
pub(crate) const OTHER_RESIDENT: &str = "resident-maria";
pub(crate) const ADMIN: &str = "staff-captain";

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn tenant() -> TenantConfig {
    TenantConfig {
        barangay_id: "brgy-san-isidro".to_string(),
        barangay_name: "Barangay San Isidro".to_string(),
    }
}

pub(crate) fn clearance_type() -> DocumentType {
    DocumentType {
        id: DocumentTypeId(CLEARANCE.to_string()),
        name: "Barangay Clearance".to_string(),
        validity_days: Some(30),
        processing_days: 3,
        auto_delete_expired: true,
        fee: 50.0,
        is_active: true,
    }
}

/// Expires but is not auto-deleted by a sweep-all.
pub(crate) fn indigency_type() -> DocumentType {
    DocumentType {
        id: DocumentTypeId(INDIGENCY.to_string()),
        name: "Certificate of Indigency".to_string(),
        validity_days: Some(10),
        processing_days: 1,
        auto_delete_expired: false,
        fee: 0.0,
        is_active: true,
    }
}

pub(crate) fn permanent_type() -> DocumentType {
    DocumentType {
        id: DocumentTypeId(PERMANENT.to_string()),
        name: "Certificate of Residency".to_string(),
        validity_days: None,
        processing_days: 2,
        auto_delete_expired: true,
        fee: 30.0,
        is_active: true,
    }
}

pub(crate) fn pending_request(suffix: &str) -> DocumentRequest {
    DocumentRequest {
        id: DocumentRequestId(format!("docreq-{suffix}")),
        barangay_id: tenant().barangay_id,
        document_type_id: DocumentTypeId(CLEARANCE.to_string()),
        requester_id: ResidentId(RESIDENT.to_string()),
        status: DocumentStatus::Pending,
        purpose: Some("Employment requirement".to_string()),
        quantity: 1,
        delivery: DeliveryInfo::default(),
        requirement_files: Vec::new(),
        verification_code: None,
        expires_at: None,
        is_expired: false,
        processed_by: None,
        processed_at: None,
        processing_notes: None,
        rejection_reason: None,
        artifact_ref: None,
        created_at: t0(),
        updated_at: t0(),
    }
}

pub(crate) fn upload(name: &str) -> RequirementUpload {
    RequirementUpload {
        file_name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: format!("scan of {name}").into_bytes(),
    }
}

pub(crate) fn submission(type_id: &str) -> DocumentSubmission {
    DocumentSubmission {
        requester_id: ResidentId(RESIDENT.to_string()),
        document_type_id: DocumentTypeId(type_id.to_string()),
        purpose: Some("Employment requirement".to_string()),
        quantity: 1,
        delivery: DeliveryInfo::default(),
        files: vec![upload("valid-id.jpg")],
    }
}

pub(crate) fn email_submission(type_id: &str) -> DocumentSubmission {
    DocumentSubmission {
        delivery: DeliveryInfo {
            method: DeliveryMethod::Email,
            address: None,
            notes: None,
        },
        ..submission(type_id)
    }
}

pub(crate) fn admin() -> StaffId {
    StaffId(ADMIN.to_string())
}

#[derive(Default)]
pub(crate) struct MemoryRequests {
    records: Mutex<HashMap<DocumentRequestId, DocumentRequest>>,
    fail_updates: AtomicBool,
}

impl MemoryRequests {
    pub(crate) fn seed(&self, request: DocumentRequest) {
        self.records
            .lock()
            .expect("request mutex poisoned")
            .insert(request.id.clone(), request);
    }

    pub(crate) fn get(&self, id: &DocumentRequestId) -> DocumentRequest {
        self.records
            .lock()
            .expect("request mutex poisoned")
            .get(id)
            .cloned()
            .expect("request present")
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("request mutex poisoned").len()
    }

    pub(crate) fn fail_updates(&self, enabled: bool) {
        self.fail_updates.store(enabled, Ordering::SeqCst);
    }
}

impl DocumentRequestRepository for MemoryRequests {
    fn insert(&self, request: DocumentRequest) -> Result<DocumentRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("request mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: DocumentRequest) -> Result<(), RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        let mut guard = self.records.lock().expect("request mutex poisoned");
        if !guard.contains_key(&request.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &DocumentRequestId) -> Result<Option<DocumentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find(&self, filter: &RequestFilter) -> Result<Vec<DocumentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("request mutex poisoned");
        let mut matches: Vec<DocumentRequest> = guard
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matches)
    }
}

#[derive(Default)]
pub(crate) struct MemoryTypes {
    types: Mutex<HashMap<DocumentTypeId, DocumentType>>,
}

impl MemoryTypes {
    pub(crate) fn with(types: Vec<DocumentType>) -> Self {
        let store = Self::default();
        for document_type in types {
            store.upsert(document_type);
        }
        store
    }

    pub(crate) fn upsert(&self, document_type: DocumentType) {
        self.types
            .lock()
            .expect("type mutex poisoned")
            .insert(document_type.id.clone(), document_type);
    }
}

impl DocumentTypeRepository for MemoryTypes {
    fn fetch(&self, id: &DocumentTypeId) -> Result<Option<DocumentType>, RepositoryError> {
        Ok(self.types.lock().expect("type mutex poisoned").get(id).cloned())
    }

    fn delete(&self, id: &DocumentTypeId) -> Result<(), RepositoryError> {
        match self.types.lock().expect("type mutex poisoned").remove(id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound),
        }
    }
}

pub(crate) struct MemoryPeople {
    residents: HashMap<ResidentId, ResidentContact>,
    staff: HashMap<StaffId, String>,
}

impl Default for MemoryPeople {
    fn default() -> Self {
        let mut residents = HashMap::new();
        residents.insert(
            ResidentId(RESIDENT.to_string()),
            ResidentContact {
                id: ResidentId(RESIDENT.to_string()),
                first_name: "Juan".to_string(),
                last_name: "Dela Cruz".to_string(),
                email: Some("juan@example.ph".to_string()),
            },
        );
        residents.insert(
            ResidentId(OTHER_RESIDENT.to_string()),
            ResidentContact {
                id: ResidentId(OTHER_RESIDENT.to_string()),
                first_name: "Maria".to_string(),
                last_name: "Santos".to_string(),
                email: None,
            },
        );
        let mut staff = HashMap::new();
        staff.insert(admin(), "Kapitan Jose Rizal".to_string());
        Self { residents, staff }
    }
}

impl PeopleDirectory for MemoryPeople {
    fn resident(&self, id: &ResidentId) -> Result<Option<ResidentContact>, RepositoryError> {
        Ok(self.residents.get(id).cloned())
    }

    fn staff_name(&self, id: &StaffId) -> Result<Option<String>, RepositoryError> {
        Ok(self.staff.get(id).cloned())
    }
}

#[derive(Default)]
pub(crate) struct MemoryVerifications {
    records: Mutex<HashMap<VerificationCode, VerificationRecord>>,
}

impl MemoryVerifications {
    pub(crate) fn len(&self) -> usize {
        self.records.lock().expect("verification mutex poisoned").len()
    }

    pub(crate) fn all(&self) -> Vec<VerificationRecord> {
        self.records
            .lock()
            .expect("verification mutex poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl VerificationStore for MemoryVerifications {
    fn insert(&self, record: VerificationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("verification mutex poisoned");
        if guard.contains_key(&record.code) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.code.clone(), record);
        Ok(())
    }

    fn fetch(&self, code: &VerificationCode) -> Result<Option<VerificationRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("verification mutex poisoned")
            .get(code)
            .cloned())
    }

    fn fetch_for_request(
        &self,
        request_id: &DocumentRequestId,
    ) -> Result<Option<VerificationRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("verification mutex poisoned")
            .values()
            .find(|record| &record.request_id == request_id)
            .cloned())
    }

    fn remove(&self, code: &VerificationCode) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("verification mutex poisoned")
            .remove(code);
        Ok(())
    }
}

/// In-memory file store; saves fail when the path contains `fail_on`.
#[derive(Default)]
pub(crate) struct MemoryFiles {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_on: Mutex<Option<String>>,
    fail_deletes: AtomicBool,
}

impl MemoryFiles {
    pub(crate) fn fail_saves_matching(&self, fragment: &str) {
        *self.fail_on.lock().expect("file mutex poisoned") = Some(fragment.to_string());
    }

    pub(crate) fn fail_deletes(&self, enabled: bool) {
        self.fail_deletes.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .lock()
            .expect("file mutex poisoned")
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    pub(crate) fn contains(&self, reference: &StorageRef) -> bool {
        self.objects
            .lock()
            .expect("file mutex poisoned")
            .contains_key(&reference.0)
    }
}

impl FileStore for MemoryFiles {
    fn save(&self, bytes: &[u8], path: &str) -> Result<StorageRef, CollaboratorError> {
        if let Some(fragment) = self.fail_on.lock().expect("file mutex poisoned").as_deref() {
            if path.contains(fragment) {
                return Err(CollaboratorError::unavailable("file store", "disk full"));
            }
        }
        self.objects
            .lock()
            .expect("file mutex poisoned")
            .insert(path.to_string(), bytes.to_vec());
        Ok(StorageRef(path.to_string()))
    }

    fn delete(&self, reference: &StorageRef) -> Result<bool, CollaboratorError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("file store", "permission denied"));
        }
        Ok(self
            .objects
            .lock()
            .expect("file mutex poisoned")
            .remove(&reference.0)
            .is_some())
    }
}

/// Renders a plain-text certificate, optionally pausing to widen race windows.
#[derive(Default)]
pub(crate) struct TextRenderer {
    pub(crate) delay: Option<StdDuration>,
    pub(crate) calls: AtomicUsize,
}

impl TextRenderer {
    pub(crate) fn slow(delay: StdDuration) -> Self {
        Self {
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ArtifactRenderer for TextRenderer {
    fn render(&self, snapshot: &IssuanceSnapshot) -> Result<RenderedArtifact, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        Ok(RenderedArtifact {
            bytes: format!(
                "{} issued to {} by {}",
                snapshot.document_type_name, snapshot.requester_name, snapshot.issuer_name
            )
            .into_bytes(),
            content_type: "text/plain".to_string(),
        })
    }
}

pub(crate) struct FailingRenderer;

impl ArtifactRenderer for FailingRenderer {
    fn render(&self, _snapshot: &IssuanceSnapshot) -> Result<RenderedArtifact, CollaboratorError> {
        Err(CollaboratorError::unavailable("renderer", "template missing"))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    deliveries: Mutex<Vec<DocumentDelivery>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub(crate) fn deliveries(&self) -> Vec<DocumentDelivery> {
        self.deliveries
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, delivery: DocumentDelivery) -> Result<bool, CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable("smtp", "connection refused"));
        }
        self.deliveries
            .lock()
            .expect("notifier mutex poisoned")
            .push(delivery);
        Ok(true)
    }
}

/// Service plus handles to every fake behind it.
pub(crate) struct Harness {
    pub(crate) service: DocumentIssuanceService,
    pub(crate) requests: Arc<MemoryRequests>,
    pub(crate) types: Arc<MemoryTypes>,
    pub(crate) verifications: Arc<MemoryVerifications>,
    pub(crate) files: Arc<MemoryFiles>,
    pub(crate) renderer: Arc<TextRenderer>,
    pub(crate) notifier: Arc<RecordingNotifier>,
}

pub(crate) struct HarnessBuilder {
    renderer: Option<Arc<dyn ArtifactRenderer>>,
    text_renderer: Arc<TextRenderer>,
    notifier: Arc<RecordingNotifier>,
    config: IssuanceConfig,
    codes: Option<Vec<&'static str>>,
}

impl HarnessBuilder {
    pub(crate) fn renderer(mut self, renderer: Arc<dyn ArtifactRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub(crate) fn text_renderer(mut self, renderer: TextRenderer) -> Self {
        self.text_renderer = Arc::new(renderer);
        self
    }

    pub(crate) fn notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub(crate) fn config(mut self, config: IssuanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Replay a fixed code sequence instead of random codes; the last one repeats.
    pub(crate) fn codes(mut self, codes: Vec<&'static str>) -> Self {
        self.codes = Some(codes);
        self
    }

    pub(crate) fn build(self) -> Harness {
        let requests = Arc::new(MemoryRequests::default());
        let types = Arc::new(MemoryTypes::with(vec![
            clearance_type(),
            indigency_type(),
            permanent_type(),
        ]));
        let verifications = Arc::new(MemoryVerifications::default());
        let files = Arc::new(MemoryFiles::default());

        let renderer: Arc<dyn ArtifactRenderer> = match self.renderer {
            Some(renderer) => renderer,
            None => self.text_renderer.clone(),
        };

        let ports = DocumentPorts {
            requests: requests.clone(),
            types: types.clone(),
            people: Arc::new(MemoryPeople::default()),
            verifications: verifications.clone(),
            renderer,
            notifier: self.notifier.clone(),
            files: files.clone(),
        };

        let service = match self.codes {
            Some(codes) => {
                let cursor = AtomicUsize::new(0);
                let registry = VerificationRegistry::with_generator(
                    verifications.clone(),
                    requests.clone(),
                    self.config.code_mint_attempts,
                    move || {
                        let index = cursor.fetch_add(1, Ordering::SeqCst).min(codes.len() - 1);
                        VerificationCode(codes[index].to_string())
                    },
                );
                DocumentIssuanceService::with_registry(ports, tenant(), self.config, registry)
            }
            None => DocumentIssuanceService::new(ports, tenant(), self.config),
        };

        Harness {
            service,
            requests,
            types,
            verifications,
            files,
            renderer: self.text_renderer,
            notifier: self.notifier,
        }
    }
}

pub(crate) fn harness_builder() -> HarnessBuilder {
    HarnessBuilder {
        renderer: None,
        text_renderer: Arc::new(TextRenderer::default()),
        notifier: Arc::new(RecordingNotifier::default()),
        config: IssuanceConfig::default(),
        codes: None,
    }
}

pub(crate) fn harness() -> Harness {
    harness_builder().build()
}

impl Harness {
    /// Submit a clearance request at `t0` and issue it an hour later.
    pub(crate) fn issued_request(&self) -> DocumentRequest {
        let request = self
            .service
            .submit(submission(CLEARANCE), t0())
            .expect("submission accepted");
        self.service
            .approve_and_issue(&request.id, &admin(), None, t0() + Duration::hours(1))
            .expect("issuance succeeds")
            .request
    }
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
