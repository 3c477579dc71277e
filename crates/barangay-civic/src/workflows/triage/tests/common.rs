use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::config::TriageConfig;
use crate::workflows::documents::domain::{DocumentTypeId, ResidentId};
use crate::workflows::documents::tests::common::{
    clearance_type, pending_request, t0, MemoryPeople, MemoryRequests, MemoryTypes, RESIDENT,
};
use crate::workflows::documents::repository::RepositoryError;
use crate::workflows::triage::queue::{TriageService, TriageSources};
use crate::workflows::triage::sources::{
    status_matches, ItemLoanRecord, ItemLoanStore, RelocationRecord, RelocationStore, SosRecord,
    SosStore,
};

/// Twelve hours after the seeded requests; no age bonus applies yet.
pub(super) fn now() -> DateTime<Utc> {
    t0() + Duration::hours(12)
}

fn naive(at: DateTime<Utc>) -> String {
    at.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Blocks the next `list` call until the test releases it.
struct SosGate {
    entered: Sender<()>,
    release: Receiver<()>,
}

#[derive(Default)]
pub(super) struct MemorySos {
    records: Mutex<Vec<SosRecord>>,
    offline: AtomicBool,
    gate: Mutex<Option<SosGate>>,
}

impl MemorySos {
    pub(super) fn push(&self, record: SosRecord) {
        self.records.lock().expect("sos mutex poisoned").push(record);
    }

    pub(super) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Returns the "entered" signal and the release handle for the next listing.
    pub(super) fn hold_next_list(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().expect("sos gate poisoned") = Some(SosGate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }
}

impl SosStore for MemorySos {
    fn list(&self, status: Option<&str>) -> Result<Vec<SosRecord>, RepositoryError> {
        let gate = self.gate.lock().expect("sos gate poisoned").take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            if gate.release.recv_timeout(StdDuration::from_secs(2)).is_err() {
                return Err(RepositoryError::Unavailable("sos query timed out".to_string()));
            }
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("sos database offline".to_string()));
        }
        Ok(self
            .records
            .lock()
            .expect("sos mutex poisoned")
            .iter()
            .filter(|record| status_matches(status, &record.status))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryRelocations {
    records: Mutex<Vec<RelocationRecord>>,
    barangays: HashMap<String, String>,
}

impl MemoryRelocations {
    pub(super) fn with_barangays(names: &[(&str, &str)]) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            barangays: names
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        }
    }

    pub(super) fn push(&self, record: RelocationRecord) {
        self.records
            .lock()
            .expect("relocation mutex poisoned")
            .push(record);
    }
}

impl RelocationStore for MemoryRelocations {
    fn list(&self, status: Option<&str>) -> Result<Vec<RelocationRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("relocation mutex poisoned")
            .iter()
            .filter(|record| status_matches(status, &record.status))
            .cloned()
            .collect())
    }

    fn barangay_name(&self, barangay_id: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.barangays.get(barangay_id).cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryItems {
    records: Mutex<Vec<ItemLoanRecord>>,
    titles: HashMap<String, String>,
}

impl MemoryItems {
    pub(super) fn with_titles(titles: &[(&str, &str)]) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            titles: titles
                .iter()
                .map(|(id, title)| (id.to_string(), title.to_string()))
                .collect(),
        }
    }

    pub(super) fn push(&self, record: ItemLoanRecord) {
        self.records.lock().expect("item mutex poisoned").push(record);
    }
}

impl ItemLoanStore for MemoryItems {
    fn list(&self, status: Option<&str>) -> Result<Vec<ItemLoanRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("item mutex poisoned")
            .iter()
            .filter(|record| status_matches(status, &record.status))
            .cloned()
            .collect())
    }

    fn item_title(&self, item_id: &str) -> Result<Option<String>, RepositoryError> {
        if item_id == "item-corrupt" {
            return Err(RepositoryError::Unavailable("row unreadable".to_string()));
        }
        Ok(self.titles.get(item_id).cloned())
    }
}

pub(super) struct Fixture {
    pub(super) service: TriageService,
    pub(super) requests: Arc<MemoryRequests>,
    pub(super) sos: Arc<MemorySos>,
    pub(super) items: Arc<MemoryItems>,
}

pub(super) fn sos(id: &str, emergency_type: &str, created_at: DateTime<Utc>) -> SosRecord {
    SosRecord {
        id: id.to_string(),
        requester_id: ResidentId(RESIDENT.to_string()),
        status: "pending".to_string(),
        emergency_type: emergency_type.to_string(),
        description: "Reported via hotline".to_string(),
        created_at: naive(created_at),
        responded_at: None,
    }
}

pub(super) fn item(id: &str, item_id: &str, created_at: &str) -> ItemLoanRecord {
    ItemLoanRecord {
        id: id.to_string(),
        requester_id: ResidentId("resident-unregistered".to_string()),
        status: "pending".to_string(),
        item_id: item_id.to_string(),
        created_at: created_at.to_string(),
        processed_at: None,
    }
}

/// Empty stores with the same wiring as [`seeded`].
pub(super) fn fixture(config: TriageConfig) -> Fixture {
    let requests = Arc::new(MemoryRequests::default());
    let sos = Arc::new(MemorySos::default());
    let items = Arc::new(MemoryItems::with_titles(&[("item-tent", "Folding tent")]));
    let relocations = Arc::new(MemoryRelocations::with_barangays(&[
        ("brgy-1", "San Isidro"),
        ("brgy-2", "Poblacion"),
    ]));
    relocations.push(RelocationRecord {
        id: "reloc-1".to_string(),
        requester_id: ResidentId(RESIDENT.to_string()),
        status: "pending".to_string(),
        from_barangay_id: "brgy-1".to_string(),
        to_barangay_id: "brgy-2".to_string(),
        created_at: (t0() - Duration::days(8)).to_rfc3339(),
        processed_at: None,
    });

    let sources = TriageSources {
        requests: requests.clone(),
        types: Arc::new(MemoryTypes::with(vec![clearance_type()])),
        people: Arc::new(MemoryPeople::default()),
        sos: sos.clone(),
        relocations,
        items: items.clone(),
    };

    Fixture {
        service: TriageService::new(sources, config),
        requests,
        sos,
        items,
    }
}

/// One request of every kind spread over every bucket.
///
/// Expected order: sos-1 (urgent), reloc-1, docreq-a, docreq-b, sos-2 (medium),
/// item-1 (low, unparsable timestamp).
pub(super) fn seeded() -> Fixture {
    let fixture = fixture(TriageConfig::default());
    fixture.requests.seed(pending_request("b"));
    fixture.requests.seed(pending_request("a"));
    fixture.sos.push(sos("sos-2", "Flood", t0() + Duration::hours(1)));
    fixture.sos.push(sos("sos-1", "Fire", t0()));
    fixture.items.push(item("item-1", "item-tent", "yesterday-ish"));
    fixture
}

pub(super) fn orphaned_document() -> crate::workflows::documents::domain::DocumentRequest {
    let mut request = pending_request("orphan");
    request.document_type_id = DocumentTypeId("doctype-deleted".to_string());
    request
}
