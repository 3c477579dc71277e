use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TriageConfig;
use crate::workflows::documents::domain::{DocumentStatus, DocumentTypeId, ResidentId};
use crate::workflows::documents::repository::{
    DocumentRequestRepository, DocumentTypeRepository, PeopleDirectory, RepositoryError,
    RequestFilter,
};

use super::envelope::{RequestEnvelope, RequestKind, TriageSource};
use super::scoring::{self, parse_timestamp, PriorityBucket};
use super::sources::{ItemLoanStore, RelocationStore, SosStore};

/// The stores a triage run fans out to.
#[derive(Clone)]
pub struct TriageSources {
    pub requests: Arc<dyn DocumentRequestRepository>,
    pub types: Arc<dyn DocumentTypeRepository>,
    pub people: Arc<dyn PeopleDirectory>,
    pub sos: Arc<dyn SosStore>,
    pub relocations: Arc<dyn RelocationStore>,
    pub items: Arc<dyn ItemLoanStore>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriageQuery {
    pub kind: Option<RequestKind>,
    pub status: Option<String>,
    pub priority: Option<PriorityBucket>,
    /// 1-based.
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriageItem {
    #[serde(flatten)]
    pub envelope: RequestEnvelope,
    pub priority: PriorityBucket,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriagePage {
    pub items: Vec<TriageItem>,
    pub meta: PageMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("invalid triage query: {0}")]
    InvalidQuery(String),
    #[error("{} store failed: {source}", .kind.label())]
    Source {
        kind: RequestKind,
        #[source]
        source: RepositoryError,
    },
    #[error("{} fetch aborted", .0.label())]
    FetchAborted(RequestKind),
    #[error("triage worker failed: {0}")]
    WorkerFailed(String),
}

impl TriageError {
    pub const fn kind(&self) -> &'static str {
        match self {
            TriageError::InvalidQuery(_) => "validation_error",
            TriageError::Source { .. } | TriageError::FetchAborted(_) => "storage_unavailable",
            TriageError::WorkerFailed(_) => "internal_error",
        }
    }
}

/// Builds the cross-type admin queue.
pub struct TriageService {
    sources: TriageSources,
    config: TriageConfig,
}

impl TriageService {
    pub fn new(sources: TriageSources, config: TriageConfig) -> Self {
        Self { sources, config }
    }

    pub fn queue(&self, query: &TriageQuery, now: DateTime<Utc>) -> Result<TriagePage, TriageError> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(TriageError::InvalidQuery("page starts at 1".to_string()));
        }
        let per_page = query.per_page.unwrap_or(self.config.default_page_size);
        if per_page == 0 {
            return Err(TriageError::InvalidQuery(
                "per_page must be at least 1".to_string(),
            ));
        }
        let per_page = per_page.min(self.config.max_page_size);

        let envelopes = self.collect(query)?;
        let mut items: Vec<TriageItem> = envelopes
            .into_iter()
            .map(|envelope| {
                let score = scoring::score(&envelope, now);
                TriageItem {
                    priority: PriorityBucket::from_score(score),
                    score,
                    envelope,
                }
            })
            .filter(|item| query.priority.map_or(true, |wanted| item.priority == wanted))
            .collect();

        sort_queue(&mut items);

        let total = items.len();
        let items: Vec<TriageItem> = items
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        debug!(total, page, per_page, "triage queue assembled");
        Ok(TriagePage {
            items,
            meta: PageMeta {
                total,
                page,
                per_page,
                pages: total.div_ceil(per_page),
            },
        })
    }

    /// Fetch every requested kind in parallel and project to envelopes.
    pub fn collect(&self, query: &TriageQuery) -> Result<Vec<RequestEnvelope>, TriageError> {
        let status = query.status.as_deref();
        let kinds: Vec<RequestKind> = RequestKind::ALL
            .into_iter()
            .filter(|kind| query.kind.map_or(true, |wanted| wanted == *kind))
            .collect();

        let batches: Vec<(RequestKind, thread::Result<Result<Vec<TriageSource>, RepositoryError>>)> =
            thread::scope(|scope| {
                let handles: Vec<_> = kinds
                    .iter()
                    .map(|kind| {
                        let kind = *kind;
                        (kind, scope.spawn(move || self.fetch(kind, status)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(kind, handle)| (kind, handle.join()))
                    .collect()
            });

        let mut envelopes = Vec::new();
        for (kind, outcome) in batches {
            let sources = outcome
                .map_err(|_| TriageError::FetchAborted(kind))?
                .map_err(|source| TriageError::Source { kind, source })?;
            envelopes.extend(sources.into_iter().map(TriageSource::to_envelope));
        }
        Ok(envelopes)
    }

    fn fetch(
        &self,
        kind: RequestKind,
        status: Option<&str>,
    ) -> Result<Vec<TriageSource>, RepositoryError> {
        match kind {
            RequestKind::Document => self.fetch_documents(status),
            RequestKind::Sos => self.fetch_sos(status),
            RequestKind::Relocation => self.fetch_relocations(status),
            RequestKind::Item => self.fetch_items(status),
        }
    }

    fn fetch_documents(&self, status: Option<&str>) -> Result<Vec<TriageSource>, RepositoryError> {
        let filter = match status {
            Some(raw) => match DocumentStatus::parse(raw) {
                Some(status) => RequestFilter::with_status(status),
                None => return Ok(Vec::new()),
            },
            None => RequestFilter::default(),
        };

        let mut type_names: HashMap<DocumentTypeId, Option<String>> = HashMap::new();
        let mut names = NameCache::default();
        let mut sources = Vec::new();
        for request in self.sources.requests.find(&filter)? {
            let document_type_name = type_names
                .entry(request.document_type_id.clone())
                .or_insert_with(|| {
                    lookup("document type", &request.document_type_id.0, || {
                        self.sources
                            .types
                            .fetch(&request.document_type_id)
                            .map(|found| found.map(|document_type| document_type.name))
                    })
                })
                .clone();
            let requester_name = names.resident(&*self.sources.people, &request.requester_id);
            sources.push(TriageSource::Document {
                request,
                document_type_name,
                requester_name,
            });
        }
        Ok(sources)
    }

    fn fetch_sos(&self, status: Option<&str>) -> Result<Vec<TriageSource>, RepositoryError> {
        let mut names = NameCache::default();
        Ok(self
            .sources
            .sos
            .list(status)?
            .into_iter()
            .map(|record| TriageSource::Sos {
                requester_name: names.resident(&*self.sources.people, &record.requester_id),
                record,
            })
            .collect())
    }

    fn fetch_relocations(&self, status: Option<&str>) -> Result<Vec<TriageSource>, RepositoryError> {
        let relocations = &*self.sources.relocations;
        let mut names = NameCache::default();
        let mut barangays: HashMap<String, Option<String>> = HashMap::new();
        let mut barangay = |id: &str| {
            barangays
                .entry(id.to_string())
                .or_insert_with(|| lookup("barangay", id, || relocations.barangay_name(id)))
                .clone()
        };

        Ok(relocations
            .list(status)?
            .into_iter()
            .map(|record| TriageSource::Relocation {
                from_barangay: barangay(&record.from_barangay_id),
                to_barangay: barangay(&record.to_barangay_id),
                requester_name: names.resident(&*self.sources.people, &record.requester_id),
                record,
            })
            .collect())
    }

    fn fetch_items(&self, status: Option<&str>) -> Result<Vec<TriageSource>, RepositoryError> {
        let items = &*self.sources.items;
        let mut names = NameCache::default();
        Ok(items
            .list(status)?
            .into_iter()
            .map(|record| TriageSource::Item {
                item_title: lookup("item", &record.item_id, || items.item_title(&record.item_id)),
                requester_name: names.resident(&*self.sources.people, &record.requester_id),
                record,
            })
            .collect())
    }
}

impl std::fmt::Debug for TriageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriageService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Bucket rank, then oldest first. Unparsable timestamps trail their bucket and
/// `(kind, id)` breaks every remaining tie.
pub fn sort_queue(items: &mut [TriageItem]) {
    items.sort_by(compare_items);
}

fn compare_items(a: &TriageItem, b: &TriageItem) -> Ordering {
    let a_created = parse_timestamp(&a.envelope.created_at);
    let b_created = parse_timestamp(&b.envelope.created_at);

    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| match (a_created, b_created) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.envelope.kind.cmp(&b.envelope.kind))
        .then_with(|| a.envelope.id.cmp(&b.envelope.id))
}

/// Resolve an optional related entity. Lookup errors degrade to `None`.
fn lookup<F>(entity: &'static str, id: &str, fetch: F) -> Option<String>
where
    F: FnOnce() -> Result<Option<String>, RepositoryError>,
{
    match fetch() {
        Ok(found) => found,
        Err(err) => {
            warn!(entity, id, error = %err, "related lookup failed; using fallback label");
            None
        }
    }
}

#[derive(Default)]
struct NameCache {
    residents: HashMap<ResidentId, Option<String>>,
}

impl NameCache {
    fn resident(&mut self, people: &dyn PeopleDirectory, id: &ResidentId) -> Option<String> {
        self.residents
            .entry(id.clone())
            .or_insert_with(|| {
                lookup("resident", &id.0, || {
                    people
                        .resident(id)
                        .map(|found| found.map(|contact| contact.full_name()))
                })
            })
            .clone()
    }
}
