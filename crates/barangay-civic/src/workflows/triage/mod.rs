//! Cross-type admin triage: normalize, score, sort, paginate.

pub mod envelope;
pub mod queue;
pub mod router;
pub mod scoring;
pub mod sources;

#[cfg(test)]
mod tests;

pub use envelope::{EnvelopeDetail, RequestEnvelope, RequestKind, RequestRef, TriageSource, UNKNOWN_LABEL};
pub use queue::{
    sort_queue, PageMeta, TriageError, TriageItem, TriagePage, TriageQuery, TriageService,
    TriageSources,
};
pub use router::triage_router;
pub use scoring::{score, PriorityBucket};
pub use sources::{
    status_matches, ItemLoanRecord, ItemLoanStore, RelocationRecord, RelocationStore, SosRecord,
    SosStore,
};
