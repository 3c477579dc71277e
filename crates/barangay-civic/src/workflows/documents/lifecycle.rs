use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{DocumentRequestId, DocumentStatus};

/// Rejected state change, carrying both ends so callers can report it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move document request from {} to {}", .from.label(), .to.label())]
pub struct TransitionError {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
}

/// Legal edges of the issuance state machine.
pub fn can_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::*;

    match (from, to) {
        (Pending, Approved) | (Pending, Rejected) | (Pending, Ready) => true,
        (Approved, Ready) => true,
        (Ready, Completed) | (Ready, Expired) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

pub fn ensure_transition(from: DocumentStatus, to: DocumentStatus) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Per-request mutual exclusion for state transitions.
///
/// Every operation that reads a request, checks its state, and writes it back holds the
/// request's lock for the whole sequence, so two racing approvals cannot both observe
/// `Pending`.
#[derive(Debug, Default)]
pub struct RequestLocks {
    slots: Mutex<HashMap<DocumentRequestId, Arc<Mutex<()>>>>,
}

impl RequestLocks {
    /// Borrow the slot for `id`. The slot is dropped from the registry once the last lease
    /// for it goes away.
    pub fn lease(&self, id: &DocumentRequestId) -> SlotLease<'_> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = slots.entry(id.clone()).or_default().clone();
        SlotLease {
            locks: self,
            id: id.clone(),
            slot,
        }
    }

    fn release(&self, id: &DocumentRequestId) {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slots
            .get(id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Shared handle on one request's slot.
pub struct SlotLease<'a> {
    locks: &'a RequestLocks,
    id: DocumentRequestId,
    slot: Arc<Mutex<()>>,
}

impl SlotLease<'_> {
    /// Lock the slot, recovering from poisoning.
    pub fn hold(&self) -> MutexGuard<'_, ()> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        drop(std::mem::take(&mut self.slot));
        self.locks.release(&self.id);
    }
}
