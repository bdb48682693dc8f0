//! Candidate batch state machine
//!
//! A batch is the set of identifiers captured in one pass, held for
//! operator review. Each item moves through:
//!
//! ```text
//! Pending ──submit──▶ Submitting ──ok──▶ Submitted ──delete──▶ (removed)
//!    ▲                    │
//!    └──── Failed ◀──err──┘        (Failed may be edited and resubmitted)
//! ```
//!
//! Operator operations (`seed`, `set_quantity`, `remove`, `dismiss`) are
//! public. Lifecycle transitions are crate-private and driven only by the
//! submission coordinator, addressed by stable [`ItemKey`] so that results
//! arriving after indices shifted still land on the right item.

use isa_common::models::{ReconciliationStatus, RecordId, ScanRecord};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::capture::Candidates;
use crate::error::{Result, ScannerError};

/// Stable identity of one batch item
pub type ItemKey = Uuid;

/// Server-computed fields copied from the created record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub description: Option<String>,
    pub part_number: Option<String>,
    pub detected_category: Option<String>,
    pub expected_quantity: Option<f64>,
    pub status: Option<ReconciliationStatus>,
}

impl From<&ScanRecord> for Reconciliation {
    fn from(record: &ScanRecord) -> Self {
        Self {
            description: record.description.clone(),
            part_number: record.part_number.clone(),
            detected_category: record.detected_category.clone(),
            expected_quantity: record.expected_quantity,
            status: record.status,
        }
    }
}

/// Lifecycle of one batch item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemLifecycle {
    Pending,
    Submitting,
    Submitted {
        record_id: RecordId,
        reconciliation: Reconciliation,
    },
    Failed {
        reason: String,
    },
}

impl ItemLifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            ItemLifecycle::Pending => "pending",
            ItemLifecycle::Submitting => "submitting",
            ItemLifecycle::Submitted { .. } => "submitted",
            ItemLifecycle::Failed { .. } => "failed",
        }
    }
}

/// One captured identifier under review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedItem {
    pub key: ItemKey,
    pub identifier: String,
    pub po_number: Option<String>,
    pub quantity: f64,
    pub lifecycle: ItemLifecycle,
}

impl CapturedItem {
    fn new(identifier: String, po_number: Option<String>) -> Self {
        Self {
            key: Uuid::new_v4(),
            identifier,
            po_number,
            quantity: 1.0,
            lifecycle: ItemLifecycle::Pending,
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        match &self.lifecycle {
            ItemLifecycle::Submitted { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }

    pub fn reconciliation(&self) -> Option<&Reconciliation> {
        match &self.lifecycle {
            ItemLifecycle::Submitted { reconciliation, .. } => Some(reconciliation),
            _ => None,
        }
    }

    /// Submitted with an over/under status, so the operator may retract it
    pub fn retract_available(&self) -> bool {
        self.reconciliation()
            .and_then(|r| r.status)
            .map(|s| s.is_discrepancy())
            .unwrap_or(false)
    }

    /// Not yet accepted by the backend
    pub fn is_unsent(&self) -> bool {
        !matches!(self.lifecycle, ItemLifecycle::Submitted { .. })
    }

    fn is_editable(&self) -> bool {
        matches!(self.lifecycle, ItemLifecycle::Pending | ItemLifecycle::Failed { .. })
    }
}

/// What the coordinator needs to send one item
#[derive(Debug, Clone)]
pub(crate) struct SubmitTicket {
    pub key: ItemKey,
    pub identifier: String,
    pub po_number: Option<String>,
    pub quantity: f64,
}

/// What the coordinator needs to retract one item
#[derive(Debug, Clone)]
pub(crate) struct RetractTicket {
    pub key: ItemKey,
    pub record_id: RecordId,
    pub identifier: String,
}

/// The current batch
#[derive(Debug)]
pub struct CandidateBatch {
    items: Vec<CapturedItem>,
    cap: usize,
    retracting: HashSet<ItemKey>,
}

impl CandidateBatch {
    pub fn new(cap: usize) -> Self {
        Self {
            items: Vec::new(),
            cap,
            retracting: HashSet::new(),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CapturedItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&CapturedItem> {
        self.items.get(index)
    }

    /// Cloned read view for rendering
    pub fn snapshot(&self) -> Vec<CapturedItem> {
        self.items.clone()
    }

    /// Items not yet accepted by the backend
    pub fn unsent_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_unsent()).count()
    }

    /// Any submission or deletion awaiting the backend
    pub fn has_in_flight(&self) -> bool {
        !self.retracting.is_empty()
            || self
                .items
                .iter()
                .any(|i| matches!(i.lifecycle, ItemLifecycle::Submitting))
    }

    /// Non-empty and every item submitted
    pub fn is_closed(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| !i.is_unsent())
    }

    /// Replace the batch with fresh pending items, quantity 1
    ///
    /// Duplicates are dropped and the batch is truncated to the cap. Rejected
    /// without change while anything is in flight.
    pub fn seed(&mut self, candidates: &Candidates) -> Result<usize> {
        if self.has_in_flight() {
            return Err(ScannerError::BatchBusy);
        }

        let mut items: Vec<CapturedItem> = Vec::with_capacity(self.cap);
        for (identifier, po_number) in candidates.pairs() {
            if items.len() == self.cap {
                break;
            }
            if items.iter().any(|i| i.identifier == identifier) {
                continue;
            }
            items.push(CapturedItem::new(identifier, po_number));
        }

        self.items = items;
        Ok(self.items.len())
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut CapturedItem> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(ScannerError::IndexOutOfRange { index, len })
    }

    /// Set the quantity of a pending or failed item
    ///
    /// Non-positive or non-finite values are rejected and the prior value kept.
    pub fn set_quantity(&mut self, index: usize, value: f64) -> Result<()> {
        let item = self.item_mut(index)?;
        if !item.is_editable() {
            return Err(ScannerError::NotEditable {
                index,
                state: item.lifecycle.name(),
            });
        }
        if !value.is_finite() || value <= 0.0 {
            return Err(ScannerError::InvalidQuantity(value));
        }
        item.quantity = value;
        Ok(())
    }

    pub fn increment(&mut self, index: usize) -> Result<f64> {
        let next = self.item_mut(index)?.quantity + 1.0;
        self.set_quantity(index, next)?;
        Ok(next)
    }

    /// Step the quantity down, never below 1
    pub fn decrement(&mut self, index: usize) -> Result<f64> {
        let next = (self.item_mut(index)?.quantity - 1.0).max(1.0);
        self.set_quantity(index, next)?;
        Ok(next)
    }

    /// Remove a pending item; later indices shift down
    pub fn remove(&mut self, index: usize) -> Result<CapturedItem> {
        let item = self.item_mut(index)?;
        if !matches!(item.lifecycle, ItemLifecycle::Pending) {
            return Err(ScannerError::NotRemovable {
                index,
                state: item.lifecycle.name(),
            });
        }
        Ok(self.items.remove(index))
    }

    /// Clear a closed batch
    pub fn dismiss(&mut self) -> Result<()> {
        if !self.is_closed() {
            return Err(ScannerError::BatchOpen);
        }
        self.clear();
        Ok(())
    }

    /// Drop every item without checks; callers own the state guard
    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Drop every item regardless of state, unless something is in flight
    pub fn discard(&mut self) -> Result<usize> {
        if self.has_in_flight() {
            return Err(ScannerError::BatchBusy);
        }
        let count = self.items.len();
        self.items.clear();
        Ok(count)
    }

    pub fn index_of(&self, key: ItemKey) -> Option<usize> {
        self.items.iter().position(|i| i.key == key)
    }

    pub fn index_of_record(&self, record_id: RecordId) -> Option<usize> {
        self.items.iter().position(|i| i.record_id() == Some(record_id))
    }

    // ------------------------------------------------------------------
    // Coordinator transitions
    // ------------------------------------------------------------------

    /// Pending/Failed → Submitting
    pub(crate) fn mark_submitting(&mut self, index: usize) -> Result<SubmitTicket> {
        let item = self.item_mut(index)?;
        match item.lifecycle {
            ItemLifecycle::Submitting => return Err(ScannerError::AlreadySubmitting { index }),
            ItemLifecycle::Submitted { .. } => return Err(ScannerError::AlreadySubmitted { index }),
            ItemLifecycle::Pending | ItemLifecycle::Failed { .. } => {}
        }
        if !item.quantity.is_finite() || item.quantity <= 0.0 {
            return Err(ScannerError::InvalidQuantity(item.quantity));
        }

        item.lifecycle = ItemLifecycle::Submitting;
        Ok(SubmitTicket {
            key: item.key,
            identifier: item.identifier.clone(),
            po_number: item.po_number.clone(),
            quantity: item.quantity,
        })
    }

    /// Submitting → Submitted, copying the server's reconciliation fields
    ///
    /// The operator-entered quantity is kept. Returns false when the item is
    /// gone or no longer submitting.
    pub(crate) fn mark_submitted(&mut self, key: ItemKey, record: &ScanRecord) -> bool {
        match self.items.iter_mut().find(|i| i.key == key) {
            Some(item) if matches!(item.lifecycle, ItemLifecycle::Submitting) => {
                item.lifecycle = ItemLifecycle::Submitted {
                    record_id: record.id,
                    reconciliation: Reconciliation::from(record),
                };
                true
            }
            _ => false,
        }
    }

    /// Submitting → Failed
    pub(crate) fn mark_failed(&mut self, key: ItemKey, reason: impl Into<String>) -> bool {
        match self.items.iter_mut().find(|i| i.key == key) {
            Some(item) if matches!(item.lifecycle, ItemLifecycle::Submitting) => {
                item.lifecycle = ItemLifecycle::Failed {
                    reason: reason.into(),
                };
                true
            }
            _ => false,
        }
    }

    /// Guard a submitted item against concurrent deletion
    pub(crate) fn begin_retract(&mut self, index: usize) -> Result<RetractTicket> {
        let len = self.items.len();
        let item = self
            .items
            .get(index)
            .ok_or(ScannerError::IndexOutOfRange { index, len })?;
        let record_id = item
            .record_id()
            .ok_or(ScannerError::NotSubmitted { index })?;
        if self.retracting.contains(&item.key) {
            return Err(ScannerError::RetractInProgress { index });
        }

        let ticket = RetractTicket {
            key: item.key,
            record_id,
            identifier: item.identifier.clone(),
        };
        self.retracting.insert(ticket.key);
        Ok(ticket)
    }

    /// Deletion confirmed: remove the item
    pub(crate) fn complete_retract(&mut self, key: ItemKey) -> Option<CapturedItem> {
        self.retracting.remove(&key);
        self.index_of(key).map(|index| self.items.remove(index))
    }

    /// Deletion failed: release the guard, item untouched
    pub(crate) fn abort_retract(&mut self, key: ItemKey) {
        self.retracting.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(ids: &[&str]) -> Candidates {
        Candidates {
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
            po_numbers: Vec::new(),
        }
    }

    fn record(id: RecordId, status: ReconciliationStatus) -> ScanRecord {
        ScanRecord {
            id,
            session_id: Some(1),
            identifier: "8765432109".into(),
            part_number: Some("PN-1".into()),
            description: Some("Dome camera".into()),
            po_number: None,
            quantity: 99.0,
            scanned_at: None,
            manual_entry: false,
            expected_quantity: Some(5.0),
            status: Some(status),
            detected_category: Some("CCTV".into()),
        }
    }

    fn seeded(ids: &[&str]) -> CandidateBatch {
        let mut batch = CandidateBatch::new(5);
        batch.seed(&candidates(ids)).unwrap();
        batch
    }

    #[test]
    fn test_seed_defaults() {
        let batch = seeded(&["1111111111", "2222222222"]);
        assert_eq!(batch.len(), 2);
        for item in batch.items() {
            assert_eq!(item.quantity, 1.0);
            assert_eq!(item.lifecycle, ItemLifecycle::Pending);
            assert!(item.record_id().is_none());
        }
    }

    #[test]
    fn test_seed_drops_duplicates_and_caps() {
        let mut batch = CandidateBatch::new(2);
        batch
            .seed(&candidates(&["1111111111", "1111111111", "2222222222", "3333333333"]))
            .unwrap();
        let ids: Vec<_> = batch.items().iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["1111111111", "2222222222"]);
    }

    #[test]
    fn test_seed_rejected_while_submitting() {
        let mut batch = seeded(&["1111111111"]);
        batch.mark_submitting(0).unwrap();

        let err = batch.seed(&candidates(&["2222222222"])).unwrap_err();
        assert!(matches!(err, ScannerError::BatchBusy));
        assert_eq!(batch.items()[0].identifier, "1111111111");
    }

    #[test]
    fn test_set_quantity_validation_keeps_prior_value() {
        let mut batch = seeded(&["1111111111"]);
        batch.set_quantity(0, 4.5).unwrap();

        assert!(matches!(batch.set_quantity(0, 0.0), Err(ScannerError::InvalidQuantity(_))));
        assert!(matches!(batch.set_quantity(0, -2.0), Err(ScannerError::InvalidQuantity(_))));
        assert!(matches!(batch.set_quantity(0, f64::NAN), Err(ScannerError::InvalidQuantity(_))));
        assert_eq!(batch.items()[0].quantity, 4.5);
    }

    #[test]
    fn test_set_quantity_rejected_once_submitting() {
        let mut batch = seeded(&["1111111111"]);
        batch.mark_submitting(0).unwrap();
        let err = batch.set_quantity(0, 3.0).unwrap_err();
        assert!(matches!(err, ScannerError::NotEditable { state: "submitting", .. }));
    }

    #[test]
    fn test_failed_item_is_editable() {
        let mut batch = seeded(&["1111111111"]);
        let ticket = batch.mark_submitting(0).unwrap();
        assert!(batch.mark_failed(ticket.key, "timeout"));
        batch.set_quantity(0, 2.0).unwrap();
        assert_eq!(batch.items()[0].quantity, 2.0);
    }

    #[test]
    fn test_decrement_floors_at_one() {
        let mut batch = seeded(&["1111111111"]);
        assert_eq!(batch.increment(0).unwrap(), 2.0);
        assert_eq!(batch.decrement(0).unwrap(), 1.0);
        assert_eq!(batch.decrement(0).unwrap(), 1.0);
    }

    #[test]
    fn test_remove_shifts_indices() {
        let mut batch = seeded(&["1111111111", "2222222222", "3333333333"]);
        let removed = batch.remove(0).unwrap();
        assert_eq!(removed.identifier, "1111111111");
        assert_eq!(batch.items()[0].identifier, "2222222222");
    }

    #[test]
    fn test_remove_only_pending() {
        let mut batch = seeded(&["1111111111"]);
        let ticket = batch.mark_submitting(0).unwrap();
        assert!(matches!(batch.remove(0), Err(ScannerError::NotRemovable { .. })));
        batch.mark_failed(ticket.key, "boom");
        assert!(matches!(batch.remove(0), Err(ScannerError::NotRemovable { state: "failed", .. })));
        assert!(matches!(batch.remove(3), Err(ScannerError::IndexOutOfRange { index: 3, len: 1 })));
    }

    #[test]
    fn test_second_submit_rejected() {
        let mut batch = seeded(&["1111111111"]);
        batch.mark_submitting(0).unwrap();
        assert!(matches!(batch.mark_submitting(0), Err(ScannerError::AlreadySubmitting { index: 0 })));
    }

    #[test]
    fn test_submitted_keeps_operator_quantity() {
        let mut batch = seeded(&["8765432109"]);
        batch.set_quantity(0, 3.0).unwrap();
        let ticket = batch.mark_submitting(0).unwrap();
        assert!(batch.mark_submitted(ticket.key, &record(42, ReconciliationStatus::Over)));

        let item = &batch.items()[0];
        assert_eq!(item.quantity, 3.0);
        assert_eq!(item.record_id(), Some(42));
        assert_eq!(item.reconciliation().unwrap().expected_quantity, Some(5.0));
        assert!(item.retract_available());
        assert!(matches!(batch.mark_submitting(0), Err(ScannerError::AlreadySubmitted { .. })));
    }

    #[test]
    fn test_match_status_not_retractable() {
        let mut batch = seeded(&["8765432109"]);
        let ticket = batch.mark_submitting(0).unwrap();
        batch.mark_submitted(ticket.key, &record(1, ReconciliationStatus::Match));
        assert!(!batch.items()[0].retract_available());
    }

    #[test]
    fn test_result_lands_by_key_after_shift() {
        let mut batch = seeded(&["1111111111", "2222222222"]);
        let ticket = batch.mark_submitting(1).unwrap();
        batch.remove(0).unwrap();

        assert!(batch.mark_submitted(ticket.key, &record(7, ReconciliationStatus::Match)));
        assert_eq!(batch.items()[0].identifier, "2222222222");
        assert_eq!(batch.items()[0].record_id(), Some(7));
    }

    #[test]
    fn test_closed_and_dismiss() {
        let mut batch = seeded(&["1111111111", "2222222222"]);
        assert!(matches!(batch.dismiss(), Err(ScannerError::BatchOpen)));

        for index in 0..2 {
            let ticket = batch.mark_submitting(index).unwrap();
            batch.mark_submitted(ticket.key, &record(index as i64, ReconciliationStatus::Match));
        }
        assert!(batch.is_closed());
        batch.dismiss().unwrap();
        assert!(batch.is_empty());
        assert!(!batch.is_closed());
    }

    #[test]
    fn test_retract_guard() {
        let mut batch = seeded(&["1111111111"]);
        assert!(matches!(batch.begin_retract(0), Err(ScannerError::NotSubmitted { index: 0 })));

        let ticket = batch.mark_submitting(0).unwrap();
        batch.mark_submitted(ticket.key, &record(9, ReconciliationStatus::Under));

        let retract = batch.begin_retract(0).unwrap();
        assert_eq!(retract.record_id, 9);
        assert!(matches!(batch.begin_retract(0), Err(ScannerError::RetractInProgress { .. })));
        assert!(matches!(batch.seed(&candidates(&["2222222222"])), Err(ScannerError::BatchBusy)));

        batch.abort_retract(retract.key);
        assert_eq!(batch.len(), 1);

        let retract = batch.begin_retract(0).unwrap();
        let removed = batch.complete_retract(retract.key).unwrap();
        assert_eq!(removed.record_id(), Some(9));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_reseed_after_retract_is_fresh() {
        let mut batch = seeded(&["8765432109"]);
        let ticket = batch.mark_submitting(0).unwrap();
        batch.mark_submitted(ticket.key, &record(3, ReconciliationStatus::Over));
        let retract = batch.begin_retract(0).unwrap();
        batch.complete_retract(retract.key);

        batch.seed(&candidates(&["8765432109"])).unwrap();
        let item = &batch.items()[0];
        assert_eq!(item.lifecycle, ItemLifecycle::Pending);
        assert!(item.record_id().is_none());
        assert_ne!(item.key, ticket.key);
    }
}
