//! Item submission coordinator
//!
//! Sends batch items to the backend one record per item. The batch lock is
//! held only to validate and transition state; every network call runs with
//! no lock held so the operator can keep editing other items. Results are
//! applied by item key.

use chrono::Utc;
use futures::future::join_all;
use isa_common::api::InventoryBackend;
use isa_common::events::{EventBus, IsaEvent};
use isa_common::models::{CreateRecordRequest, RecordId, ScanRecord, SessionId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::batch::{CandidateBatch, ItemLifecycle, SubmitTicket};
use crate::error::{Result, ScannerError};

/// Records created by this scanner in the bound session, newest first
#[derive(Debug, Default)]
pub struct SubmissionHistory {
    records: Vec<ScanRecord>,
    /// Records with a delete call in flight
    retracting: HashSet<RecordId>,
}

impl SubmissionHistory {
    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        self.records.iter().any(|r| r.id == record_id)
    }

    fn push(&mut self, record: ScanRecord) {
        self.records.insert(0, record);
    }

    fn remove(&mut self, record_id: RecordId) -> Option<ScanRecord> {
        let index = self.records.iter().position(|r| r.id == record_id)?;
        Some(self.records.remove(index))
    }

    /// Guard a history record for deletion, returning its identifier
    fn begin_retract(&mut self, record_id: RecordId) -> Result<String> {
        if self.retracting.contains(&record_id) {
            return Err(ScannerError::RecordRetractInProgress(record_id));
        }
        let identifier = self
            .records
            .iter()
            .find(|r| r.id == record_id)
            .map(|r| r.identifier.clone())
            .ok_or(ScannerError::UnknownRecord(record_id))?;
        self.retracting.insert(record_id);
        Ok(identifier)
    }

    fn complete_retract(&mut self, record_id: RecordId) {
        self.retracting.remove(&record_id);
        self.remove(record_id);
    }

    fn abort_retract(&mut self, record_id: RecordId) {
        self.retracting.remove(&record_id);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

/// Drives per-item create and delete calls
pub struct SubmissionCoordinator {
    backend: Arc<dyn InventoryBackend>,
    batch: Arc<RwLock<CandidateBatch>>,
    history: Arc<RwLock<SubmissionHistory>>,
    events: EventBus,
}

impl SubmissionCoordinator {
    pub fn new(
        backend: Arc<dyn InventoryBackend>,
        batch: Arc<RwLock<CandidateBatch>>,
        history: Arc<RwLock<SubmissionHistory>>,
        events: EventBus,
    ) -> Self {
        Self {
            backend,
            batch,
            history,
            events,
        }
    }

    /// Submit the item at `index` to `session_id`
    ///
    /// On failure the item becomes `Failed` and the backend error is
    /// returned; other items are unaffected.
    pub async fn submit(&self, session_id: SessionId, index: usize) -> Result<ScanRecord> {
        let ticket = self.batch.write().await.mark_submitting(index)?;
        self.send(session_id, ticket).await
    }

    /// Submit every pending or failed item concurrently
    ///
    /// Returns one result per item that was eligible, in batch order.
    pub async fn submit_all(&self, session_id: SessionId) -> Vec<Result<ScanRecord>> {
        let tickets: Vec<SubmitTicket> = {
            let mut batch = self.batch.write().await;
            let eligible: Vec<usize> = batch
                .items()
                .iter()
                .enumerate()
                .filter(|(_, item)| {
                    matches!(item.lifecycle, ItemLifecycle::Pending | ItemLifecycle::Failed { .. })
                })
                .map(|(index, _)| index)
                .collect();
            eligible
                .into_iter()
                .filter_map(|index| batch.mark_submitting(index).ok())
                .collect()
        };

        join_all(tickets.into_iter().map(|ticket| self.send(session_id, ticket))).await
    }

    async fn send(&self, session_id: SessionId, ticket: SubmitTicket) -> Result<ScanRecord> {
        let request = CreateRecordRequest {
            session_id,
            identifier: ticket.identifier.clone(),
            po_number: ticket.po_number.clone(),
            quantity: ticket.quantity,
            manual_entry: false,
            detected_category: None,
        };

        match self.backend.create_record(request).await {
            Ok(record) => {
                let applied = self.batch.write().await.mark_submitted(ticket.key, &record);
                if !applied {
                    warn!(identifier = %ticket.identifier, "Submitted item no longer in batch");
                }
                self.history.write().await.push(record.clone());

                info!(
                    session_id = session_id,
                    identifier = %ticket.identifier,
                    record_id = record.id,
                    status = ?record.status,
                    "Item submitted"
                );
                self.events.emit_lossy(IsaEvent::ItemSubmitted {
                    item_key: ticket.key,
                    identifier: ticket.identifier,
                    record_id: record.id,
                    status: record.status,
                    timestamp: Utc::now(),
                });
                Ok(record)
            }
            Err(e) => {
                let reason = e.to_string();
                self.batch.write().await.mark_failed(ticket.key, reason.clone());

                warn!(identifier = %ticket.identifier, "Submission failed: {}", reason);
                self.events.emit_lossy(IsaEvent::ItemFailed {
                    item_key: ticket.key,
                    identifier: ticket.identifier,
                    reason,
                    timestamp: Utc::now(),
                });
                Err(ScannerError::Backend(e))
            }
        }
    }

    /// Delete the record behind a submitted item
    ///
    /// On success the item leaves the batch and the history. On failure
    /// nothing changes.
    pub async fn delete_submitted(&self, index: usize) -> Result<()> {
        let ticket = self.batch.write().await.begin_retract(index)?;

        match self.backend.delete_record(ticket.record_id).await {
            Ok(()) => {
                self.batch.write().await.complete_retract(ticket.key);
                self.history.write().await.remove(ticket.record_id);

                info!(record_id = ticket.record_id, identifier = %ticket.identifier, "Record retracted");
                self.events.emit_lossy(IsaEvent::ItemRetracted {
                    record_id: ticket.record_id,
                    identifier: ticket.identifier,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                self.batch.write().await.abort_retract(ticket.key);
                warn!(record_id = ticket.record_id, "Retraction failed: {}", e);
                Err(ScannerError::Backend(e))
            }
        }
    }

    /// Delete a record from the history (manual entries or earlier batches)
    ///
    /// Records still present in the batch go through [`Self::delete_submitted`].
    /// A second call for a record already being deleted is refused.
    pub async fn delete_record(&self, record_id: RecordId) -> Result<()> {
        let in_batch = self.batch.read().await.index_of_record(record_id);
        if let Some(index) = in_batch {
            return self.delete_submitted(index).await;
        }

        let identifier = self.history.write().await.begin_retract(record_id)?;

        match self.backend.delete_record(record_id).await {
            Ok(()) => {
                self.history.write().await.complete_retract(record_id);

                info!(record_id = record_id, identifier = %identifier, "Record retracted");
                self.events.emit_lossy(IsaEvent::ItemRetracted {
                    record_id,
                    identifier,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                self.history.write().await.abort_retract(record_id);
                warn!(record_id = record_id, "Retraction failed: {}", e);
                Err(ScannerError::Backend(e))
            }
        }
    }

    /// Submit a hand-typed identifier outside the batch
    pub async fn submit_manual(
        &self,
        session_id: SessionId,
        identifier: &str,
        po_number: Option<String>,
        quantity: f64,
    ) -> Result<ScanRecord> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ScannerError::EmptyIdentifier);
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ScannerError::InvalidQuantity(quantity));
        }

        let request = CreateRecordRequest {
            session_id,
            identifier: identifier.to_string(),
            po_number: po_number.filter(|po| !po.trim().is_empty()),
            quantity,
            manual_entry: true,
            detected_category: None,
        };

        let record = self.backend.create_record(request).await?;
        self.history.write().await.push(record.clone());
        info!(
            session_id = session_id,
            identifier = %identifier,
            record_id = record.id,
            "Manual entry submitted"
        );
        Ok(record)
    }
}
