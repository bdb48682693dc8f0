//! Scanner controller
//!
//! Single owner of the capture pipeline, batch, submission history and
//! session binding. UI layers hold a cheap clone, read snapshots, and change
//! state only through the methods here.

use chrono::Utc;
use isa_common::api::InventoryBackend;
use isa_common::config::ScannerConfig;
use isa_common::events::{EventBus, IsaEvent};
use isa_common::models::{
    Bom, Category, NewSession, RecordId, ScanRecord, ScanSession, SessionFilter, SessionId,
};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::batch::{CandidateBatch, CapturedItem};
use crate::capture::{CapturePipeline, Candidates, RecognizedText};
use crate::error::{Result, ScannerError};
use crate::session::{Discovery, SessionEngine, SessionState};
use crate::submission::{SubmissionCoordinator, SubmissionHistory};

struct Inner {
    pipeline: Mutex<CapturePipeline>,
    batch: Arc<RwLock<CandidateBatch>>,
    history: Arc<RwLock<SubmissionHistory>>,
    session: SessionEngine,
    coordinator: SubmissionCoordinator,
    events: EventBus,
}

/// Command surface of the scanner
#[derive(Clone)]
pub struct ScannerController {
    inner: Arc<Inner>,
}

impl ScannerController {
    pub fn new(backend: Arc<dyn InventoryBackend>, config: &ScannerConfig, events: EventBus) -> Self {
        let batch = Arc::new(RwLock::new(CandidateBatch::new(config.batch_cap)));
        let history = Arc::new(RwLock::new(SubmissionHistory::default()));
        let coordinator = SubmissionCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&batch),
            Arc::clone(&history),
            events.clone(),
        );

        Self {
            inner: Arc::new(Inner {
                pipeline: Mutex::new(CapturePipeline::from_config(config)),
                batch,
                history,
                session: SessionEngine::new(backend, events.clone()),
                coordinator,
                events,
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Feed one recognizer frame through throttle and extraction
    ///
    /// Updates the preview only; the batch is untouched until [`Self::capture`].
    pub async fn on_text(&self, frame: RecognizedText) -> Option<Candidates> {
        let candidates = self.inner.pipeline.lock().await.process(frame)?;
        self.inner.events.emit_lossy(IsaEvent::CandidatesDetected {
            identifiers: candidates.identifiers.clone(),
            po_numbers: candidates.po_numbers.clone(),
            timestamp: Utc::now(),
        });
        Some(candidates)
    }

    pub async fn preview(&self) -> Option<Candidates> {
        self.inner.pipeline.lock().await.preview().cloned()
    }

    /// Seed the batch from the current preview
    pub async fn capture(&self) -> Result<usize> {
        let candidates = self
            .preview()
            .await
            .ok_or(ScannerError::NoCandidates)?;
        let count = self.seed(&candidates).await?;
        self.inner.pipeline.lock().await.clear_preview();
        Ok(count)
    }

    /// Seed the batch from explicit candidates
    pub async fn seed(&self, candidates: &Candidates) -> Result<usize> {
        if candidates.is_empty() {
            return Err(ScannerError::NoCandidates);
        }
        let count = self.inner.batch.write().await.seed(candidates)?;
        info!(items = count, "Batch seeded");
        self.inner.events.emit_lossy(IsaEvent::BatchSeeded {
            item_count: count,
            timestamp: Utc::now(),
        });
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Batch review
    // ------------------------------------------------------------------

    pub async fn batch(&self) -> Vec<CapturedItem> {
        self.inner.batch.read().await.snapshot()
    }

    pub async fn set_quantity(&self, index: usize, quantity: f64) -> Result<()> {
        self.inner.batch.write().await.set_quantity(index, quantity)
    }

    pub async fn increment(&self, index: usize) -> Result<f64> {
        self.inner.batch.write().await.increment(index)
    }

    pub async fn decrement(&self, index: usize) -> Result<f64> {
        self.inner.batch.write().await.decrement(index)
    }

    pub async fn remove(&self, index: usize) -> Result<CapturedItem> {
        self.inner.batch.write().await.remove(index)
    }

    /// Clear a batch whose items are all submitted
    pub async fn dismiss_batch(&self) -> Result<()> {
        self.inner.batch.write().await.dismiss()?;
        self.inner.events.emit_lossy(IsaEvent::BatchDismissed { timestamp: Utc::now() });
        Ok(())
    }

    /// Throw away the batch, including unsent items
    pub async fn discard_batch(&self) -> Result<usize> {
        let count = self.inner.batch.write().await.discard()?;
        if count > 0 {
            info!(items = count, "Batch discarded");
            self.inner.events.emit_lossy(IsaEvent::BatchDismissed { timestamp: Utc::now() });
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    pub async fn submit(&self, index: usize) -> Result<ScanRecord> {
        let session_id = self.inner.session.active_id().await?;
        self.inner.coordinator.submit(session_id, index).await
    }

    pub async fn submit_all(&self) -> Result<Vec<Result<ScanRecord>>> {
        let session_id = self.inner.session.active_id().await?;
        Ok(self.inner.coordinator.submit_all(session_id).await)
    }

    pub async fn delete_submitted(&self, index: usize) -> Result<()> {
        self.inner.coordinator.delete_submitted(index).await
    }

    /// Delete any record this scanner created in the bound session
    pub async fn retract_record(&self, record_id: RecordId) -> Result<()> {
        self.inner.coordinator.delete_record(record_id).await
    }

    pub async fn submit_manual(
        &self,
        identifier: &str,
        po_number: Option<String>,
        quantity: f64,
    ) -> Result<ScanRecord> {
        let session_id = self.inner.session.active_id().await?;
        self.inner
            .coordinator
            .submit_manual(session_id, identifier, po_number, quantity)
            .await
    }

    pub async fn history(&self) -> Vec<ScanRecord> {
        self.inner.history.read().await.records().to_vec()
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub async fn session_state(&self) -> SessionState {
        self.inner.session.state().await
    }

    pub async fn active_session(&self) -> Option<ScanSession> {
        self.inner.session.active().await
    }

    pub async fn discover(&self, filter: &SessionFilter, new_session: NewSession) -> Result<Discovery> {
        self.inner.session.discover(filter, new_session).await
    }

    pub async fn find_resumable(&self, filter: &SessionFilter) -> Result<Vec<ScanSession>> {
        self.inner.session.find_resumable(filter).await
    }

    pub async fn create_session(&self, new_session: NewSession) -> Result<ScanSession> {
        self.inner.session.create(new_session).await
    }

    pub async fn resume(&self, session_id: SessionId) -> Result<ScanSession> {
        self.inner.session.resume(session_id).await
    }

    pub async fn cancel_choice(&self) -> Result<()> {
        self.inner.session.cancel_choice().await
    }

    pub async fn list_boms(&self, category: Option<Category>) -> Result<Vec<Bom>> {
        self.inner.session.list_boms(category).await
    }

    /// End the bound session
    ///
    /// Refused while the batch holds unsent items. A closed batch is
    /// cleared together with the history on success.
    pub async fn end_session(&self) -> Result<ScanSession> {
        self.ensure_no_unsent().await?;
        let session = self.inner.session.end().await?;
        self.clear_session_data().await;
        Ok(session)
    }

    /// Leave the session open for later resume
    pub async fn detach(&self) -> Result<ScanSession> {
        self.ensure_no_unsent().await?;
        let session = self.inner.session.detach().await?;
        self.clear_session_data().await;
        Ok(session)
    }

    async fn ensure_no_unsent(&self) -> Result<()> {
        let batch = self.inner.batch.read().await;
        if batch.has_in_flight() {
            return Err(ScannerError::BatchBusy);
        }
        match batch.unsent_count() {
            0 => Ok(()),
            n => Err(ScannerError::UnsentItems(n)),
        }
    }

    async fn clear_session_data(&self) {
        {
            let mut batch = self.inner.batch.write().await;
            if batch.is_closed() {
                batch.clear();
            }
        }
        self.inner.history.write().await.clear();
        self.inner.pipeline.lock().await.clear_preview();
    }
}
