//! In-memory InventoryBackend for the dashboard

use async_trait::async_trait;
use chrono::Utc;
use isa_common::api::{EventStream, InventoryBackend};
use isa_common::events::ServerEvent;
use isa_common::models::{
    ActiveSessionStats, Bom, Category, CategoryStatus, CreateRecordRequest, InventoryOverview,
    InventorySessionInfo, InventorySummary, InventoryTotals, NewSession, Overview, RecordId,
    ScanMode, ScanRecord, ScanSession, SessionFilter, SessionId, SessionSummary,
};
use isa_common::{Error, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, Semaphore};

pub fn record(id: RecordId, session_id: SessionId) -> ScanRecord {
    ScanRecord {
        id,
        session_id: Some(session_id),
        identifier: format!("{:010}", id),
        part_number: None,
        description: None,
        po_number: None,
        quantity: 1.0,
        scanned_at: Some(Utc::now()),
        manual_entry: false,
        expected_quantity: None,
        status: None,
        detected_category: None,
    }
}

/// Overview listing `ids` as active inventory sessions
pub fn overview_with_active(ids: &[SessionId]) -> Overview {
    Overview {
        categories: Vec::new(),
        inventory: InventoryOverview {
            status: if ids.is_empty() {
                CategoryStatus::NotStarted
            } else {
                CategoryStatus::InProgress
            },
            active_sessions: ids
                .iter()
                .map(|&id| ActiveSessionStats {
                    id,
                    mode: ScanMode::Inventory,
                    started_at: Utc::now(),
                    bom_name: None,
                    scanned_items: 0,
                    expected_items: None,
                    match_count: 0,
                    over_count: 0,
                    under_count: 0,
                })
                .collect(),
            last_session: None,
        },
    }
}

fn scan_session(id: SessionId, mode: ScanMode) -> ScanSession {
    ScanSession {
        id,
        user_id: Some(1),
        mode,
        category: Some(Category::Cctv),
        bom_id: Some(1),
        bom_name: Some("Tower A".into()),
        bom_items_count: Some(0),
        scanned_items_count: Some(0),
        started_at: Utc::now(),
        ended_at: None,
        is_active: true,
    }
}

/// What one `open_event_stream` call produces
pub enum StreamScript {
    /// Connection refused
    Refuse,
    /// Stream fed from the paired sender; ends when the sender drops
    Channel(mpsc::UnboundedReceiver<Result<ServerEvent>>),
}

impl StreamScript {
    pub fn channel() -> (mpsc::UnboundedSender<Result<ServerEvent>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, StreamScript::Channel(rx))
    }
}

pub struct MockBackend {
    overview: Mutex<Overview>,
    missing_sessions: Mutex<HashSet<SessionId>>,
    streams: Mutex<VecDeque<StreamScript>>,
    held_detail: Mutex<Option<SessionId>>,
    detail_gate: Semaphore,
    pub overview_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
    pub inventory_summary_calls: AtomicUsize,
    pub detail_started: AtomicUsize,
    pub stream_opens: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_record_calls: AtomicUsize,
    pub end_calls: AtomicUsize,
    pub delete_session_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            overview: Mutex::new(overview_with_active(&[])),
            missing_sessions: Mutex::new(HashSet::new()),
            streams: Mutex::new(VecDeque::new()),
            held_detail: Mutex::new(None),
            detail_gate: Semaphore::new(0),
            overview_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            inventory_summary_calls: AtomicUsize::new(0),
            detail_started: AtomicUsize::new(0),
            stream_opens: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_record_calls: AtomicUsize::new(0),
            end_calls: AtomicUsize::new(0),
            delete_session_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_overview(&self, overview: Overview) {
        *self.overview.lock().unwrap() = overview;
    }

    pub fn forget_session(&self, session_id: SessionId) {
        self.missing_sessions.lock().unwrap().insert(session_id);
    }

    pub fn script_stream(&self, script: StreamScript) {
        self.streams.lock().unwrap().push_back(script);
    }

    /// Park detail fetches for `session_id` until released
    pub fn hold_detail(&self, session_id: SessionId) {
        *self.held_detail.lock().unwrap() = Some(session_id);
    }

    pub fn release_detail(&self) {
        self.detail_gate.add_permits(1);
    }

    async fn detail_checkpoint(&self, session_id: SessionId) -> Result<()> {
        self.detail_started.fetch_add(1, Ordering::SeqCst);
        let held = *self.held_detail.lock().unwrap() == Some(session_id);
        if held {
            self.detail_gate
                .acquire()
                .await
                .map_err(|e| Error::Network(e.to_string()))?
                .forget();
        }
        if self.missing_sessions.lock().unwrap().contains(&session_id) {
            return Err(Error::Http {
                status: 404,
                message: "Session not found".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryBackend for MockBackend {
    async fn create_record(&self, _request: CreateRecordRequest) -> Result<ScanRecord> {
        Err(Error::InvalidInput("not used by the dashboard".into()))
    }

    async fn delete_record(&self, _record_id: RecordId) -> Result<()> {
        self.delete_record_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_record_quantity(&self, record_id: RecordId, quantity: f64) -> Result<ScanRecord> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut updated = record(record_id, 1);
        updated.quantity = quantity;
        Ok(updated)
    }

    async fn list_sessions(&self, _filter: &SessionFilter) -> Result<Vec<ScanSession>> {
        Ok(Vec::new())
    }

    async fn create_session(&self, _new_session: &NewSession) -> Result<ScanSession> {
        Err(Error::InvalidInput("not used by the dashboard".into()))
    }

    async fn end_session(&self, _session_id: SessionId) -> Result<()> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        self.delete_session_calls.fetch_add(1, Ordering::SeqCst);
        self.forget_session(session_id);
        Ok(())
    }

    async fn list_boms(&self, _category: Option<Category>) -> Result<Vec<Bom>> {
        Ok(Vec::new())
    }

    async fn overview(&self) -> Result<Overview> {
        self.overview_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.overview.lock().unwrap().clone())
    }

    async fn session_summary(&self, session_id: SessionId) -> Result<SessionSummary> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.detail_checkpoint(session_id).await?;
        Ok(SessionSummary {
            session: scan_session(session_id, ScanMode::Bom),
            items: Vec::new(),
            total_items: 0,
            match_count: 0,
            over_count: 0,
            under_count: 0,
        })
    }

    async fn inventory_summary(&self, session_id: SessionId) -> Result<InventorySummary> {
        self.inventory_summary_calls.fetch_add(1, Ordering::SeqCst);
        self.detail_checkpoint(session_id).await?;
        Ok(InventorySummary {
            session: InventorySessionInfo {
                id: session_id,
                mode: ScanMode::Inventory,
                category: None,
                started_at: Utc::now(),
                ended_at: None,
                is_active: true,
            },
            summary: InventoryTotals {
                total_unique_items: 0,
                total_scans: 0,
                total_quantity: 0.0,
            },
            items: Vec::new(),
        })
    }

    async fn open_event_stream(&self) -> Result<EventStream> {
        self.stream_opens.fetch_add(1, Ordering::SeqCst);
        let script = self.streams.lock().unwrap().pop_front();
        match script {
            Some(StreamScript::Channel(mut rx)) => {
                let events = async_stream::stream! {
                    while let Some(item) = rx.recv().await {
                        yield item;
                    }
                };
                Ok(Box::pin(events))
            }
            Some(StreamScript::Refuse) | None => Err(Error::Network("connection refused".into())),
        }
    }
}
