//! In-memory InventoryBackend

use async_trait::async_trait;
use chrono::Utc;
use isa_common::api::{EventStream, InventoryBackend};
use isa_common::models::{
    Bom, Category, CreateRecordRequest, InventorySummary, NewSession, Overview,
    ReconciliationStatus, RecordId, ScanMode, ScanRecord, ScanSession, SessionFilter, SessionId,
    SessionSummary,
};
use isa_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Build a session fixture
pub fn session(id: SessionId, mode: ScanMode, is_active: bool) -> ScanSession {
    ScanSession {
        id,
        user_id: Some(1),
        mode,
        category: match mode {
            ScanMode::Bom => Some(Category::Cctv),
            ScanMode::Inventory => None,
        },
        bom_id: None,
        bom_name: None,
        bom_items_count: None,
        scanned_items_count: None,
        started_at: Utc::now(),
        ended_at: None,
        is_active,
    }
}

#[derive(Default)]
struct State {
    next_id: i64,
    sessions: Vec<ScanSession>,
    records: Vec<ScanRecord>,
    /// identifier → (status, expected quantity) returned on create
    reconciliation: HashMap<String, (ReconciliationStatus, Option<f64>)>,
    failing_identifiers: HashSet<String>,
    requests: Vec<CreateRecordRequest>,
}

pub struct MockBackend {
    state: Mutex<State>,
    pub create_record_calls: AtomicUsize,
    pub delete_record_calls: AtomicUsize,
    pub create_session_calls: AtomicUsize,
    pub end_session_calls: AtomicUsize,
    pub list_sessions_calls: AtomicUsize,
    pub fail_end: AtomicBool,
    pub fail_delete: AtomicBool,
    hold_creates: AtomicBool,
    gate: Semaphore,
    hold_deletes: AtomicBool,
    delete_gate: Semaphore,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            create_record_calls: AtomicUsize::new(0),
            delete_record_calls: AtomicUsize::new(0),
            create_session_calls: AtomicUsize::new(0),
            end_session_calls: AtomicUsize::new(0),
            list_sessions_calls: AtomicUsize::new(0),
            fail_end: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            hold_creates: AtomicBool::new(false),
            gate: Semaphore::new(0),
            hold_deletes: AtomicBool::new(false),
            delete_gate: Semaphore::new(0),
        }
    }

    pub fn with_sessions(sessions: Vec<ScanSession>) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.lock().unwrap();
            state.next_id = sessions.iter().map(|s| s.id).max().unwrap_or(0);
            state.sessions = sessions;
        }
        backend
    }

    /// Status the backend computes for `identifier`
    pub fn reconcile_as(&self, identifier: &str, status: ReconciliationStatus, expected: Option<f64>) {
        self.state
            .lock()
            .unwrap()
            .reconciliation
            .insert(identifier.to_string(), (status, expected));
    }

    pub fn fail_identifier(&self, identifier: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_identifiers
            .insert(identifier.to_string());
    }

    pub fn heal_identifier(&self, identifier: &str) {
        self.state.lock().unwrap().failing_identifiers.remove(identifier);
    }

    /// Park every create_record call until released
    pub fn hold_creates(&self) {
        self.hold_creates.store(true, Ordering::SeqCst);
    }

    pub fn release_creates(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Park every delete_record call until released
    pub fn hold_deletes(&self) {
        self.hold_deletes.store(true, Ordering::SeqCst);
    }

    pub fn release_deletes(&self, count: usize) {
        self.delete_gate.add_permits(count);
    }

    pub fn records(&self) -> Vec<ScanRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn requests(&self) -> Vec<CreateRecordRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn session(&self, id: SessionId) -> Option<ScanSession> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    fn next_id(state: &mut State) -> i64 {
        state.next_id += 1;
        state.next_id
    }
}

fn not_found(what: &str) -> Error {
    Error::Http {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl InventoryBackend for MockBackend {
    async fn create_record(&self, request: CreateRecordRequest) -> Result<ScanRecord> {
        self.create_record_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_creates.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .map_err(|e| Error::Network(e.to_string()))?
                .forget();
        }

        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        if state.failing_identifiers.contains(&request.identifier) {
            return Err(Error::Network("connection reset".into()));
        }
        let session = state
            .sessions
            .iter()
            .find(|s| s.id == request.session_id)
            .cloned()
            .ok_or_else(|| not_found("Session"))?;
        if !session.is_active {
            return Err(Error::Http {
                status: 400,
                message: "Session is not active".into(),
            });
        }

        let (status, expected_quantity) = match state.reconciliation.get(&request.identifier) {
            Some((status, expected)) => (Some(*status), *expected),
            None => (Some(ReconciliationStatus::Pending), None),
        };
        let record = ScanRecord {
            id: Self::next_id(&mut state),
            session_id: Some(request.session_id),
            identifier: request.identifier.clone(),
            part_number: None,
            description: Some(format!("Article {}", request.identifier)),
            po_number: request.po_number.clone(),
            quantity: request.quantity,
            scanned_at: Some(Utc::now()),
            manual_entry: request.manual_entry,
            expected_quantity,
            status,
            detected_category: None,
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn delete_record(&self, record_id: RecordId) -> Result<()> {
        self.delete_record_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_deletes.load(Ordering::SeqCst) {
            self.delete_gate
                .acquire()
                .await
                .map_err(|e| Error::Network(e.to_string()))?
                .forget();
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".into()));
        }
        let mut state = self.state.lock().unwrap();
        let index = state
            .records
            .iter()
            .position(|r| r.id == record_id)
            .ok_or_else(|| not_found("Record"))?;
        state.records.remove(index);
        Ok(())
    }

    async fn update_record_quantity(&self, record_id: RecordId, quantity: f64) -> Result<ScanRecord> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| not_found("Record"))?;
        record.quantity = quantity;
        Ok(record.clone())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<ScanSession>> {
        self.list_sessions_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state
            .sessions
            .iter()
            .filter(|s| !filter.active_only || s.is_active)
            .cloned()
            .collect())
    }

    async fn create_session(&self, new_session: &NewSession) -> Result<ScanSession> {
        self.create_session_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let mut created = session(Self::next_id(&mut state), new_session.mode, true);
        created.category = new_session.category;
        created.bom_id = new_session.bom_id;
        state.sessions.push(created.clone());
        Ok(created)
    }

    async fn end_session(&self, session_id: SessionId) -> Result<()> {
        self.end_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(Error::Network("timed out".into()));
        }
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| not_found("Session"))?;
        session.is_active = false;
        session.ended_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sessions.retain(|s| s.id != session_id);
        state.records.retain(|r| r.session_id != Some(session_id));
        Ok(())
    }

    async fn list_boms(&self, _category: Option<Category>) -> Result<Vec<Bom>> {
        Ok(Vec::new())
    }

    async fn overview(&self) -> Result<Overview> {
        Err(not_found("Overview"))
    }

    async fn session_summary(&self, _session_id: SessionId) -> Result<SessionSummary> {
        Err(not_found("Summary"))
    }

    async fn inventory_summary(&self, _session_id: SessionId) -> Result<InventorySummary> {
        Err(not_found("Summary"))
    }

    async fn open_event_stream(&self) -> Result<EventStream> {
        Err(Error::Stream("not supported".into()))
    }
}
