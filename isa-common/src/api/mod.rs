//! Backend of record
//!
//! [`InventoryBackend`] is the seam between the scanner/dashboard state
//! machines and the inventory-reconciliation service. [`BackendClient`] is
//! the HTTP implementation; tests substitute in-memory implementations.

mod client;

pub use client::BackendClient;

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use crate::events::ServerEvent;
use crate::models::{
    Bom, Category, CreateRecordRequest, InventorySummary, NewSession, Overview, RecordId,
    ScanRecord, ScanSession, SessionFilter, SessionId, SessionSummary,
};
use crate::Result;

/// Live stream of backend events
///
/// Ends (returns `None`) when the server closes the connection; yields an
/// `Err` and then ends on transport failure.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ServerEvent>> + Send>>;

/// Operations consumed from the inventory-reconciliation service
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    /// Create a scan record; the returned record carries the computed status
    async fn create_record(&self, request: CreateRecordRequest) -> Result<ScanRecord>;

    async fn delete_record(&self, record_id: RecordId) -> Result<()>;

    /// Change a record's quantity; the backend recomputes its status
    async fn update_record_quantity(&self, record_id: RecordId, quantity: f64) -> Result<ScanRecord>;

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<ScanSession>>;

    async fn create_session(&self, new_session: &NewSession) -> Result<ScanSession>;

    /// Mark a session finished
    async fn end_session(&self, session_id: SessionId) -> Result<()>;

    /// Delete a session and all its records
    async fn delete_session(&self, session_id: SessionId) -> Result<()>;

    async fn list_boms(&self, category: Option<Category>) -> Result<Vec<Bom>>;

    async fn overview(&self) -> Result<Overview>;

    /// Reconciliation summary of a BOM-mode session
    async fn session_summary(&self, session_id: SessionId) -> Result<SessionSummary>;

    /// Counting summary of an inventory-mode session
    async fn inventory_summary(&self, session_id: SessionId) -> Result<InventorySummary>;

    /// Open the server-pushed event stream (all sessions)
    async fn open_event_stream(&self) -> Result<EventStream>;
}
