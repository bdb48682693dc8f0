//! Review operations on submitted data
//!
//! Edits go to the backend first; the mirror only changes through the
//! refresh that follows, so it never shows a value the backend rejected.

use isa_common::models::{RecordId, ScanRecord, SessionId};
use tracing::info;

use crate::dashboard::Dashboard;
use crate::error::{DashboardError, Result};

impl Dashboard {
    /// Change a record's quantity; the backend recomputes its status
    pub async fn update_record_quantity(&self, record_id: RecordId, quantity: f64) -> Result<ScanRecord> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(DashboardError::InvalidQuantity(quantity));
        }

        let record = self
            .inner
            .backend
            .update_record_quantity(record_id, quantity)
            .await?;
        info!(record_id, quantity, status = ?record.status, "Record quantity updated");
        self.request_refresh();
        Ok(record)
    }

    pub async fn delete_record(&self, record_id: RecordId) -> Result<()> {
        self.inner.backend.delete_record(record_id).await?;
        info!(record_id, "Record deleted");
        self.request_refresh();
        Ok(())
    }

    /// Finalize a session; it stays selectable as a finished session
    pub async fn end_session(&self, session_id: SessionId) -> Result<()> {
        self.inner.backend.end_session(session_id).await?;
        info!(session_id, "Session ended");
        self.request_refresh();
        Ok(())
    }

    /// Delete a session with all its records
    pub async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        self.inner.backend.delete_session(session_id).await?;
        self.inner.state.write().await.clear_if_selected(session_id);
        info!(session_id, "Session deleted");
        self.request_refresh();
        Ok(())
    }
}
