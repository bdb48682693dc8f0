//! Dashboard handle
//!
//! Owns the mirror of server state. Poll ticks, stream events and review
//! operations all funnel into [`Dashboard::refresh`], which replaces the
//! overview and the selected session's detail wholesale.

use chrono::Utc;
use isa_common::api::InventoryBackend;
use isa_common::config::DashboardConfig;
use isa_common::events::{EventBus, IsaEvent};
use isa_common::models::{Overview, ScanMode, ScanRecord, SessionDetail, SessionId};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::state::{DashboardState, Selection};

pub(crate) struct Inner {
    pub(crate) backend: Arc<dyn InventoryBackend>,
    pub(crate) state: RwLock<DashboardState>,
    pub(crate) refresh_requested: Notify,
    pub(crate) events: EventBus,
    pub(crate) config: DashboardConfig,
}

/// Read-only mirror of the backend plus review operations
#[derive(Clone)]
pub struct Dashboard {
    pub(crate) inner: Arc<Inner>,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn InventoryBackend>, config: DashboardConfig, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                state: RwLock::new(DashboardState::new(config.feed_capacity)),
                refresh_requested: Notify::new(),
                events,
                config,
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub async fn overview(&self) -> Option<Overview> {
        self.inner.state.read().await.overview().cloned()
    }

    pub async fn selection(&self) -> Option<Selection> {
        self.inner.state.read().await.selection()
    }

    pub async fn detail(&self) -> Option<SessionDetail> {
        self.inner.state.read().await.detail().cloned()
    }

    /// Feed records, newest first
    pub async fn feed(&self) -> Vec<ScanRecord> {
        self.inner.state.read().await.feed().to_vec()
    }

    pub async fn stream_connected(&self) -> bool {
        self.inner.state.read().await.stream_connected()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Choose a session for detail viewing and fetch its detail right away
    pub async fn select_session(&self, session_id: SessionId, mode: ScanMode) -> Selection {
        let selection = self.inner.state.write().await.select(session_id, mode);
        info!(session_id = session_id, mode = %mode, "Session selected");
        self.request_refresh();
        selection
    }

    pub async fn clear_selection(&self) {
        self.inner.state.write().await.clear_selection();
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Ask the sync loop for an out-of-cycle refresh
    ///
    /// Requests made while a refresh is pending collapse into one.
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.notify_one();
    }

    /// Fetch overview and selected detail concurrently and replace both
    ///
    /// A failed fetch leaves its view as it was. The overview error, if
    /// any, is returned in preference to the detail error.
    pub async fn refresh(&self) -> Result<()> {
        let selection = self.inner.state.read().await.selection();

        let (overview, detail) = tokio::join!(
            self.inner.backend.overview(),
            self.fetch_detail(selection)
        );

        let overview_result: Result<()> = match overview {
            Ok(overview) => {
                let active_sessions = overview.active_session_count();
                self.inner
                    .state
                    .write()
                    .await
                    .replace_overview(overview, Utc::now());
                debug!(active_sessions, "Overview refreshed");
                self.inner.events.emit_lossy(IsaEvent::OverviewRefreshed {
                    active_sessions,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                warn!("Overview fetch failed: {}", e);
                Err(e.into())
            }
        };

        let detail_result: Result<()> = match (selection, detail) {
            (Some(selection), Some(Ok(detail))) => {
                self.apply_detail(selection, detail).await;
                Ok(())
            }
            (Some(selection), Some(Err(e))) => {
                if e.is_not_found() {
                    let cleared = {
                        let mut state = self.inner.state.write().await;
                        state.is_current(selection.generation)
                            && state.clear_if_selected(selection.session_id)
                    };
                    if cleared {
                        info!(session_id = selection.session_id, "Selected session is gone");
                    }
                } else {
                    warn!(session_id = selection.session_id, "Detail fetch failed: {}", e);
                }
                Err(e.into())
            }
            _ => Ok(()),
        };

        overview_result.and(detail_result)
    }

    async fn fetch_detail(
        &self,
        selection: Option<Selection>,
    ) -> Option<isa_common::Result<SessionDetail>> {
        let selection = selection?;
        let backend = &self.inner.backend;
        let detail = match selection.mode {
            ScanMode::Bom => backend
                .session_summary(selection.session_id)
                .await
                .map(SessionDetail::Reconciliation),
            ScanMode::Inventory => backend
                .inventory_summary(selection.session_id)
                .await
                .map(SessionDetail::Inventory),
        };
        Some(detail)
    }

    async fn apply_detail(&self, selection: Selection, detail: SessionDetail) {
        let applied = self
            .inner
            .state
            .write()
            .await
            .apply_detail(selection.generation, detail);

        if applied {
            self.inner.events.emit_lossy(IsaEvent::DetailRefreshed {
                session_id: selection.session_id,
                timestamp: Utc::now(),
            });
        } else {
            debug!(
                session_id = selection.session_id,
                generation = selection.generation,
                "Discarding detail for stale selection"
            );
        }
    }
}
