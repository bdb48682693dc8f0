//! Session discovery and resume engine
//!
//! ```text
//! NoSession ──discover──▶ Choosing ──resume/create──▶ Active ──end/detach──▶ NoSession
//!     └──────────────discover (none active) / create──────────▲
//! ```
//!
//! The state lock is never held across a backend call; each transition is
//! re-checked when the response arrives.

use chrono::Utc;
use isa_common::api::InventoryBackend;
use isa_common::events::{EventBus, IsaEvent};
use isa_common::models::{Bom, Category, NewSession, ScanMode, ScanSession, SessionFilter, SessionId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, ScannerError};

/// Where the scanner stands with respect to a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    NoSession,
    /// Active sessions were found; the operator must resume one or create
    Choosing(Vec<ScanSession>),
    Active(ScanSession),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NoSession => "no_session",
            SessionState::Choosing(_) => "choosing",
            SessionState::Active(_) => "active",
        }
    }
}

/// Outcome of [`SessionEngine::discover`]
#[derive(Debug, Clone, PartialEq)]
pub enum Discovery {
    /// Existing sessions to choose from
    Choose(Vec<ScanSession>),
    /// Nothing to resume; a new session was created and bound
    Started(ScanSession),
}

/// Owns the scanner's session binding
pub struct SessionEngine {
    backend: Arc<dyn InventoryBackend>,
    state: RwLock<SessionState>,
    events: EventBus,
}

impl SessionEngine {
    pub fn new(backend: Arc<dyn InventoryBackend>, events: EventBus) -> Self {
        Self {
            backend,
            state: RwLock::new(SessionState::NoSession),
            events,
        }
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn active(&self) -> Option<ScanSession> {
        match &*self.state.read().await {
            SessionState::Active(session) => Some(session.clone()),
            _ => None,
        }
    }

    pub async fn active_id(&self) -> Result<SessionId> {
        self.active()
            .await
            .map(|s| s.id)
            .ok_or(ScannerError::NoActiveSession)
    }

    async fn ensure_not_active(&self) -> Result<()> {
        if let SessionState::Active(session) = &*self.state.read().await {
            return Err(ScannerError::SessionAlreadyActive(session.id));
        }
        Ok(())
    }

    /// Look for sessions to resume before starting a new one
    ///
    /// If any active session matches `filter`, the engine moves to
    /// `Choosing`. Otherwise `new_session` is created right away.
    pub async fn discover(&self, filter: &SessionFilter, new_session: NewSession) -> Result<Discovery> {
        let sessions = self.find_resumable(filter).await?;
        if sessions.is_empty() {
            info!("No active sessions to resume, creating a new one");
            return self.create(new_session).await.map(Discovery::Started);
        }
        Ok(Discovery::Choose(sessions))
    }

    /// List sessions matching `filter` and offer them for resume
    ///
    /// Moves to `Choosing` when the list is non-empty; an empty list leaves
    /// the state as it was.
    pub async fn find_resumable(&self, filter: &SessionFilter) -> Result<Vec<ScanSession>> {
        self.ensure_not_active().await?;

        let sessions: Vec<ScanSession> = self
            .backend
            .list_sessions(filter)
            .await?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        if sessions.is_empty() {
            return Ok(sessions);
        }

        let mut state = self.state.write().await;
        if let SessionState::Active(session) = &*state {
            return Err(ScannerError::SessionAlreadyActive(session.id));
        }
        info!(count = sessions.len(), "Active sessions available to resume");
        *state = SessionState::Choosing(sessions.clone());
        Ok(sessions)
    }

    /// Create a session and bind it
    ///
    /// BOM mode requires both a category and a BOM; this is checked before
    /// any backend call. Inventory mode ignores category and BOM.
    pub async fn create(&self, new_session: NewSession) -> Result<ScanSession> {
        let request = match new_session.mode {
            ScanMode::Bom => {
                let category = new_session.category.ok_or(ScannerError::MissingCategory)?;
                let bom_id = new_session.bom_id.ok_or(ScannerError::MissingBom)?;
                NewSession::bom(category, bom_id)
            }
            ScanMode::Inventory => NewSession::inventory(),
        };

        self.ensure_not_active().await?;
        let session = self.backend.create_session(&request).await?;

        let mut state = self.state.write().await;
        if let SessionState::Active(current) = &*state {
            warn!(
                created = session.id,
                current = current.id,
                "Session created while another was bound"
            );
            return Err(ScannerError::SessionAlreadyActive(current.id));
        }
        *state = SessionState::Active(session.clone());
        drop(state);

        info!(session_id = session.id, mode = %session.mode, "Session started");
        self.events.emit_lossy(IsaEvent::SessionBound {
            session_id: session.id,
            resumed: false,
            timestamp: Utc::now(),
        });
        Ok(session)
    }

    /// Bind one of the discovered sessions (no backend call)
    pub async fn resume(&self, session_id: SessionId) -> Result<ScanSession> {
        let mut state = self.state.write().await;
        let session = match &*state {
            SessionState::Choosing(choices) => choices
                .iter()
                .find(|s| s.id == session_id)
                .cloned()
                .ok_or(ScannerError::UnknownSession(session_id))?,
            _ => return Err(ScannerError::NotChoosing),
        };
        *state = SessionState::Active(session.clone());
        drop(state);

        info!(session_id = session.id, "Session resumed");
        self.events.emit_lossy(IsaEvent::SessionBound {
            session_id: session.id,
            resumed: true,
            timestamp: Utc::now(),
        });
        Ok(session)
    }

    /// Abandon the pending choice without binding anything
    pub async fn cancel_choice(&self) -> Result<()> {
        let mut state = self.state.write().await;
        match &*state {
            SessionState::Choosing(_) => {
                *state = SessionState::NoSession;
                Ok(())
            }
            _ => Err(ScannerError::NotChoosing),
        }
    }

    /// End the active session on the backend
    ///
    /// Without an active session this fails with no backend call. A backend
    /// failure leaves the session bound.
    pub async fn end(&self) -> Result<ScanSession> {
        let session = self.active().await.ok_or(ScannerError::NoActiveSession)?;

        if let Err(e) = self.backend.end_session(session.id).await {
            warn!(session_id = session.id, "Ending session failed: {}", e);
            return Err(ScannerError::Backend(e));
        }

        self.release(session.id).await;
        info!(session_id = session.id, "Session ended");
        self.events.emit_lossy(IsaEvent::SessionReleased {
            session_id: session.id,
            ended: true,
            timestamp: Utc::now(),
        });
        Ok(session)
    }

    /// Leave the active session open on the backend so it can be resumed
    pub async fn detach(&self) -> Result<ScanSession> {
        let session = self.active().await.ok_or(ScannerError::NoActiveSession)?;
        self.release(session.id).await;

        info!(session_id = session.id, "Detached from session");
        self.events.emit_lossy(IsaEvent::SessionReleased {
            session_id: session.id,
            ended: false,
            timestamp: Utc::now(),
        });
        Ok(session)
    }

    async fn release(&self, session_id: SessionId) {
        let mut state = self.state.write().await;
        if matches!(&*state, SessionState::Active(s) if s.id == session_id) {
            *state = SessionState::NoSession;
        }
    }

    /// BOMs available for a BOM-mode session
    pub async fn list_boms(&self, category: Option<Category>) -> Result<Vec<Bom>> {
        Ok(self.backend.list_boms(category).await?)
    }
}
