//! Backend event stream messages
//!
//! Each SSE frame carries an `event:` name and a JSON `data:` payload whose
//! `type` field repeats the name. The payload is authoritative; the frame
//! name is only consulted when the payload is not a JSON object.

use serde::{Deserialize, Serialize};

use crate::models::{RecordId, RecordPatch, ScanRecord, SessionId};
use crate::sse::SseFrame;
use crate::{Error, Result};

/// Message pushed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A record was created
    Scan {
        #[serde(default)]
        session_id: Option<SessionId>,
        record: ScanRecord,
    },

    /// A record's quantity (and so its status) changed
    RecordUpdated {
        #[serde(default)]
        session_id: Option<SessionId>,
        record: RecordPatch,
    },

    /// A record was deleted
    RecordDeleted {
        #[serde(default)]
        session_id: Option<SessionId>,
        record_id: RecordId,
    },

    /// A session and all its records were deleted
    SessionDeleted { session_id: SessionId },

    /// Keepalive
    Ping,

    /// Event type this build does not know about
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode one SSE frame
    ///
    /// Frames with an empty payload decode from their event name alone
    /// (`ping` is sometimes sent that way).
    pub fn from_frame(frame: &SseFrame) -> Result<Self> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Ok(match frame.event.as_deref() {
                Some("ping") | None => ServerEvent::Ping,
                Some(_) => ServerEvent::Unknown,
            });
        }
        serde_json::from_str(data)
            .map_err(|e| Error::Decode(format!("event {:?}: {}", frame.event, e)))
    }

    /// Session the event concerns, when the backend says
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            ServerEvent::Scan { session_id, .. }
            | ServerEvent::RecordUpdated { session_id, .. }
            | ServerEvent::RecordDeleted { session_id, .. } => *session_id,
            ServerEvent::SessionDeleted { session_id } => Some(*session_id),
            ServerEvent::Ping | ServerEvent::Unknown => None,
        }
    }

    /// True for events that change server state (everything but keepalives)
    pub fn invalidates_views(&self) -> bool {
        !matches!(self, ServerEvent::Ping | ServerEvent::Unknown)
    }
}
