//! Event types and local event bus
//!
//! Two families of events live here:
//! - [`server::ServerEvent`]: messages pushed by the backend on its event
//!   stream, decoded from SSE frames.
//! - [`IsaEvent`]: local notifications the scanner and dashboard broadcast
//!   to whatever UI layer is attached, over an [`EventBus`].

pub mod server;

pub use server::ServerEvent;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{ReconciliationStatus, RecordId, SessionId};

/// Local notification broadcast to UI layers
///
/// Serialized with a `type` tag so UI bridges can forward it as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IsaEvent {
    /// A forwarded frame produced candidates (preview, batch unchanged)
    CandidatesDetected {
        identifiers: Vec<String>,
        po_numbers: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Operator captured the preview into a fresh batch
    BatchSeeded {
        item_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// One batch item was accepted by the backend
    ItemSubmitted {
        item_key: Uuid,
        identifier: String,
        record_id: RecordId,
        status: Option<ReconciliationStatus>,
        timestamp: DateTime<Utc>,
    },

    /// One batch item failed to submit and can be retried
    ItemFailed {
        item_key: Uuid,
        identifier: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A submitted record was deleted by the operator
    ItemRetracted {
        record_id: RecordId,
        identifier: String,
        timestamp: DateTime<Utc>,
    },

    /// A fully submitted batch was cleared
    BatchDismissed { timestamp: DateTime<Utc> },

    /// Scanner bound to a session (created or resumed)
    SessionBound {
        session_id: SessionId,
        resumed: bool,
        timestamp: DateTime<Utc>,
    },

    /// Scanner left its session (ended on the backend or detached)
    SessionReleased {
        session_id: SessionId,
        ended: bool,
        timestamp: DateTime<Utc>,
    },

    /// Dashboard replaced its overview
    OverviewRefreshed {
        active_sessions: usize,
        timestamp: DateTime<Utc>,
    },

    /// Dashboard replaced the detail of the selected session
    DetailRefreshed {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },

    /// Dashboard feed received a new record
    FeedUpdated {
        record_id: RecordId,
        feed_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// Dashboard event stream connected
    StreamConnected { timestamp: DateTime<Utc> },

    /// Dashboard event stream dropped; a reconnect is scheduled
    StreamDisconnected {
        reason: String,
        retry_in_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl IsaEvent {
    /// Event type name, as used in the serialized `type` tag
    pub fn event_type(&self) -> &str {
        match self {
            IsaEvent::CandidatesDetected { .. } => "CandidatesDetected",
            IsaEvent::BatchSeeded { .. } => "BatchSeeded",
            IsaEvent::ItemSubmitted { .. } => "ItemSubmitted",
            IsaEvent::ItemFailed { .. } => "ItemFailed",
            IsaEvent::ItemRetracted { .. } => "ItemRetracted",
            IsaEvent::BatchDismissed { .. } => "BatchDismissed",
            IsaEvent::SessionBound { .. } => "SessionBound",
            IsaEvent::SessionReleased { .. } => "SessionReleased",
            IsaEvent::OverviewRefreshed { .. } => "OverviewRefreshed",
            IsaEvent::DetailRefreshed { .. } => "DetailRefreshed",
            IsaEvent::FeedUpdated { .. } => "FeedUpdated",
            IsaEvent::StreamConnected { .. } => "StreamConnected",
            IsaEvent::StreamDisconnected { .. } => "StreamDisconnected",
        }
    }
}

/// Broadcast bus for [`IsaEvent`]s
///
/// Wraps a `tokio::sync::broadcast` channel. Slow subscribers lag and lose
/// the oldest events; emitters never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IsaEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    ///
    /// ```
    /// use isa_common::events::EventBus;
    ///
    /// let bus = EventBus::new(100);
    /// assert_eq!(bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<IsaEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: IsaEvent) -> Result<usize, broadcast::error::SendError<IsaEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IsaEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
