//! Dashboard mirror of server state
//!
//! The overview and the selected session's detail are replaced wholesale on
//! every refresh. Detail responses carry the selection generation they were
//! requested under; a response from an older generation is dropped.

use chrono::{DateTime, Utc};
use isa_common::models::{Overview, ScanMode, SessionDetail, SessionId};

use crate::feed::ScanFeed;

/// Session chosen for detail viewing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub session_id: SessionId,
    pub mode: ScanMode,
    pub generation: u64,
}

#[derive(Debug)]
pub struct DashboardState {
    overview: Option<Overview>,
    overview_at: Option<DateTime<Utc>>,
    selection: Option<Selection>,
    generation: u64,
    detail: Option<SessionDetail>,
    feed: ScanFeed,
    stream_connected: bool,
}

impl DashboardState {
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            overview: None,
            overview_at: None,
            selection: None,
            generation: 0,
            detail: None,
            feed: ScanFeed::new(feed_capacity),
            stream_connected: false,
        }
    }

    pub fn overview(&self) -> Option<&Overview> {
        self.overview.as_ref()
    }

    /// When the overview was last replaced
    pub fn overview_at(&self) -> Option<DateTime<Utc>> {
        self.overview_at
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn detail(&self) -> Option<&SessionDetail> {
        self.detail.as_ref()
    }

    pub fn feed(&self) -> &ScanFeed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut ScanFeed {
        &mut self.feed
    }

    pub fn stream_connected(&self) -> bool {
        self.stream_connected
    }

    pub fn set_stream_connected(&mut self, connected: bool) {
        self.stream_connected = connected;
    }

    pub fn replace_overview(&mut self, overview: Overview, at: DateTime<Utc>) {
        self.overview = Some(overview);
        self.overview_at = Some(at);
    }

    /// Select a session; any detail still in flight becomes stale
    pub fn select(&mut self, session_id: SessionId, mode: ScanMode) -> Selection {
        self.generation += 1;
        let selection = Selection {
            session_id,
            mode,
            generation: self.generation,
        };
        self.selection = Some(selection);
        self.detail = None;
        selection
    }

    pub fn clear_selection(&mut self) {
        self.generation += 1;
        self.selection = None;
        self.detail = None;
    }

    /// Clear the selection if it points at `session_id`
    pub fn clear_if_selected(&mut self, session_id: SessionId) -> bool {
        match self.selection {
            Some(s) if s.session_id == session_id => {
                self.clear_selection();
                true
            }
            _ => false,
        }
    }

    /// Replace the detail when `generation` is still current
    pub fn apply_detail(&mut self, generation: u64, detail: SessionDetail) -> bool {
        match self.selection {
            Some(s) if s.generation == generation && s.session_id == detail.session_id() => {
                self.detail = Some(detail);
                true
            }
            _ => false,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.selection.map(|s| s.generation) == Some(generation)
    }
}
