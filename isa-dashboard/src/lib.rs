//! # ISA Dashboard
//!
//! Supervisor-side mirror of the inventory-reconciliation backend:
//! - Overview and selected-session detail, polled and replaced wholesale
//! - Live scan feed from the backend event stream
//! - Review operations on submitted records and sessions

pub mod dashboard;
pub mod error;
pub mod feed;
pub mod review;
pub mod state;
pub mod stream;
pub mod sync;

pub use dashboard::Dashboard;
pub use error::{DashboardError, Result};
pub use feed::ScanFeed;
pub use state::{DashboardState, Selection};
pub use stream::Backoff;
